//! Session-aware caching reverse proxy.
//!
//! Fronts one web application, pins each client to one of several stored
//! upstream accounts, caches responses per account and rewrites bodies so
//! the application works from the proxy's own origin.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌────────────────────────────────────────────────────────────┐
//!                      │                      SESSION PROXY                          │
//!                      │                                                             │
//!   Client Request     │  ┌─────────┐   ┌──────────┐   static / stub / control      │
//!   ───────────────────┼─▶│  http   │──▶│ routing  │──────────────────────────┐     │
//!                      │  │ server  │   │ classify │                          │     │
//!                      │  └─────────┘   └────┬─────┘                          │     │
//!                      │                     │ api / resource                 │     │
//!                      │                     ▼                                │     │
//!                      │  ┌──────────┐   ┌──────────┐   ┌──────────┐          │     │
//!                      │  │ session  │──▶│  cache   │──▶│ upstream │──────────┼─────┼──▶ Upstream
//!                      │  │ resolver │   │ (acct,url)│  │  client  │          │     │    Origin
//!                      │  └────┬─────┘   └────┬─────┘   └────┬─────┘          │     │
//!                      │       │ credentials   │ hit          ▼               │     │
//!   Client Response    │       ▼               │        ┌──────────┐          │     │
//!   ◀──────────────────┼── response ◀──────────┴────────│ rewrite  │◀─────────┘     │
//!                      │                                └──────────┘                │
//!                      │  config · observability · resilience · lifecycle           │
//!                      └────────────────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod cache;
pub mod credentials;
pub mod http;
pub mod rewrite;
pub mod routing;
pub mod session;
pub mod upstream;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;

pub use config::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
