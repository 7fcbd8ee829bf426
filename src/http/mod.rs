//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware, dispatch)
//!     → request.rs (request ID, body inspection)
//!     → routing::RouteTable (classify)
//!         static  → static_files.rs (ServeDir, immutable cache headers)
//!         stub    → static_files.rs (fixed body)
//!         control → control.rs (accounts, switch, refresh)
//!         api / resource → pipeline.rs (session → cache → upstream → rewrite)
//!     → response.rs (content type, client cache headers)
//!     → Send to client
//! ```

pub mod control;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;
pub mod static_files;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
