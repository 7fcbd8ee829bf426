//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (RouteTable::classify)
//!     → matcher.rs (evaluate prefix / exact conditions)
//!     → RouteKind: Control | Static | Stub | Api | Resource
//!
//! Compilation (at startup):
//!     RoutesConfig + UpstreamConfig
//!     → compile matchers, sort static mounts by prefix length
//!     → freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Classification happens before session resolution, so local routes never need an account
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod router;

pub use matcher::{ExactPathMatcher, Matcher, PathPrefixMatcher};
pub use router::{RouteKind, RouteTable, StaticMount, Stub};
