//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Load credentials (guest required) → Build server → Bind → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast → stop accepting, drain, stop cache sweeper
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then credentials, then listeners
//! - Fail fast: a missing credential source or invalid config is fatal
//! - One broadcast channel reaches every long-running task

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::StartupError;
