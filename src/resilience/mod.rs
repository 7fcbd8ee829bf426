//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream fetch:
//!     → timeouts.rs (deadline per attempt)
//!     → On failure: retries.rs (classify outcome, check attempt ceiling, fixed backoff)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream attempt has a deadline
//! - A timed-out attempt counts against the attempt ceiling like any other failure
//! - The attempt ceiling is hard: the last failure is returned, never one more try
//! - Well-formed, non-error responses are never retried

pub mod retries;
pub mod timeouts;

pub use retries::{AttemptFailure, RetryPolicy};
pub use timeouts::with_deadline;
