//! Upstream client subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound path + query
//!     → target.rs (collapse separators, strip self-referential host prefix,
//!                  collapse repeated API prefix, pick origin by host route)
//!     → CanonicalUrl (also the cache key's URL component)
//!
//! FetchRequest + ResolvedSession
//!     → client.rs (filtered cookie, fingerprint headers, cache busters on volatile paths)
//!     → resilience (deadline per attempt, fixed backoff, hard attempt ceiling)
//!     → UpstreamResponse | UpstreamError
//! ```
//!
//! # Design Decisions
//! - Only status, content type and body are taken from upstream; upstream cookies never reach clients
//! - Cache busters are added per attempt and never become part of the canonical URL
//! - Alternate hosts only receive credentials when their route asks for them

pub mod client;
pub mod target;

pub use client::{FetchRequest, UpstreamClient, UpstreamResponse};
pub use target::{CanonicalUrl, UpstreamTargets};

use thiserror::Error;

use crate::resilience::AttemptFailure;

/// Final outcome of a fetch whose attempts were all exhausted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("upstream timed out after {attempts} attempt(s)")]
    Timeout { attempts: u32 },

    #[error("upstream transport failure after {attempts} attempt(s): {reason}")]
    TransportFailure { attempts: u32, reason: String },

    #[error("upstream rejected request with status {status} after {attempts} attempt(s)")]
    UpstreamRejected { status: u16, attempts: u32 },
}

impl UpstreamError {
    /// Build the error reported for the last failed attempt.
    pub fn from_failure(failure: AttemptFailure, attempts: u32) -> Self {
        match failure {
            AttemptFailure::Timeout => Self::Timeout { attempts },
            AttemptFailure::Transport(reason) => Self::TransportFailure { attempts, reason },
            AttemptFailure::Rejected { status } => Self::UpstreamRejected { status, attempts },
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Timeout { attempts }
            | Self::TransportFailure { attempts, .. }
            | Self::UpstreamRejected { attempts, .. } => *attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_failure_keeps_kind() {
        assert_eq!(
            UpstreamError::from_failure(AttemptFailure::Timeout, 2),
            UpstreamError::Timeout { attempts: 2 }
        );
        assert_eq!(
            UpstreamError::from_failure(AttemptFailure::Rejected { status: 500 }, 1),
            UpstreamError::UpstreamRejected { status: 500, attempts: 1 }
        );
        let err = UpstreamError::from_failure(AttemptFailure::Transport("reset".into()), 2);
        assert!(matches!(err, UpstreamError::TransportFailure { attempts: 2, .. }));
        assert_eq!(err.attempts(), 2);
    }
}
