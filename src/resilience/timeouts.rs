//! Timeout enforcement.
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - Dropping the returned future cancels the wrapped operation

use std::future::Future;
use std::time::Duration;

use super::retries::AttemptFailure;

/// Run `fut` with a deadline, mapping expiry to [`AttemptFailure::Timeout`].
pub async fn with_deadline<F, T>(deadline: Duration, fut: F) -> Result<T, AttemptFailure>
where
    F: Future<Output = Result<T, AttemptFailure>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(AttemptFailure::Timeout),
    }
}
