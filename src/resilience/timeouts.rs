//! Timeout enforcement.
//!
//! Every backend call runs under a deadline. Expiry drops the inner future,
//! which cancels the in-flight call and runs the destructors it owns.

use std::future::Future;
use std::time::Duration;

/// The deadline passed before the operation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation timed out after {0:?}")]
pub struct Elapsed(pub Duration);

/// Run `future`, giving up after `limit`.
pub async fn with_timeout<F, T>(limit: Duration, future: F) -> Result<T, Elapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| Elapsed(limit))
}
