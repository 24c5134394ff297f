//! Cache layer errors.

/// Errors raised by the cache store and its key-value backends.
///
/// None of these ever reach a client: the proxy turns read failures into
/// misses and logs write failures.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backing store could not be reached.
    #[error("cache backend unreachable: {0}")]
    Connection(String),

    /// A command against a connected store failed.
    #[error("cache store operation failed: {0}")]
    Store(String),

    /// The store accepted the command but did not answer in time.
    #[error("cache store did not answer within {0:?}")]
    Timeout(std::time::Duration),

    #[error("cache entry encoding failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
            CacheError::Connection(err.to_string())
        } else {
            CacheError::Store(err.to_string())
        }
    }
}
