//! Key-value store contract.

use async_trait::async_trait;

use crate::cache::CacheError;

/// The raw key-value store behind [`CacheStore`](crate::cache::CacheStore).
///
/// Implementations must be safe to share across concurrent requests and
/// provide atomic per-key semantics.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Establish the connection. Calling it again once connected is a no-op.
    async fn connect(&self) -> Result<(), CacheError>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store `value`, expiring it after `ttl_secs` (at least 1).
    async fn set(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<(), CacheError>;

    /// Delete every key starting with `prefix`, returning how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError>;

    /// Count live keys starting with `prefix`.
    async fn count_prefix(&self, prefix: &str) -> Result<usize, CacheError>;

    /// Drop the connection. Safe to call more than once.
    async fn close(&self) -> Result<(), CacheError>;

    fn cluster_mode(&self) -> bool;
}
