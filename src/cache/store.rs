//! Namespaced response cache over a [`KvBackend`].

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::cache::{CacheEntry, CacheError, CacheKey, KvBackend, MemoryBackend, RedisBackend};
use crate::config::{CacheBackendKind, CacheConfig};
use crate::resilience::timeouts::with_timeout;

/// Default deadline for one read or write on the request path.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_millis(500);

/// Snapshot returned by [`CacheStore::get_stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_keys: usize,
    pub cluster_mode: bool,
}

/// Response cache shared by every request.
///
/// Stored keys are `<prefix><digest>`; clearing and counting never touch
/// keys outside the prefix.
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn KvBackend>,
    prefix: String,
    ttl_secs: u64,
    operation_timeout: Duration,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn KvBackend>, prefix: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            ttl_secs: ttl_secs.max(1),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Bound every `get` and `set` by `limit`; a store that stops answering
    /// then reads as a miss instead of stalling the request.
    pub fn with_operation_timeout(mut self, limit: Duration) -> Self {
        self.operation_timeout = limit;
        self
    }

    /// Build the store selected by the `[cache]` section. Does not connect.
    pub fn from_config(config: &CacheConfig) -> Self {
        let backend: Arc<dyn KvBackend> = match config.backend {
            CacheBackendKind::Redis => Arc::new(RedisBackend::new(config.redis_url(), config.cluster)),
            CacheBackendKind::Memory => Arc::new(MemoryBackend::new()),
        };
        Self::new(backend, config.key_prefix.clone(), config.ttl_secs)
            .with_operation_timeout(Duration::from_millis(config.operation_timeout_ms))
    }

    /// TTL applied to newly stored entries.
    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    pub fn cluster_mode(&self) -> bool {
        self.backend.cluster_mode()
    }

    fn storage_key(&self, key: &CacheKey) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub async fn connect(&self) -> Result<(), CacheError> {
        self.backend.connect().await
    }

    /// Look up a stored response.
    ///
    /// Undecodable or already expired values are reported as absent.
    pub async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let storage_key = self.storage_key(key);
        let Some(raw) = with_timeout(self.operation_timeout, self.backend.get(&storage_key))
            .await
            .map_err(|e| CacheError::Timeout(e.0))??
        else {
            return Ok(None);
        };
        match CacheEntry::from_bytes(&raw) {
            Ok(entry) if entry.is_expired() => {
                tracing::debug!(key = %key, "Stored entry outlived its TTL");
                Ok(None)
            }
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                Ok(None)
            }
        }
    }

    /// Store `entry` under `key` with the entry's own TTL.
    pub async fn set(&self, key: &CacheKey, entry: &CacheEntry) -> Result<(), CacheError> {
        let value = entry.to_bytes()?;
        let storage_key = self.storage_key(key);
        with_timeout(
            self.operation_timeout,
            self.backend.set(&storage_key, value, entry.ttl_secs.max(1)),
        )
        .await
        .map_err(|e| CacheError::Timeout(e.0))?
    }

    /// Remove every entry in the namespace. Failures are logged, not raised.
    pub async fn clear_all(&self) -> bool {
        match self.backend.delete_prefix(&self.prefix).await {
            Ok(removed) => {
                tracing::info!(removed, prefix = %self.prefix, "Cache cleared");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Cache clear failed");
                false
            }
        }
    }

    pub async fn get_stats(&self) -> Result<CacheStats, CacheError> {
        Ok(CacheStats {
            total_keys: self.backend.count_prefix(&self.prefix).await?,
            cluster_mode: self.backend.cluster_mode(),
        })
    }

    pub async fn close(&self) -> Result<(), CacheError> {
        self.backend.close().await
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("prefix", &self.prefix)
            .field("ttl_secs", &self.ttl_secs)
            .field("operation_timeout", &self.operation_timeout)
            .field("cluster_mode", &self.backend.cluster_mode())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheKeyDeriver;
    use async_trait::async_trait;
    use axum::http::{HeaderMap, Method, StatusCode};
    use bytes::Bytes;
    use std::time::Duration;

    fn key(path: &str) -> CacheKey {
        CacheKeyDeriver::default().derive(&Method::GET, path, &HeaderMap::new(), None)
    }

    fn entry(key: &CacheKey, body: &'static [u8], ttl_secs: u64) -> CacheEntry {
        CacheEntry::new(key.as_str(), StatusCode::OK, &HeaderMap::new(), &Bytes::from_static(body), ttl_secs)
    }

    fn memory_store() -> (Arc<MemoryBackend>, CacheStore) {
        let backend = Arc::new(MemoryBackend::new());
        let store = CacheStore::new(backend.clone(), "test:", 60);
        (backend, store)
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let (_, store) = memory_store();
        let k = key("/a");
        assert_eq!(store.get(&k).await.unwrap(), None);

        let e = entry(&k, b"hello", 60);
        store.set(&k, &e).await.unwrap();
        assert_eq!(store.get(&k).await.unwrap(), Some(e));
    }

    #[tokio::test]
    async fn test_clear_only_touches_namespace() {
        let (backend, store) = memory_store();
        backend.set("foreign:x", b"1".to_vec(), 60).await.unwrap();
        for path in ["/a", "/b", "/c"] {
            let k = key(path);
            store.set(&k, &entry(&k, b"x", 60)).await.unwrap();
        }
        assert_eq!(store.get_stats().await.unwrap().total_keys, 3);

        assert!(store.clear_all().await);
        assert_eq!(
            store.get_stats().await.unwrap(),
            CacheStats { total_keys: 0, cluster_mode: false }
        );
        assert_eq!(store.get(&key("/a")).await.unwrap(), None);
        assert!(backend.get("foreign:x").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_undecodable_value_is_a_miss() {
        let (backend, store) = memory_store();
        let k = key("/garbage");
        backend.set(&format!("test:{k}"), b"{not json".to_vec(), 60).await.unwrap();
        assert_eq!(store.get(&k).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entry_past_its_ttl_is_a_miss() {
        let (backend, store) = memory_store();
        let k = key("/old");
        let mut e = entry(&k, b"stale", 1);
        e.created_at_ms -= 5_000;
        // The backend keeps it for longer than the entry's own TTL.
        backend.set(&format!("test:{k}"), e.to_bytes().unwrap(), 60).await.unwrap();
        assert_eq!(store.get(&k).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_ttl_expiry() {
        let (_, store) = memory_store();
        let k = key("/ttl");
        store.set(&k, &entry(&k, b"v", 2)).await.unwrap();
        tokio::time::advance(Duration::from_millis(2_001)).await;
        assert_eq!(store.get(&k).await.unwrap(), None);
    }

    struct Unreachable;

    #[async_trait]
    impl KvBackend for Unreachable {
        async fn connect(&self) -> Result<(), CacheError> {
            Err(CacheError::Connection("refused".into()))
        }
        async fn get(&self, _: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Err(CacheError::Connection("refused".into()))
        }
        async fn set(&self, _: &str, _: Vec<u8>, _: u64) -> Result<(), CacheError> {
            Err(CacheError::Connection("refused".into()))
        }
        async fn delete_prefix(&self, _: &str) -> Result<usize, CacheError> {
            Err(CacheError::Connection("refused".into()))
        }
        async fn count_prefix(&self, _: &str) -> Result<usize, CacheError> {
            Err(CacheError::Connection("refused".into()))
        }
        async fn close(&self) -> Result<(), CacheError> {
            Ok(())
        }
        fn cluster_mode(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let store = CacheStore::new(Arc::new(Unreachable), "p:", 60);
        let k = key("/x");
        assert!(store.connect().await.is_err());
        assert!(store.get(&k).await.is_err());
        assert!(store.set(&k, &entry(&k, b"x", 60)).await.is_err());
        assert!(!store.clear_all().await);
        assert!(store.get_stats().await.is_err());
        assert!(store.cluster_mode());
        assert!(store.close().await.is_ok());
    }

    /// Accepts the connection, then never answers.
    struct Stalled;

    #[async_trait]
    impl KvBackend for Stalled {
        async fn connect(&self) -> Result<(), CacheError> {
            Ok(())
        }
        async fn get(&self, _: &str) -> Result<Option<Vec<u8>>, CacheError> {
            std::future::pending().await
        }
        async fn set(&self, _: &str, _: Vec<u8>, _: u64) -> Result<(), CacheError> {
            std::future::pending().await
        }
        async fn delete_prefix(&self, _: &str) -> Result<usize, CacheError> {
            std::future::pending().await
        }
        async fn count_prefix(&self, _: &str) -> Result<usize, CacheError> {
            std::future::pending().await
        }
        async fn close(&self) -> Result<(), CacheError> {
            Ok(())
        }
        fn cluster_mode(&self) -> bool {
            false
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_backend_times_out() {
        let store = CacheStore::new(Arc::new(Stalled), "p:", 60)
            .with_operation_timeout(Duration::from_millis(250));
        let k = key("/stall");

        assert!(matches!(store.get(&k).await, Err(CacheError::Timeout(d)) if d == Duration::from_millis(250)));
        assert!(matches!(store.set(&k, &entry(&k, b"x", 60)).await, Err(CacheError::Timeout(_))));
    }

    #[test]
    fn test_zero_ttl_clamped() {
        let store = CacheStore::new(Arc::new(MemoryBackend::new()), "p:", 0);
        assert_eq!(store.ttl_secs(), 1);
    }

    #[test]
    fn test_from_config_selects_backend() {
        let mut config = CacheConfig::default();
        config.backend = CacheBackendKind::Memory;
        config.cluster = true;
        assert!(!CacheStore::from_config(&config).cluster_mode());

        config.backend = CacheBackendKind::Redis;
        assert!(CacheStore::from_config(&config).cluster_mode());
    }
}
