//! In-process key-value backend.
//!
//! Expiry is checked on read, and expired slots are swept on count and at
//! most once per [`SWEEP_INTERVAL`] from `set`, so keys that are never read
//! again do not stay resident. Uses tokio's clock so tests can drive it with
//! paused time.

use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::{Duration, Instant};

use crate::cache::{CacheError, KvBackend};

#[derive(Debug)]
struct Slot {
    value: Vec<u8>,
    expires_at: Instant,
}

/// Minimum time between expiry sweeps triggered by writes.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// DashMap-backed store for single-instance deployments and tests.
#[derive(Debug)]
pub struct MemoryBackend {
    entries: DashMap<String, Slot>,
    last_sweep: Mutex<Instant>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            last_sweep: Mutex::new(Instant::now()),
        }
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slots held in memory, expired or not.
    pub fn resident_len(&self) -> usize {
        self.entries.len()
    }

    fn sweep_expired(&self, now: Instant) {
        self.entries.retain(|_, slot| slot.expires_at > now);
    }

    /// Sweep if the last sweep is older than [`SWEEP_INTERVAL`]. Concurrent
    /// writers skip rather than queue behind a sweep in progress.
    fn maybe_sweep(&self, now: Instant) {
        let Ok(mut last) = self.last_sweep.try_lock() else {
            return;
        };
        if now.duration_since(*last) < SWEEP_INTERVAL {
            return;
        }
        *last = now;
        drop(last);
        self.sweep_expired(now);
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn connect(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = Instant::now();
        if let Some(slot) = self.entries.get(key) {
            if slot.expires_at > now {
                return Ok(Some(slot.value.clone()));
            }
        }
        // The read guard is gone here; removing under it would deadlock.
        self.entries.remove_if(key, |_, slot| slot.expires_at <= now);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<(), CacheError> {
        let now = Instant::now();
        self.maybe_sweep(now);
        let expires_at = now + Duration::from_secs(ttl_secs.max(1));
        self.entries.insert(key.to_string(), Slot { value, expires_at });
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - self.entries.len())
    }

    async fn count_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        self.sweep_expired(Instant::now());
        Ok(self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .count())
    }

    async fn close(&self) -> Result<(), CacheError> {
        Ok(())
    }

    fn cluster_mode(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let backend = MemoryBackend::new();
        backend.set("p:a", b"v".to_vec(), 2).await.unwrap();

        tokio::time::advance(Duration::from_millis(1999)).await;
        assert_eq!(backend.get("p:a").await.unwrap(), Some(b"v".to_vec()));

        tokio::time::advance(Duration::from_millis(2)).await;
        assert_eq!(backend.get("p:a").await.unwrap(), None);
        assert_eq!(backend.count_prefix("p:").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_prefix_operations() {
        let backend = MemoryBackend::new();
        backend.set("p:a", b"1".to_vec(), 60).await.unwrap();
        backend.set("p:b", b"2".to_vec(), 60).await.unwrap();
        backend.set("other:c", b"3".to_vec(), 60).await.unwrap();

        assert_eq!(backend.count_prefix("p:").await.unwrap(), 2);
        assert_eq!(backend.delete_prefix("p:").await.unwrap(), 2);
        assert_eq!(backend.count_prefix("p:").await.unwrap(), 0);
        assert_eq!(backend.get("other:c").await.unwrap(), Some(b"3".to_vec()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_ttl_is_one_second() {
        let backend = MemoryBackend::new();
        backend.set("k", b"v".to_vec(), 0).await.unwrap();
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(backend.get("k").await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unread_expired_entries_are_swept_on_write() {
        let backend = MemoryBackend::new();
        for i in 0..1000 {
            backend.set(&format!("p:{i}"), b"v".to_vec(), 1).await.unwrap();
        }
        assert_eq!(backend.resident_len(), 1000);

        tokio::time::advance(Duration::from_secs(3600)).await;
        backend.set("p:fresh", b"v".to_vec(), 60).await.unwrap();

        assert_eq!(backend.resident_len(), 1);
        assert_eq!(backend.get("p:fresh").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_within_interval_do_not_sweep() {
        let backend = MemoryBackend::new();
        backend.set("p:a", b"v".to_vec(), 1).await.unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        backend.set("p:b", b"v".to_vec(), 60).await.unwrap();
        assert_eq!(backend.resident_len(), 2);

        assert_eq!(backend.count_prefix("p:").await.unwrap(), 1);
        assert_eq!(backend.resident_len(), 1);
    }
}
