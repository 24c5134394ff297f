//! Redis key-value backend (single node or cluster).

use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::cluster::ClusterClient;
use redis::cluster_async::ClusterConnection;
use redis::{AsyncCommands, RedisResult};
use tokio::sync::Mutex;

use crate::cache::{CacheError, KvBackend};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
/// Per-command deadline once connected; a silent server fails the command.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);
/// Minimum gap between lazy reconnect attempts while the store is down.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(5);
const SCAN_BATCH: usize = 500;

#[derive(Clone)]
enum Connection {
    Single(ConnectionManager),
    Cluster(ClusterConnection),
}

impl Connection {
    async fn open(url: &str, cluster: bool) -> Result<Self, CacheError> {
        if cluster {
            let client = ClusterClient::builder(vec![url])
                .connection_timeout(CONNECT_TIMEOUT)
                .response_timeout(RESPONSE_TIMEOUT)
                .build()?;
            Ok(Connection::Cluster(client.get_async_connection().await?))
        } else {
            let client = redis::Client::open(url)?;
            let config = ConnectionManagerConfig::new()
                .set_connection_timeout(CONNECT_TIMEOUT)
                .set_response_timeout(RESPONSE_TIMEOUT);
            Ok(Connection::Single(
                ConnectionManager::new_with_config(client, config).await?,
            ))
        }
    }

    async fn get(&mut self, key: &str) -> RedisResult<Option<Vec<u8>>> {
        match self {
            Connection::Single(c) => c.get(key).await,
            Connection::Cluster(c) => c.get(key).await,
        }
    }

    async fn set_ex(&mut self, key: &str, value: Vec<u8>, ttl_secs: u64) -> RedisResult<()> {
        match self {
            Connection::Single(c) => c.set_ex(key, value, ttl_secs).await,
            Connection::Cluster(c) => c.set_ex(key, value, ttl_secs).await,
        }
    }

    /// Every key matching `pattern` across the whole keyspace.
    async fn keys(&mut self, pattern: &str) -> RedisResult<Vec<String>> {
        match self {
            Connection::Single(c) => {
                let mut keys = Vec::new();
                let mut cursor: u64 = 0;
                loop {
                    let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(pattern)
                        .arg("COUNT")
                        .arg(SCAN_BATCH)
                        .query_async(c)
                        .await?;
                    keys.extend(batch);
                    if next == 0 {
                        break;
                    }
                    cursor = next;
                }
                Ok(keys)
            }
            // KEYS is fanned out to every primary and the replies concatenated.
            Connection::Cluster(c) => redis::cmd("KEYS").arg(pattern).query_async(c).await,
        }
    }

    async fn delete(&mut self, keys: &[String]) -> RedisResult<usize> {
        let mut removed = 0;
        match self {
            Connection::Single(c) => {
                for chunk in keys.chunks(SCAN_BATCH) {
                    let n: usize = c.del(chunk).await?;
                    removed += n;
                }
            }
            // Keys may live in different slots; one DEL per key.
            Connection::Cluster(c) => {
                for key in keys {
                    let n: usize = c.del(key).await?;
                    removed += n;
                }
            }
        }
        Ok(removed)
    }
}

/// Redis-backed store.
///
/// The connection handle is cloned out of an [`ArcSwapOption`] per
/// operation, so requests share one multiplexed connection without locking.
pub struct RedisBackend {
    url: String,
    cluster: bool,
    connection: ArcSwapOption<Connection>,
    /// Serializes connection attempts; holds the time of the last failure.
    last_failure: Mutex<Option<Instant>>,
}

impl RedisBackend {
    pub fn new(url: impl Into<String>, cluster: bool) -> Self {
        Self {
            url: url.into(),
            cluster,
            connection: ArcSwapOption::empty(),
            last_failure: Mutex::new(None),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.load().is_some()
    }

    async fn establish(&self, respect_backoff: bool) -> Result<(), CacheError> {
        let mut last_failure = self.last_failure.lock().await;
        if self.is_connected() {
            return Ok(());
        }
        if respect_backoff {
            if let Some(at) = *last_failure {
                if at.elapsed() < RECONNECT_BACKOFF {
                    return Err(CacheError::Connection("redis unavailable".into()));
                }
            }
        }

        let attempt = tokio::time::timeout(CONNECT_TIMEOUT, Connection::open(&self.url, self.cluster))
            .await
            .unwrap_or_else(|_| Err(CacheError::Connection("connect timed out".into())));

        match attempt {
            Ok(conn) => {
                self.connection.store(Some(std::sync::Arc::new(conn)));
                *last_failure = None;
                tracing::info!(url = %self.url, cluster = self.cluster, "Connected to redis");
                Ok(())
            }
            Err(e) => {
                *last_failure = Some(Instant::now());
                tracing::warn!(url = %self.url, cluster = self.cluster, error = %e, "Redis connection failed");
                Err(match e {
                    CacheError::Connection(_) => e,
                    other => CacheError::Connection(other.to_string()),
                })
            }
        }
    }

    async fn connection(&self) -> Result<Connection, CacheError> {
        if let Some(conn) = self.connection.load_full() {
            return Ok((*conn).clone());
        }
        self.establish(true).await?;
        self.connection
            .load_full()
            .map(|conn| (*conn).clone())
            .ok_or_else(|| CacheError::Connection("redis connection closed".into()))
    }
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("url", &self.url)
            .field("cluster", &self.cluster)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn connect(&self) -> Result<(), CacheError> {
        self.establish(false).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.connection().await?.get(key).await?)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<(), CacheError> {
        Ok(self.connection().await?.set_ex(key, value, ttl_secs.max(1)).await?)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let mut conn = self.connection().await?;
        let keys = conn.keys(&prefix_pattern(prefix)).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        Ok(conn.delete(&keys).await?)
    }

    async fn count_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let mut conn = self.connection().await?;
        Ok(conn.keys(&prefix_pattern(prefix)).await?.len())
    }

    async fn close(&self) -> Result<(), CacheError> {
        if self.connection.swap(None).is_some() {
            tracing::info!(url = %self.url, "Redis connection closed");
        }
        Ok(())
    }

    fn cluster_mode(&self) -> bool {
        self.cluster
    }
}

/// Glob pattern matching every key that starts with `prefix` literally.
fn prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('*');
    pattern
}
