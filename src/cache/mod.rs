//! Shared response cache.
//!
//! # Data Flow
//! ```text
//! request descriptor
//!     → key.rs (CacheKeyDeriver → CacheKey)
//!     → store.rs (CacheStore: namespace, TTL, decode)
//!     → backend.rs (KvBackend)
//!         ├─ redis.rs  (single node or cluster)
//!         └─ memory.rs (in-process)
//! ```
//!
//! # Design Decisions
//! - The cache is a performance layer: callers treat every error as a miss
//! - Entries carry their own TTL in addition to the backend expiry
//! - Backends are trait objects chosen once at startup

pub mod backend;
pub mod entry;
pub mod error;
pub mod key;
pub mod memory;
pub mod redis;
pub mod store;

pub use backend::KvBackend;
pub use entry::CacheEntry;
pub use error::CacheError;
pub use key::{CacheKey, CacheKeyDeriver, DEFAULT_IGNORED_HEADERS};
pub use memory::MemoryBackend;
pub use self::redis::RedisBackend;
pub use store::{CacheStats, CacheStore};
