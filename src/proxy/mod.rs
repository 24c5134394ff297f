//! Request orchestration.
//!
//! # Data Flow
//! ```text
//! ProxyRequest (buffered)
//!     → CacheKeyDeriver (key)
//!     → GET/HEAD: CacheStore lookup ── hit ──▶ ProxyResponse (HIT)
//!     → miss: LoadBalancer::acquire (or static origin)
//!     → upstream.rs (send under timeout)
//!     → strip hop-by-hop, store 2xx GET/HEAD
//!     → ProxyResponse (MISS | ERROR)
//! ```
//!
//! # Design Decisions
//! - Cache failures are absorbed here and never change the status code
//! - The backend slot is an RAII guard scoped to the forwarding future
//! - Stats are plain atomics readable from the admin API at any time

pub mod orchestrator;
pub mod stats;
pub mod upstream;

pub use orchestrator::{is_cacheable, CacheStatus, CachingProxy, ProxyRequest, ProxyResponse};
pub use stats::{ProxyStats, StatsSnapshot};
pub use upstream::{ReqwestUpstream, Upstream, UpstreamError, UpstreamRequest, UpstreamResponse};
