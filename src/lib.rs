//! Caching HTTP reverse proxy.
//!
//! Responses to GET and HEAD requests are stored in a shared cache (Redis or
//! in-process) keyed by a digest of the request; misses are forwarded to a
//! pool of backends chosen by a load-balancing strategy, or to a static
//! origin when no pool is configured or no backend is healthy.

// Core subsystems
pub mod cache;
pub mod config;
pub mod http;
pub mod proxy;

// Traffic management
pub mod health;
pub mod load_balancer;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use proxy::CachingProxy;
