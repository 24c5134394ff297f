//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, body buffering)
//!     → proxy::CachingProxy (cache, load balancer, forwarding)
//!     → request.rs (headers allowed to reach a backend)
//!     → response.rs (strip hop-by-hop, stamp X-Cache)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use response::{X_CACHE, X_CACHE_KEY};
pub use server::{AppState, HttpServer, X_REQUEST_ID};
