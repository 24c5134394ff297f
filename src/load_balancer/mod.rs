//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Cache miss
//!     → pool.rs (LoadBalancer::acquire)
//!     → Apply the configured strategy over healthy servers:
//!         - round_robin.rs (rotate through servers)
//!         - weighted.rs (weighted round-robin / weighted random)
//!         - random.rs (uniform pick)
//!         - least_conn.rs (pick server with fewest connections)
//!     → backend.rs (ServerGuard holds the slot until the request ends)
//!     → None: caller falls back to the static origin
//! ```
//!
//! # Design Decisions
//! - Strategy is a closed enum fixed at construction
//! - Selection functions are pure over (servers, cursor/rng)
//! - Unhealthy servers excluded from selection
//! - Connection accounting is RAII, released on every exit path

pub mod backend;
pub mod least_conn;
pub mod pool;
pub mod random;
pub mod round_robin;
pub mod strategy;
pub mod weighted;

pub use backend::{Server, ServerGuard};
pub use pool::LoadBalancer;
pub use strategy::{BalancingStrategy, UnknownStrategy};
