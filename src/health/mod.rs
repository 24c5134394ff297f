//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe each backend (GET <path>)
//!     → Server::mark_success / mark_failure
//!     → LoadBalancer skips unhealthy servers on the next selection
//! ```
//!
//! # Design Decisions
//! - State transitions require consecutive successes/failures
//! - Health state is per-server and read lock-free on every selection

pub mod active;

pub use active::HealthMonitor;
