//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → timeouts.rs (enforce the per-call deadline)
//!     → On expiry: the call is cancelled and reported as a timeout
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No retries: a failed call becomes a 502 immediately

pub mod timeouts;
