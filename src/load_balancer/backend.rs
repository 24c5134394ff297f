//! Backend server abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream endpoint (identity + weight)
//! - Track active connections (for Least Connections LB)
//! - Track health state (flag set externally or by the health monitor)

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// A single backend server.
#[derive(Debug)]
pub struct Server {
    /// Identity in `host:port` form.
    name: String,
    /// Relative weight for the weighted strategies (always >= 1).
    weight: u32,
    /// Health flag, re-read on every selection.
    healthy: AtomicBool,
    /// Number of currently active connections.
    active_connections: AtomicUsize,
    /// Consecutive failure count.
    consecutive_failures: AtomicUsize,
    /// Consecutive success count.
    consecutive_successes: AtomicUsize,
}

impl Server {
    /// Create a new, healthy server. A weight of 0 is raised to 1.
    pub fn new(name: impl Into<String>, weight: u32) -> Self {
        Self {
            name: name.into(),
            weight: weight.max(1),
            healthy: AtomicBool::new(true),
            active_connections: AtomicUsize::new(0),
            consecutive_failures: AtomicUsize::new(0),
            consecutive_successes: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Base URL used when forwarding to this server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.name)
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    /// Set the health flag directly.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Release);
    }

    /// Get the current number of active connections.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Acquire)
    }

    /// Take a connection slot on this exact server.
    ///
    /// The slot is given back when the returned guard is dropped.
    pub fn acquire(self: &Arc<Self>) -> ServerGuard {
        self.active_connections.fetch_add(1, Ordering::AcqRel);
        ServerGuard {
            server: Arc::clone(self),
        }
    }

    /// Saturating decrement; the count never goes below zero.
    fn release(&self) {
        let _ = self
            .active_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    // --- Health Logic ---

    /// Report a successful probe. Marks the server healthy after
    /// `healthy_threshold` consecutive successes. Returns true on transition.
    pub fn mark_success(&self, healthy_threshold: usize) -> bool {
        self.consecutive_failures.store(0, Ordering::Relaxed);

        if self.is_healthy() {
            return false;
        }

        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
        if successes >= healthy_threshold {
            self.consecutive_successes.store(0, Ordering::Relaxed);
            self.set_healthy(true);
            return true;
        }
        false
    }

    /// Report a failed probe. Marks the server unhealthy after
    /// `unhealthy_threshold` consecutive failures. Returns true on transition.
    pub fn mark_failure(&self, unhealthy_threshold: usize) -> bool {
        self.consecutive_successes.store(0, Ordering::Relaxed);

        if !self.is_healthy() {
            return false;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= unhealthy_threshold {
            self.consecutive_failures.store(0, Ordering::Relaxed);
            self.set_healthy(false);
            return true;
        }
        false
    }
}

/// A RAII guard that holds one connection slot on a specific server.
#[derive(Debug)]
pub struct ServerGuard {
    server: Arc<Server>,
}

impl ServerGuard {
    /// The server this slot belongs to.
    pub fn server(&self) -> &Arc<Server> {
        &self.server
    }
}

impl Deref for ServerGuard {
    type Target = Server;
    fn deref(&self) -> &Self::Target {
        &self.server
    }
}

impl Drop for ServerGuard {
    fn drop(&mut self) {
        self.server.release();
    }
}
