//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::backend::Server;

/// Rotate through servers in registration order.
///
/// The cursor advances once per call; unhealthy servers are skipped by
/// scanning forward from the cursor position.
pub(crate) fn select(servers: &[Arc<Server>], cursor: &AtomicUsize) -> Option<Arc<Server>> {
    if servers.is_empty() {
        return None;
    }

    let len = servers.len();
    // Reduce first so the scan offset cannot overflow when the cursor wraps.
    let start = cursor.fetch_add(1, Ordering::Relaxed) % len;

    (0..len)
        .map(|i| &servers[(start + i) % len])
        .find(|server| server.is_healthy())
        .cloned()
}
