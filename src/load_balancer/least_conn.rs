//! Least Connections load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::backend::Server;

/// Selects the healthy server with the fewest active connections.
/// In case of tie, the first registered one wins.
pub(crate) fn select(servers: &[Arc<Server>]) -> Option<Arc<Server>> {
    servers
        .iter()
        .filter(|s| s.is_healthy())
        .min_by_key(|s| s.active_connections())
        .cloned()
}
