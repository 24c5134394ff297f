//! Weighted strategies (deterministic round-robin and random).
//!
//! Both map a position in `[0, total_healthy_weight)` onto the server whose
//! cumulative weight range contains it. Round-robin draws the position from a
//! shared cursor, so a weight-3 server occupies three consecutive slots of
//! every cycle; random draws it uniformly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::Rng;

use crate::load_balancer::backend::Server;

pub(crate) fn select_round_robin(
    servers: &[Arc<Server>],
    cursor: &AtomicUsize,
) -> Option<Arc<Server>> {
    let healthy = healthy_snapshot(servers);
    let total = total_weight(&healthy);
    if total == 0 {
        return None;
    }

    let position = cursor.fetch_add(1, Ordering::Relaxed) as u64 % total;
    pick(&healthy, position)
}

pub(crate) fn select_random<R: Rng + ?Sized>(
    servers: &[Arc<Server>],
    rng: &mut R,
) -> Option<Arc<Server>> {
    let healthy = healthy_snapshot(servers);
    let total = total_weight(&healthy);
    if total == 0 {
        return None;
    }

    pick(&healthy, rng.gen_range(0..total))
}

// Health is read once per call so the weight sum and the walk agree.
fn healthy_snapshot(servers: &[Arc<Server>]) -> Vec<&Arc<Server>> {
    servers.iter().filter(|s| s.is_healthy()).collect()
}

fn total_weight(servers: &[&Arc<Server>]) -> u64 {
    servers.iter().map(|s| u64::from(s.weight())).sum()
}

fn pick(servers: &[&Arc<Server>], mut position: u64) -> Option<Arc<Server>> {
    for server in servers {
        let weight = u64::from(server.weight());
        if position < weight {
            return Some(Arc::clone(server));
        }
        position -= weight;
    }
    None
}
