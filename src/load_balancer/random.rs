//! Uniform random load balancing strategy.

use std::sync::Arc;

use rand::Rng;

use crate::load_balancer::backend::Server;

pub(crate) fn select<R: Rng + ?Sized>(servers: &[Arc<Server>], rng: &mut R) -> Option<Arc<Server>> {
    let healthy: Vec<&Arc<Server>> = servers.iter().filter(|s| s.is_healthy()).collect();
    if healthy.is_empty() {
        return None;
    }
    Some(Arc::clone(healthy[rng.gen_range(0..healthy.len())]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_random_covers_all_healthy() {
        let servers: Vec<_> = (0..3)
            .map(|i| Arc::new(Server::new(format!("127.0.0.1:{}", 8080 + i), 1)))
            .collect();
        servers[2].set_healthy(false);
        let mut rng = StdRng::seed_from_u64(42);

        let mut counts = [0usize; 3];
        for _ in 0..3000 {
            let s = select(&servers, &mut rng).unwrap();
            let idx = servers.iter().position(|b| Arc::ptr_eq(b, &s)).unwrap();
            counts[idx] += 1;
        }

        assert_eq!(counts[2], 0);
        assert!(counts[0] > 1200 && counts[1] > 1200, "{counts:?}");
    }

    #[test]
    fn test_random_empty() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(select(&[], &mut rng).is_none());
    }
}
