//! Backend pool management.
//!
//! # Responsibilities
//! - Own the ordered server pool and the selection state
//! - Dispatch to the configured strategy
//! - Hand out connection guards for accounting

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use rand::Rng;

use crate::config::LoadBalancerConfig;
use crate::load_balancer::{
    backend::{Server, ServerGuard},
    least_conn, random, round_robin, weighted, BalancingStrategy,
};

/// Server pool plus the strategy used to pick from it.
#[derive(Debug)]
pub struct LoadBalancer {
    servers: Vec<Arc<Server>>,
    strategy: BalancingStrategy,
    /// Shared by both round-robin variants; only one is ever active.
    cursor: AtomicUsize,
}

impl LoadBalancer {
    /// Create a balancer over `servers`, kept in the given order.
    pub fn new(servers: Vec<Server>, strategy: BalancingStrategy) -> Self {
        Self {
            servers: servers.into_iter().map(Arc::new).collect(),
            strategy,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Build from the `[load_balancer]` config section.
    pub fn from_config(config: &LoadBalancerConfig) -> Self {
        let servers = config
            .servers
            .iter()
            .map(|b| Server::new(b.address.clone(), b.weight))
            .collect();
        Self::new(servers, config.strategy)
    }

    pub fn strategy(&self) -> BalancingStrategy {
        self.strategy
    }

    /// All servers in registration order.
    pub fn servers(&self) -> &[Arc<Server>] {
        &self.servers
    }

    /// Pick the next healthy server, or `None` if there is none.
    pub fn next_server(&self) -> Option<Arc<Server>> {
        self.next_server_with(&mut rand::thread_rng())
    }

    /// Same as [`next_server`](Self::next_server) with a caller-provided RNG
    /// for the random strategies.
    pub fn next_server_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<Arc<Server>> {
        let selected = match self.strategy {
            BalancingStrategy::RoundRobin => round_robin::select(&self.servers, &self.cursor),
            BalancingStrategy::WeightedRoundRobin => {
                weighted::select_round_robin(&self.servers, &self.cursor)
            }
            BalancingStrategy::Random => random::select(&self.servers, rng),
            BalancingStrategy::WeightedRandom => weighted::select_random(&self.servers, rng),
            BalancingStrategy::LeastConnections => least_conn::select(&self.servers),
        };

        if selected.is_none() {
            tracing::debug!(
                strategy = %self.strategy,
                backend_count = self.servers.len(),
                "No healthy backends available"
            );
        }
        selected
    }

    /// Select a server and take a connection slot on it.
    /// The slot is released when the guard is dropped.
    pub fn acquire(&self) -> Option<ServerGuard> {
        self.next_server().map(|server| server.acquire())
    }
}
