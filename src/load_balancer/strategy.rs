//! Selection policy names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Load balancing strategy, fixed when the balancer is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BalancingStrategy {
    RoundRobin,
    #[default]
    WeightedRoundRobin,
    Random,
    WeightedRandom,
    LeastConnections,
}

impl BalancingStrategy {
    pub const ALL: [BalancingStrategy; 5] = [
        BalancingStrategy::RoundRobin,
        BalancingStrategy::WeightedRoundRobin,
        BalancingStrategy::Random,
        BalancingStrategy::WeightedRandom,
        BalancingStrategy::LeastConnections,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BalancingStrategy::RoundRobin => "round-robin",
            BalancingStrategy::WeightedRoundRobin => "weighted-round-robin",
            BalancingStrategy::Random => "random",
            BalancingStrategy::WeightedRandom => "weighted-random",
            BalancingStrategy::LeastConnections => "least-connections",
        }
    }
}

impl fmt::Display for BalancingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for unknown strategy names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown balancing strategy: {0}")]
pub struct UnknownStrategy(pub String);

impl FromStr for BalancingStrategy {
    type Err = UnknownStrategy;

    /// Accepts `round-robin`, `ROUND_ROBIN`, `round_robin`, ...
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|s| s.as_str() == normalized)
            .ok_or_else(|| UnknownStrategy(value.to_string()))
    }
}
