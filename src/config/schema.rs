//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::load_balancer::BalancingStrategy;

/// Root configuration for the caching proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, limits).
    pub listener: ListenerConfig,

    /// Static origin and outbound client settings.
    pub upstream: UpstreamConfig,

    /// Shared response cache.
    pub cache: CacheConfig,

    /// Backend pool and balancing strategy.
    pub load_balancer: LoadBalancerConfig,

    /// Active health check settings.
    pub health_check: HealthCheckConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum requests processed concurrently (backpressure).
    pub max_in_flight: usize,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_in_flight: 10_000,
            max_body_size: 10 * 1024 * 1024,
        }
    }
}

/// Origin and outbound HTTP client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Fallback origin URL used when no backend is selected.
    pub origin: String,

    /// Total time allowed for one backend call, in seconds.
    pub timeout_secs: u64,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// How long idle pooled connections are kept, in seconds.
    pub pool_idle_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:3000".to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 5,
            pool_idle_timeout_secs: 90,
        }
    }
}

/// Which key-value backend holds the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    #[default]
    Redis,
    Memory,
}

/// Cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,

    pub redis_host: String,

    pub redis_port: u16,

    /// Connect to a Redis cluster instead of a single node.
    pub cluster: bool,

    /// Time-to-live of stored responses, in seconds.
    pub ttl_secs: u64,

    /// Namespace prepended to every stored key.
    pub key_prefix: String,

    /// Request headers left out of cache key derivation.
    pub key_ignored_headers: Vec<String>,

    /// Deadline for a single cache read or write, in milliseconds.
    pub operation_timeout_ms: u64,
}

impl CacheConfig {
    /// Connection URL for the configured Redis node.
    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}/", self.redis_host, self.redis_port)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Redis,
            redis_host: "localhost".to_string(),
            redis_port: 6379,
            cluster: false,
            ttl_secs: 3600,
            key_prefix: "caching-proxy:".to_string(),
            key_ignored_headers: crate::cache::key::DEFAULT_IGNORED_HEADERS
                .iter()
                .map(|h| h.to_string())
                .collect(),
            operation_timeout_ms: 500,
        }
    }
}

/// Load balancer configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LoadBalancerConfig {
    /// Route cache misses through the pool instead of the origin.
    pub enabled: bool,

    pub strategy: BalancingStrategy,

    /// Backend server definitions, in selection order.
    pub servers: Vec<BackendConfig>,
}

/// Backend server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BackendConfig {
    /// Backend address (e.g., "127.0.0.1:3000").
    pub address: String,

    /// Weight for weighted load balancing (default: 1).
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// Largest weight a command-line descriptor may carry. Anything bigger is far
/// more likely a port written as `host:port` than a real weight.
pub const MAX_DESCRIPTOR_WEIGHT: u32 = 1000;

/// Invalid `name[:weight]` or `host:port:weight` descriptor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid backend descriptor '{descriptor}': {reason}")]
pub struct InvalidDescriptor {
    pub descriptor: String,
    pub reason: &'static str,
}

impl FromStr for BackendConfig {
    type Err = InvalidDescriptor;

    /// Parse a command-line descriptor.
    ///
    /// `name:weight` → `name` on the default port with that weight;
    /// `host:port:weight` → explicit port; `name` → weight 1.
    /// A backend on a non-default port therefore needs all three segments.
    fn from_str(descriptor: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| InvalidDescriptor {
            descriptor: descriptor.to_string(),
            reason,
        };

        let parts: Vec<&str> = descriptor.trim().split(':').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid("empty segment"));
        }

        let (address, weight) = match parts.as_slice() {
            [host] => (host.to_string(), 1),
            [name, weight] => (name.to_string(), parse_weight(weight).map_err(invalid)?),
            [host, port, weight] => {
                port.parse::<u16>().map_err(|_| invalid("port is not a number"))?;
                (format!("{host}:{port}"), parse_weight(weight).map_err(invalid)?)
            }
            _ => return Err(invalid("too many ':' separators")),
        };

        Ok(BackendConfig { address, weight })
    }
}

fn parse_weight(segment: &str) -> Result<u32, &'static str> {
    let weight = segment
        .parse::<u32>()
        .map_err(|_| "weight is not a number")?;
    match weight {
        0 => Err("weight must be at least 1"),
        w if w > MAX_DESCRIPTOR_WEIGHT => {
            Err("weight above 1000; use host:port:weight for a backend port")
        }
        w => Ok(w),
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable active health checks.
    pub enabled: bool,

    /// Health check interval in seconds.
    pub interval_secs: u64,

    /// Health check timeout in seconds.
    pub timeout_secs: u64,

    /// Path to probe for HTTP health checks.
    pub path: String,

    /// Number of consecutive failures before marking unhealthy.
    pub unhealthy_threshold: u32,

    /// Number of consecutive successes before marking healthy.
    pub healthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 10,
            timeout_secs: 5,
            path: "/health".to_string(),
            unhealthy_threshold: 3,
            healthy_threshold: 2,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
