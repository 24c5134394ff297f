//! Caching reverse proxy.
//!
//! ```text
//!                   ┌──────────────────────────────────────────────┐
//!  Client ─────────▶│ http::server ─▶ proxy::CachingProxy          │
//!                   │                   │                          │
//!                   │          hit ◀────┤ cache::CacheStore ◀──▶ Redis / memory
//!                   │                   │                          │
//!                   │          miss ───▶ load_balancer ─▶ backend  │──▶ Backends
//!                   │                    (or static origin)        │    / Origin
//!                   │                                              │
//!                   │  health monitor · admin API · metrics · logs │
//!                   └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use caching_proxy::cache::CacheStore;
use caching_proxy::config::{
    read_config, validate_config, BackendConfig, CacheBackendKind, ConfigError, ProxyConfig,
};
use caching_proxy::lifecycle;
use caching_proxy::load_balancer::BalancingStrategy;
use caching_proxy::observability::logging;

#[derive(Parser)]
#[command(name = "caching-proxy", version)]
#[command(about = "Caching HTTP reverse proxy with load balancing", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proxy until SIGINT or SIGTERM
    Start(StartArgs),
    /// Remove every cached response
    ClearCache(StoreArgs),
    /// Show the number of cached responses
    Stats(StoreArgs),
}

/// Cache store selection, shared by every subcommand.
#[derive(Args)]
struct StoreArgs {
    /// TOML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    redis_host: Option<String>,

    #[arg(long)]
    redis_port: Option<u16>,

    /// Connect to a Redis cluster
    #[arg(long)]
    use_cluster: bool,
}

#[derive(Args)]
struct StartArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Origin URL used when no backend pool is available
    #[arg(short, long)]
    origin: Option<String>,

    /// Cache TTL in seconds
    #[arg(long)]
    cache_ttl: Option<u64>,

    /// Keep the cache in process memory instead of Redis
    #[arg(long)]
    memory_cache: bool,

    /// Balance requests over --servers
    #[arg(long)]
    load_balance: bool,

    /// Backend as name[:weight] or host:port:weight; repeat for each backend
    #[arg(long = "servers", num_args = 1..)]
    servers: Vec<BackendConfig>,

    #[arg(long, value_enum)]
    strategy: Option<BalancingStrategy>,
}

impl StoreArgs {
    fn load(&self) -> Result<ProxyConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => ProxyConfig::default(),
        };
        if let Some(host) = &self.redis_host {
            config.cache.redis_host = host.clone();
        }
        if let Some(port) = self.redis_port {
            config.cache.redis_port = port;
        }
        if self.use_cluster {
            config.cache.cluster = true;
        }
        Ok(config)
    }
}

impl StartArgs {
    fn load(&self) -> Result<ProxyConfig, ConfigError> {
        let mut config = self.store.load()?;

        if let Some(port) = self.port {
            config.listener.bind_address = with_port(&config.listener.bind_address, port);
        }
        if let Some(origin) = &self.origin {
            config.upstream.origin = origin.clone();
        }
        if let Some(ttl) = self.cache_ttl {
            config.cache.ttl_secs = ttl;
        }
        if self.memory_cache {
            config.cache.backend = CacheBackendKind::Memory;
        }
        if !self.servers.is_empty() {
            config.load_balancer.servers = self.servers.clone();
        }
        if self.load_balance || !self.servers.is_empty() {
            config.load_balancer.enabled = true;
        }
        if let Some(strategy) = self.strategy {
            config.load_balancer.strategy = strategy;
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

/// Replace the port of a `host:port` bind address.
fn with_port(bind_address: &str, port: u16) -> String {
    let host = bind_address
        .rsplit_once(':')
        .map_or(bind_address, |(host, _)| host);
    format!("{host}:{port}")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start(args) => {
            let config = args.load()?;
            logging::init(&config.observability.log_level);
            tracing::info!(
                version = env!("CARGO_PKG_VERSION"),
                bind_address = %config.listener.bind_address,
                origin = %config.upstream.origin,
                cache = ?config.cache.backend,
                load_balancing = config.load_balancer.enabled,
                "caching-proxy starting"
            );
            lifecycle::run(config).await?;
        }
        Commands::ClearCache(args) => {
            let store = connect_store(&args).await?;
            let cleared = store.clear_all().await;
            let _ = store.close().await;
            if !cleared {
                return Err("failed to clear cache".into());
            }
            println!("Cache cleared");
        }
        Commands::Stats(args) => {
            let store = connect_store(&args).await?;
            let stats = store.get_stats().await;
            let _ = store.close().await;
            let stats = stats?;
            println!("Total cached entries: {}", stats.total_keys);
            println!("Cluster mode: {}", stats.cluster_mode);
        }
    }

    Ok(())
}

async fn connect_store(args: &StoreArgs) -> Result<CacheStore, Box<dyn std::error::Error>> {
    let config = args.load()?;
    logging::init(&config.observability.log_level);
    let store = CacheStore::from_config(&config.cache);
    store.connect().await?;
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_port() {
        assert_eq!(with_port("0.0.0.0:8080", 9000), "0.0.0.0:9000");
        assert_eq!(with_port("localhost", 81), "localhost:81");
    }

    #[test]
    fn test_start_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "caching-proxy",
            "start",
            "-p",
            "9000",
            "-o",
            "http://origin:3000",
            "--cache-ttl",
            "0",
            "--memory-cache",
            "--servers",
            "a:80:3",
            "b:2",
            "c",
            "--strategy",
            "least-connections",
        ])
        .unwrap();

        let Commands::Start(args) = cli.command else {
            panic!("expected start");
        };
        let config = args.load().unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:9000");
        assert_eq!(config.upstream.origin, "http://origin:3000");
        assert_eq!(config.cache.ttl_secs, 0);
        assert_eq!(config.cache.backend, CacheBackendKind::Memory);
        assert!(config.load_balancer.enabled);
        assert_eq!(config.load_balancer.strategy, BalancingStrategy::LeastConnections);
        assert_eq!(
            config.load_balancer.servers,
            vec![
                BackendConfig { address: "a:80".into(), weight: 3 },
                BackendConfig { address: "b".into(), weight: 2 },
                BackendConfig { address: "c".into(), weight: 1 },
            ]
        );
    }

    #[test]
    fn test_bad_descriptor_rejected() {
        assert!(Cli::try_parse_from(["caching-proxy", "start", "--servers", "a:80:0"]).is_err());
    }

    #[test]
    fn test_store_flags() {
        let cli = Cli::try_parse_from([
            "caching-proxy",
            "stats",
            "--redis-host",
            "cache.internal",
            "--redis-port",
            "7000",
            "--use-cluster",
        ])
        .unwrap();
        let Commands::Stats(args) = cli.command else {
            panic!("expected stats");
        };
        let config = args.load().unwrap();
        assert_eq!(config.cache.redis_url(), "redis://cache.internal:7000/");
        assert!(config.cache.cluster);
    }
}
