//! Startup orchestration.
//!
//! # Order
//! metrics exporter → cache store (connect, failure tolerated) → load
//! balancer → proxy → health monitor → admin listener → proxy listener.
//! On shutdown the listeners drain first and the cache store is closed last.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::admin::{setup_admin_router, AdminState};
use crate::cache::{CacheKeyDeriver, CacheStore};
use crate::config::ProxyConfig;
use crate::health::HealthMonitor;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::load_balancer::LoadBalancer;
use crate::observability::metrics;
use crate::proxy::{CachingProxy, ReqwestUpstream};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid address {0}")]
    Address(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Build the proxy and its collaborators from configuration. Does not connect.
pub fn build_proxy(config: &ProxyConfig) -> Result<Arc<CachingProxy>, StartupError> {
    let cache = CacheStore::from_config(&config.cache);

    let balancer = config.load_balancer.enabled.then(|| {
        let lb = LoadBalancer::from_config(&config.load_balancer);
        tracing::info!(
            strategy = %lb.strategy(),
            backends = lb.servers().len(),
            "Load balancer configured"
        );
        Arc::new(lb)
    });

    let upstream = Arc::new(ReqwestUpstream::new(&config.upstream)?);

    Ok(Arc::new(CachingProxy::new(
        cache,
        CacheKeyDeriver::new(&config.cache.key_ignored_headers),
        balancer,
        config.upstream.origin.clone(),
        upstream,
        Duration::from_secs(config.upstream.timeout_secs),
    )))
}

/// Bind the configured listener and serve until SIGINT or SIGTERM.
pub async fn run(config: ProxyConfig) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::Address(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let listener = bind(&config.listener.bind_address).await?;

    let shutdown = Arc::new(Shutdown::new());
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        let signal = signals::wait_for_signal().await;
        tracing::info!(signal, "Shutdown signal received");
        trigger.trigger();
    });

    serve(config, listener, shutdown).await
}

/// Start every subsystem around an already bound proxy listener.
pub async fn serve(
    config: ProxyConfig,
    listener: TcpListener,
    shutdown: Arc<Shutdown>,
) -> Result<(), StartupError> {
    let proxy = build_proxy(&config)?;

    match proxy.cache().connect().await {
        Ok(()) => tracing::info!(cluster = proxy.cache().cluster_mode(), "Cache store connected"),
        Err(e) => tracing::warn!(error = %e, "Cache store unavailable, serving uncached until it recovers"),
    }

    if config.health_check.enabled {
        if let Some(lb) = proxy.balancer() {
            let monitor = HealthMonitor::new(lb.clone(), config.health_check.clone())?;
            tokio::spawn(monitor.run(shutdown.subscribe()));
        }
    }

    if config.admin.enabled {
        let admin_listener = bind(&config.admin.bind_address).await?;
        let router = setup_admin_router(AdminState {
            proxy: proxy.clone(),
            api_key: Arc::from(config.admin.api_key.as_str()),
        });
        let mut admin_shutdown = shutdown.subscribe();
        tracing::info!(address = %config.admin.bind_address, "Admin API listening");
        tokio::spawn(async move {
            let result = axum::serve(admin_listener, router)
                .with_graceful_shutdown(async move {
                    let _ = admin_shutdown.recv().await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Admin API stopped");
            }
        });
    }

    let server = HttpServer::new(&config.listener, proxy.clone());
    server.run(listener, shutdown.subscribe()).await?;

    if let Err(e) = proxy.cache().close().await {
        tracing::warn!(error = %e, "Cache store close failed");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
}
