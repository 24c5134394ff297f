//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every pool backend
//! - Flip backend health after consecutive failures or successes

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::load_balancer::{LoadBalancer, Server};
use crate::observability::metrics;

pub struct HealthMonitor {
    balancer: Arc<LoadBalancer>,
    config: HealthCheckConfig,
    client: reqwest::Client,
}

impl HealthMonitor {
    pub fn new(balancer: Arc<LoadBalancer>, config: HealthCheckConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .user_agent("caching-proxy-health-check")
            .build()?;

        Ok(Self {
            balancer,
            config,
            client,
        })
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            path = %self.config.path,
            backends = self.balancer.servers().len(),
            "Health monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every backend once, concurrently.
    pub async fn check_all(&self) {
        let probes = self.balancer.servers().iter().map(|server| self.check(server));
        futures_util::future::join_all(probes).await;
    }

    async fn check(&self, server: &Arc<Server>) {
        let url = format!("{}{}", server.base_url(), self.config.path);

        let healthy = match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::warn!(backend = server.name(), status = %response.status(), "Health check failed: non-success status");
                false
            }
            Err(e) if e.is_timeout() => {
                tracing::warn!(backend = server.name(), "Health check failed: timeout");
                false
            }
            Err(e) => {
                tracing::warn!(backend = server.name(), error = %e, "Health check failed: connection error");
                false
            }
        };

        let changed = if healthy {
            server.mark_success(self.config.healthy_threshold as usize)
        } else {
            server.mark_failure(self.config.unhealthy_threshold as usize)
        };
        if changed {
            tracing::info!(backend = server.name(), healthy = server.is_healthy(), "Backend health changed");
        }

        metrics::record_backend_health(server.name(), server.is_healthy());
    }
}
