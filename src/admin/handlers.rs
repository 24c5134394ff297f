use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::cache::CacheStats;
use crate::proxy::StatsSnapshot;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub load_balancing: bool,
}

#[derive(Serialize)]
pub struct BackendStatus {
    pub name: String,
    pub weight: u32,
    pub healthy: bool,
    pub active_connections: usize,
}

#[derive(Serialize)]
pub struct ClearResult {
    pub cleared: bool,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        load_balancing: state.proxy.balancer().is_some(),
    })
}

pub async fn get_stats(State(state): State<AdminState>) -> Json<StatsSnapshot> {
    Json(state.proxy.stats().snapshot())
}

pub async fn get_backends(State(state): State<AdminState>) -> Json<Vec<BackendStatus>> {
    let statuses = state
        .proxy
        .balancer()
        .map(|lb| {
            lb.servers()
                .iter()
                .map(|s| BackendStatus {
                    name: s.name().to_string(),
                    weight: s.weight(),
                    healthy: s.is_healthy(),
                    active_connections: s.active_connections(),
                })
                .collect()
        })
        .unwrap_or_default();

    Json(statuses)
}

pub async fn get_cache(
    State(state): State<AdminState>,
) -> Result<Json<CacheStats>, (StatusCode, Json<ErrorBody>)> {
    state.proxy.cache().get_stats().await.map(Json).map_err(|e| {
        tracing::warn!(error = %e, "Cache stats unavailable");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorBody {
                error: "cache unavailable",
            }),
        )
    })
}

pub async fn clear_cache(State(state): State<AdminState>) -> Json<ClearResult> {
    Json(ClearResult {
        cleared: state.proxy.cache().clear_all().await,
    })
}
