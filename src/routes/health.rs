use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::services::monitoring::{MonitoringState, SharedMonitoringState};

#[derive(Clone)]
pub struct HealthState {
    pub pool: PgPool,
    pub monitoring: SharedMonitoringState,
}

/// Liveness of the farm store plus the monitoring scheduler's last activity.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" when the farm store answers, "degraded" otherwise
    pub status: String,
    pub version: String,
    pub database: bool,
    /// A batch is in progress
    pub monitoring_running: bool,
    pub last_batch_completed_at: Option<DateTime<Utc>>,
}

fn summarize(database: bool, monitoring: &MonitoringState) -> HealthResponse {
    HealthResponse {
        status: if database { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
        monitoring_running: monitoring.running,
        last_batch_completed_at: monitoring.last_completed_at,
    }
}

/// Service health.
///
/// Answers 200 even when the farm store is down; monitoring batches would
/// then fail to list farms, so the status reads "degraded".
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Farm store and monitoring status", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<HealthState>) -> Json<HealthResponse> {
    let db_ok = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.pool)
        .await
        .is_ok();

    if !db_ok {
        tracing::warn!("Health check: farm store unreachable");
    }

    let monitoring = state.monitoring.read().await;
    Json(summarize(db_ok, &monitoring))
}
