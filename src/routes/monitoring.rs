//! Monitoring HTTP endpoints.
//!
//! - POST /api/v1/monitoring/run: analyse every active farm now
//! - GET  /api/v1/monitoring/status: state of the last batch

use axum::extract::State;
use axum::Json;

use super::farms::AppState;
use crate::errors::{AppError, ErrorResponse};
use crate::services::analysis::BatchReport;
use crate::services::monitoring::{run_monitoring, MonitoringState};

/// Run the daily analysis for all active farms.
///
/// Farms are analysed independently; one farm failing is counted in `failed`
/// and does not stop the others.
#[utoipa::path(
    post,
    path = "/api/v1/monitoring/run",
    tag = "Monitoring",
    responses(
        (status = 200, description = "Batch finished", body = BatchReport),
        (status = 409, description = "A batch is already running", body = ErrorResponse),
        (status = 500, description = "Active farms could not be listed", body = ErrorResponse),
    )
)]
pub async fn run_monitoring_batch(
    State(state): State<AppState>,
) -> Result<Json<BatchReport>, AppError> {
    let batch = run_monitoring(&state.analyzer, &state.monitoring).await?;
    Ok(Json(batch))
}

/// Get the state of the most recent monitoring batch.
#[utoipa::path(
    get,
    path = "/api/v1/monitoring/status",
    tag = "Monitoring",
    responses(
        (status = 200, description = "Current monitoring status", body = MonitoringState),
    )
)]
pub async fn get_monitoring_status(State(state): State<AppState>) -> Json<MonitoringState> {
    let s = state.monitoring.read().await;
    Json(s.clone())
}
