//! Farm HTTP endpoints.
//!
//! - POST  /api/v1/farms
//! - GET   /api/v1/farms
//! - PATCH /api/v1/farms/:id/status
//! - GET   /api/v1/farms/:id/history?limit=N

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::db::models::{Farm, FarmStatus, HistoryEntry, NewFarm};
use crate::errors::{AppError, ErrorResponse};
use crate::services::analysis::{FarmAnalysisReport, FarmAnalyzer, RunStatus};
use crate::services::geometry::{Polygon, PolygonInput};
use crate::services::metrics::MetricsRecord;
use crate::services::monitoring::SharedMonitoringState;
use crate::services::prescription::Prescription;

const DEFAULT_HISTORY_LIMIT: i64 = 30;
const MAX_HISTORY_LIMIT: i64 = 365;

/// Shared application state for farm and monitoring endpoints.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) analyzer: Arc<FarmAnalyzer>,
    pub(crate) monitoring: SharedMonitoringState,
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Registration payload. Every field is required; they are optional here so
/// a missing field is reported by name instead of as a generic decode error.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterFarmRequest {
    /// Owner contact e-mail address
    pub contact_address: Option<String>,
    /// Display name of the farm
    pub farm_name: Option<String>,
    /// `[[lon, lat], ...]` or GeoJSON-style `[[[lon, lat], ...]]` (outer ring used)
    #[schema(value_type = Option<Vec<Vec<f64>>>)]
    pub polygon: Option<PolygonInput>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegisterFarmResponse {
    pub farm_id: Uuid,
    /// True when the first analysis produced data
    pub success: bool,
    pub report: FarmAnalysisReport,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FarmResponse {
    pub id: Uuid,
    pub contact_address: String,
    pub name: String,
    /// Boundary ring as stored, `[[lon, lat], ...]`
    #[schema(value_type = Vec<Vec<f64>>)]
    pub polygon: Vec<[f64; 2]>,
    pub activated_at: DateTime<Utc>,
    pub status: FarmStatus,
    pub last_analysis_at: Option<DateTime<Utc>>,
    pub analysis_count: i32,
}

impl From<Farm> for FarmResponse {
    fn from(f: Farm) -> Self {
        Self {
            id: f.id,
            polygon: f.polygon.vertices().iter().map(|c| [c.lon(), c.lat()]).collect(),
            contact_address: f.contact_address,
            name: f.name,
            activated_at: f.activated_at,
            status: f.status,
            last_analysis_at: f.last_analysis_at,
            analysis_count: f.analysis_count,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: FarmStatus,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// Maximum entries to return (default 30, max 365)
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HistoryEntryResponse {
    pub id: Uuid,
    pub analyzed_at: DateTime<Utc>,
    pub metrics: MetricsRecord,
    pub prescriptions: Vec<Prescription>,
    pub notification_sent: bool,
}

impl From<HistoryEntry> for HistoryEntryResponse {
    fn from(h: HistoryEntry) -> Self {
        Self {
            id: h.id,
            analyzed_at: h.entry.analyzed_at,
            metrics: h.entry.metrics,
            prescriptions: h.entry.prescriptions,
            notification_sent: h.entry.notification_sent,
        }
    }
}

fn validate(req: RegisterFarmRequest) -> Result<NewFarm, AppError> {
    let contact = req
        .contact_address
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("contact_address is required".to_string()))?;
    contact
        .parse::<lettre::Address>()
        .map_err(|_| AppError::BadRequest(format!("Invalid contact_address '{}'", contact)))?;

    let name = req
        .farm_name
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("farm_name is required".to_string()))?;

    let polygon: Polygon = req
        .polygon
        .ok_or_else(|| AppError::BadRequest("polygon is required".to_string()))?
        .try_into()?;

    Ok(NewFarm {
        contact_address: contact,
        name,
        polygon,
    })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Register a farm and run its first analysis.
///
/// Input is validated before anything is stored or any data source is queried.
#[utoipa::path(
    post,
    path = "/api/v1/farms",
    tag = "Farms",
    request_body = RegisterFarmRequest,
    responses(
        (status = 201, description = "Farm registered and analysed", body = RegisterFarmResponse),
        (status = 400, description = "Missing or invalid field", body = ErrorResponse),
        (status = 500, description = "Farm could not be stored", body = ErrorResponse),
    )
)]
pub async fn register_farm(
    State(state): State<AppState>,
    payload: Result<Json<RegisterFarmRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterFarmResponse>), AppError> {
    let Json(req) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let new_farm = validate(req)?;

    let farm = state.analyzer.registry().register(new_farm).await?;
    tracing::info!("Registered farm '{}' ({})", farm.name, farm.id);

    let report = state.analyzer.run(&farm).await;

    Ok((
        StatusCode::CREATED,
        Json(RegisterFarmResponse {
            farm_id: farm.id,
            success: report.status == RunStatus::Completed,
            report,
        }),
    ))
}

/// List all active farms.
#[utoipa::path(
    get,
    path = "/api/v1/farms",
    tag = "Farms",
    responses(
        (status = 200, description = "Active farms", body = Vec<FarmResponse>),
    )
)]
pub async fn list_farms(State(state): State<AppState>) -> Result<Json<Vec<FarmResponse>>, AppError> {
    let farms = state.analyzer.registry().list_active().await?;
    Ok(Json(
        farms
            .into_iter()
            .filter_map(Result::ok)
            .map(FarmResponse::from)
            .collect(),
    ))
}

/// Activate or deactivate a farm. Inactive farms are skipped by monitoring runs.
#[utoipa::path(
    patch,
    path = "/api/v1/farms/{id}/status",
    tag = "Farms",
    params(("id" = Uuid, Path, description = "Farm UUID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Updated farm", body = FarmResponse),
        (status = 400, description = "Invalid status", body = ErrorResponse),
        (status = 404, description = "Farm not found", body = ErrorResponse),
    )
)]
pub async fn update_farm_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<FarmResponse>, AppError> {
    let Json(req) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let registry = state.analyzer.registry();

    registry.update_status(id, req.status).await?;
    tracing::info!("Farm {} is now {}", id, req.status);

    let farm = registry.get(id).await?;
    Ok(Json(farm.into()))
}

/// Analysis history for a farm, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/farms/{id}/history",
    tag = "Farms",
    params(
        ("id" = Uuid, Path, description = "Farm UUID"),
        HistoryQuery,
    ),
    responses(
        (status = 200, description = "History entries", body = Vec<HistoryEntryResponse>),
        (status = 404, description = "Farm not found", body = ErrorResponse),
    )
)]
pub async fn get_farm_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryEntryResponse>>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let registry = state.analyzer.registry();

    registry.get(id).await?;
    let entries = registry.history(id, limit).await?;
    Ok(Json(entries.into_iter().map(HistoryEntryResponse::from).collect()))
}
