use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::monitoring::MonitoringError;
use crate::services::registry::RegistryError;

/// Standard error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::DatabaseError(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal database error".to_string(),
                )
            }
        };

        (status, axum::Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Database(e) => AppError::DatabaseError(e),
            RegistryError::NotFound(id) => AppError::NotFound(format!("Farm {} not found", id)),
            RegistryError::Corrupt(msg) => {
                AppError::InternalError(format!("Stored farm record is invalid: {}", msg))
            }
        }
    }
}

impl From<MonitoringError> for AppError {
    fn from(err: MonitoringError) -> Self {
        match err {
            MonitoringError::AlreadyRunning => AppError::Conflict(err.to_string()),
            MonitoringError::Registry(e) => e.into(),
        }
    }
}

impl From<crate::services::geometry::PolygonError> for AppError {
    fn from(err: crate::services::geometry::PolygonError) -> Self {
        AppError::BadRequest(format!("Invalid polygon: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT),
            (
                AppError::InternalError("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_registry_not_found_maps_to_404() {
        let err: AppError = RegistryError::NotFound(Uuid::nil()).into();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_overlapping_batch_maps_to_409() {
        let err: AppError = MonitoringError::AlreadyRunning.into();
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }
}
