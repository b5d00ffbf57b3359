//! Signal collectors.
//!
//! Each collector wraps one raster collection: it owns its lookback windows,
//! band selection and derived-index formulas, and turns region reductions into
//! a `MetricsPatch`. Collectors are independent of each other; adding a source
//! means adding a collector here and registering it in `default_collectors`.

mod optical;
mod precipitation;
mod radar;

pub use optical::OpticalCollector;
pub use precipitation::PrecipitationCollector;
pub use radar::RadarCollector;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::services::geometry::Polygon;
use crate::services::metrics::MetricsPatch;
use crate::services::raster::{RegionReducer, SourceError};

/// Lookback window shared by all collectors (days).
pub const LOOKBACK_DAYS: i64 = 30;

#[async_trait]
pub trait SignalCollector: Send + Sync {
    /// Short source name used in logs and run reports (e.g. `"radar"`).
    fn source(&self) -> &'static str;

    async fn collect(
        &self,
        reducer: &dyn RegionReducer,
        polygon: &Polygon,
        now: DateTime<Utc>,
    ) -> Result<MetricsPatch, SourceError>;
}

/// Result of running one collector for one farm.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectorOutcome {
    Success(MetricsPatch),
    Error { reason: String },
}

/// Per-source status reported with every analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CollectorStatus {
    Success,
    Error { reason: String },
}

impl CollectorOutcome {
    pub fn status(&self) -> CollectorStatus {
        match self {
            CollectorOutcome::Success(_) => CollectorStatus::Success,
            CollectorOutcome::Error { reason } => CollectorStatus::Error {
                reason: reason.clone(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CollectorOutcome::Success(_))
    }
}

/// Run a collector with a time bound, converting every failure into an
/// `Error` outcome. Never fails.
pub async fn run_collector(
    collector: &dyn SignalCollector,
    reducer: &dyn RegionReducer,
    polygon: &Polygon,
    now: DateTime<Utc>,
    timeout_secs: u64,
) -> CollectorOutcome {
    let limit = std::time::Duration::from_secs(timeout_secs);
    match tokio::time::timeout(limit, collector.collect(reducer, polygon, now)).await {
        Ok(Ok(patch)) => CollectorOutcome::Success(patch),
        Ok(Err(e)) => {
            tracing::error!("Collector '{}' failed: {}", collector.source(), e);
            CollectorOutcome::Error {
                reason: e.to_string(),
            }
        }
        Err(_) => {
            let e = SourceError::Timeout(timeout_secs);
            tracing::error!("Collector '{}' failed: {}", collector.source(), e);
            CollectorOutcome::Error {
                reason: e.to_string(),
            }
        }
    }
}

/// The production collector set.
pub fn default_collectors() -> Vec<Box<dyn SignalCollector>> {
    vec![
        Box::new(PrecipitationCollector),
        Box::new(RadarCollector),
        Box::new(OpticalCollector),
    ]
}
