//! Raster/time-series query service client.
//!
//! The source exposes named image collections and a region-reduction
//! primitive: filter acquisitions, evaluate a band expression per pixel,
//! composite over a date range and reduce over a polygon to one number.
//!
//! - `POST {base}/v1/reduce` → `{"value": number | null}`
//! - `POST {base}/v1/series` → `{"points": [{"time": RFC3339, "value": number | null}]}`

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::band_math::BandExpr;
use crate::services::geometry::Polygon;

/// Pixel budget per reduction, matching the source's hard ceiling.
const MAX_PIXELS: f64 = 1e9;

/// Errors surfaced by the raster source. Collectors recover from all of them.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("raster request failed: {0}")]
    Request(String),

    #[error("raster request timed out after {0}s")]
    Timeout(u64),

    #[error("raster source returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("raster response could not be decoded: {0}")]
    Malformed(String),
}

/// How acquisitions and pixels are aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    Sum,
    Mean,
}

/// Acquisition-level metadata filter, applied before any statistic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SceneFilter {
    ListContains {
        property: &'static str,
        value: &'static str,
    },
    Equals {
        property: &'static str,
        value: &'static str,
    },
    LessThan {
        property: &'static str,
        value: f64,
    },
}

/// Half-open date range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// The `days` days ending at `end`.
    pub fn trailing_days(end: DateTime<Utc>, days: i64) -> Self {
        Self {
            start: end - Duration::days(days),
            end,
        }
    }
}

/// One region-reduction query.
#[derive(Debug, Clone, PartialEq)]
pub struct ReductionRequest {
    pub collection: &'static str,
    pub filters: Vec<SceneFilter>,
    pub expression: BandExpr,
    pub statistic: Statistic,
    /// Spatial resolution in metres.
    pub scale_m: u32,
    pub window: TimeWindow,
}

/// One acquisition's reduced value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeriesPoint {
    pub time: DateTime<Utc>,
    pub value: Option<f64>,
}

/// Region-reduction primitive consumed by the signal collectors.
#[async_trait]
pub trait RegionReducer: Send + Sync {
    /// Reduce the collection to a single value over the polygon and window.
    ///
    /// `Ok(None)` means no acquisition intersected the polygon and window.
    async fn reduce(
        &self,
        polygon: &Polygon,
        request: &ReductionRequest,
    ) -> Result<Option<f64>, SourceError>;

    /// Reduce every acquisition separately, oldest first.
    ///
    /// With `latest = Some(n)` only the `n` most recent acquisitions are returned.
    async fn reduce_series(
        &self,
        polygon: &Polygon,
        request: &ReductionRequest,
        latest: Option<usize>,
    ) -> Result<Vec<SeriesPoint>, SourceError>;
}

// --- wire types ---

#[derive(Debug, Serialize)]
struct ReduceBody<'a> {
    collection: &'a str,
    filters: &'a [SceneFilter],
    bands: Vec<&'static str>,
    expression: String,
    statistic: Statistic,
    scale_m: u32,
    max_pixels: f64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    geometry: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    latest: Option<usize>,
}

impl<'a> ReduceBody<'a> {
    fn new(polygon: &Polygon, request: &'a ReductionRequest, latest: Option<usize>) -> Self {
        Self {
            collection: request.collection,
            filters: &request.filters,
            bands: request.expression.bands(),
            expression: request.expression.to_string(),
            statistic: request.statistic,
            scale_m: request.scale_m,
            max_pixels: MAX_PIXELS,
            start: request.window.start,
            end: request.window.end,
            geometry: polygon.to_geojson(),
            latest,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReduceResponse {
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SeriesResponse {
    points: Vec<SeriesPoint>,
}

/// HTTP client for the raster query service.
#[derive(Debug, Clone)]
pub struct RasterClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    timeout_secs: u64,
}

impl RasterClient {
    pub fn new(base_url: &str, token: Option<String>, timeout_secs: u64) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| SourceError::Request(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            timeout_secs,
        })
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &ReduceBody<'_>,
    ) -> Result<T, SourceError> {
        let url = format!("{}{}", self.base_url, path);

        let mut headers = HeaderMap::new();
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| SourceError::Request(format!("invalid API token: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SourceError::Timeout(self.timeout_secs)
                } else {
                    SourceError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl RegionReducer for RasterClient {
    async fn reduce(
        &self,
        polygon: &Polygon,
        request: &ReductionRequest,
    ) -> Result<Option<f64>, SourceError> {
        let body = ReduceBody::new(polygon, request, None);
        let response: ReduceResponse = self.post("/v1/reduce", &body).await?;
        tracing::debug!(
            collection = request.collection,
            expression = %request.expression,
            value = ?response.value,
            "Raster reduction"
        );
        Ok(response.value)
    }

    async fn reduce_series(
        &self,
        polygon: &Polygon,
        request: &ReductionRequest,
        latest: Option<usize>,
    ) -> Result<Vec<SeriesPoint>, SourceError> {
        let body = ReduceBody::new(polygon, request, latest);
        let response: SeriesResponse = self.post("/v1/series", &body).await?;

        // The source does not promise an order; callers rely on oldest-first.
        let mut points = response.points;
        points.sort_by_key(|p| p.time);
        if let Some(n) = latest {
            let skip = points.len().saturating_sub(n);
            points.drain(..skip);
        }
        Ok(points)
    }
}
