//! Multispectral reflectance (Sentinel-2 harmonized).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{SignalCollector, LOOKBACK_DAYS};
use crate::helpers::{finite_values, or_zero};
use crate::services::band_math::BandExpr;
use crate::services::geometry::Polygon;
use crate::services::metrics::MetricsPatch;
use crate::services::raster::{
    ReductionRequest, RegionReducer, SceneFilter, SourceError, Statistic, TimeWindow,
};

pub(crate) const COLLECTION: &str = "COPERNICUS/S2_HARMONIZED";
const SCALE_M: u32 = 10;
/// Scenes at or above this cloudy-pixel percentage are discarded whole.
const MAX_CLOUD_PCT: f64 = 30.0;
/// Scenes kept for the NDVI trend series.
const NDVI_SERIES_LEN: usize = 10;

pub(crate) fn ndvi() -> BandExpr {
    BandExpr::normalized_difference("B8", "B4")
}

pub(crate) fn nbr() -> BandExpr {
    BandExpr::normalized_difference("B8", "B12")
}

/// Mean NDVI and NBR plus an NDVI series for trend detection.
pub struct OpticalCollector;

impl OpticalCollector {
    fn request(expression: BandExpr, window: TimeWindow) -> ReductionRequest {
        ReductionRequest {
            collection: COLLECTION,
            filters: vec![SceneFilter::LessThan {
                property: "CLOUDY_PIXEL_PERCENTAGE",
                value: MAX_CLOUD_PCT,
            }],
            expression,
            statistic: Statistic::Mean,
            scale_m: SCALE_M,
            window,
        }
    }
}

#[async_trait]
impl SignalCollector for OpticalCollector {
    fn source(&self) -> &'static str {
        "optical"
    }

    async fn collect(
        &self,
        reducer: &dyn RegionReducer,
        polygon: &Polygon,
        now: DateTime<Utc>,
    ) -> Result<MetricsPatch, SourceError> {
        let window = TimeWindow::trailing_days(now, LOOKBACK_DAYS);
        let ndvi = Self::request(ndvi(), window);
        let nbr = Self::request(nbr(), window);

        let (ndvi_mean, nbr_mean, series) = futures::try_join!(
            reducer.reduce(polygon, &ndvi),
            reducer.reduce(polygon, &nbr),
            reducer.reduce_series(polygon, &ndvi, Some(NDVI_SERIES_LEN)),
        )?;

        Ok(MetricsPatch {
            ndvi_mean: Some(or_zero(ndvi_mean)),
            nbr_mean: Some(or_zero(nbr_mean)),
            ndvi_series: Some(finite_values(series.into_iter().map(|p| p.value))),
            ..Default::default()
        })
    }
}
