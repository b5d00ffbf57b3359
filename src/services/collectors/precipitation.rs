//! Daily precipitation totals (CHIRPS).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{SignalCollector, LOOKBACK_DAYS};
use crate::helpers::or_zero;
use crate::services::band_math::BandExpr;
use crate::services::geometry::Polygon;
use crate::services::metrics::MetricsPatch;
use crate::services::raster::{
    ReductionRequest, RegionReducer, SourceError, Statistic, TimeWindow,
};

pub(crate) const COLLECTION: &str = "UCSB-CHG/CHIRPS/DAILY";
const BAND: &str = "precipitation";
/// CHIRPS native resolution is ~5.5 km.
const SCALE_M: u32 = 5000;
const SHORT_WINDOW_DAYS: i64 = 7;

/// Sums daily precipitation over the last 7 and 30 days.
pub struct PrecipitationCollector;

impl PrecipitationCollector {
    fn request(window: TimeWindow) -> ReductionRequest {
        ReductionRequest {
            collection: COLLECTION,
            filters: Vec::new(),
            expression: BandExpr::band(BAND),
            statistic: Statistic::Sum,
            scale_m: SCALE_M,
            window,
        }
    }
}

#[async_trait]
impl SignalCollector for PrecipitationCollector {
    fn source(&self) -> &'static str {
        "precipitation"
    }

    async fn collect(
        &self,
        reducer: &dyn RegionReducer,
        polygon: &Polygon,
        now: DateTime<Utc>,
    ) -> Result<MetricsPatch, SourceError> {
        let short = Self::request(TimeWindow::trailing_days(now, SHORT_WINDOW_DAYS));
        let long = Self::request(TimeWindow::trailing_days(now, LOOKBACK_DAYS));

        let (sum_7d, sum_30d) = futures::try_join!(
            reducer.reduce(polygon, &short),
            reducer.reduce(polygon, &long)
        )?;

        Ok(MetricsPatch {
            precipitation_7d: Some(or_zero(sum_7d)),
            precipitation_30d: Some(or_zero(sum_30d)),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::geometry::square;
    use crate::services::test_support::StubReducer;
    use chrono::Duration;

    #[tokio::test]
    async fn test_collects_both_windows() {
        let now = "2026-03-31T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        let reducer = StubReducer::new().with_value(COLLECTION, BAND, Some(42.0));

        let patch = PrecipitationCollector
            .collect(&reducer, &square(0.0, 0.0), now)
            .await
            .unwrap();
        assert_eq!(patch.precipitation_7d, Some(42.0));
        assert_eq!(patch.precipitation_30d, Some(42.0));
        assert_eq!(patch.ndvi_mean, None);

        let calls = reducer.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        let mut starts: Vec<DateTime<Utc>> = calls.iter().map(|c| c.window.start).collect();
        starts.sort();
        assert_eq!(starts, vec![now - Duration::days(30), now - Duration::days(7)]);
        assert!(calls.iter().all(|c| c.window.end == now));
        assert!(calls
            .iter()
            .all(|c| c.statistic == Statistic::Sum && c.scale_m == 5000));
    }

    #[tokio::test]
    async fn test_no_observations_become_zero() {
        let reducer = StubReducer::new().with_value(COLLECTION, BAND, None);
        let patch = PrecipitationCollector
            .collect(&reducer, &square(0.0, 0.0), Utc::now())
            .await
            .unwrap();
        assert_eq!(patch.precipitation_7d, Some(0.0));
        assert_eq!(patch.precipitation_30d, Some(0.0));
    }

    #[tokio::test]
    async fn test_source_failure_propagates() {
        let reducer = StubReducer::new().fail_collection(COLLECTION);
        let result = PrecipitationCollector
            .collect(&reducer, &square(0.0, 0.0), Utc::now())
            .await;
        assert!(result.is_err());
    }
}
