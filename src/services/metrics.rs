//! The consolidated per-run metrics record.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Aggregated signals for one farm and one analysis run.
///
/// Always fully shaped: a collector that failed leaves its fields at the
/// zero default instead of removing them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MetricsRecord {
    /// Precipitation summed over the last 7 days (mm)
    pub precipitation_7d: f64,
    /// Precipitation summed over the last 30 days (mm)
    pub precipitation_30d: f64,
    /// Mean NDVI over qualifying optical scenes
    pub ndvi_mean: f64,
    /// Mean NBR over qualifying optical scenes
    pub nbr_mean: f64,
    /// Mean VV backscatter
    pub vv_mean: f64,
    /// Mean VH backscatter
    pub vh_mean: f64,
    /// Mean radar vegetation index
    pub rvi_mean: f64,
    /// NDVI per qualifying scene, oldest first
    pub ndvi_series: Vec<f64>,
    /// Most recent VV readings (up to 3), oldest first
    pub recent_vv_values: Vec<f64>,
}

/// The fields one collector contributes. Unset fields keep the record's value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsPatch {
    pub precipitation_7d: Option<f64>,
    pub precipitation_30d: Option<f64>,
    pub ndvi_mean: Option<f64>,
    pub nbr_mean: Option<f64>,
    pub vv_mean: Option<f64>,
    pub vh_mean: Option<f64>,
    pub rvi_mean: Option<f64>,
    pub ndvi_series: Option<Vec<f64>>,
    pub recent_vv_values: Option<Vec<f64>>,
}

impl MetricsRecord {
    pub fn apply(&mut self, patch: MetricsPatch) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(v) = value {
                *slot = v;
            }
        }

        set(&mut self.precipitation_7d, patch.precipitation_7d);
        set(&mut self.precipitation_30d, patch.precipitation_30d);
        set(&mut self.ndvi_mean, patch.ndvi_mean);
        set(&mut self.nbr_mean, patch.nbr_mean);
        set(&mut self.vv_mean, patch.vv_mean);
        set(&mut self.vh_mean, patch.vh_mean);
        set(&mut self.rvi_mean, patch.rvi_mean);
        set(&mut self.ndvi_series, patch.ndvi_series);
        set(&mut self.recent_vv_values, patch.recent_vv_values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_zero_filled() {
        let r = MetricsRecord::default();
        assert_eq!(r.precipitation_7d, 0.0);
        assert_eq!(r.nbr_mean, 0.0);
        assert!(r.ndvi_series.is_empty());
        assert!(r.recent_vv_values.is_empty());
    }

    #[test]
    fn test_apply_only_touches_set_fields() {
        let mut r = MetricsRecord {
            ndvi_mean: 0.7,
            ..Default::default()
        };
        r.apply(MetricsPatch {
            precipitation_7d: Some(12.0),
            recent_vv_values: Some(vec![-15.0, -16.0]),
            ..Default::default()
        });

        assert_eq!(r.precipitation_7d, 12.0);
        assert_eq!(r.recent_vv_values, vec![-15.0, -16.0]);
        assert_eq!(r.ndvi_mean, 0.7);
    }

    #[test]
    fn test_serialized_record_has_every_key() {
        let value = serde_json::to_value(MetricsRecord::default()).unwrap();
        let obj = value.as_object().unwrap();
        for key in [
            "precipitation_7d",
            "precipitation_30d",
            "ndvi_mean",
            "nbr_mean",
            "vv_mean",
            "vh_mean",
            "rvi_mean",
            "ndvi_series",
            "recent_vv_values",
        ] {
            assert!(obj.contains_key(key), "missing key {}", key);
        }
    }
}
