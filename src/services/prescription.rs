//! Prescription engine.
//!
//! A fixed, ordered set of independent rules over a `MetricsRecord`. Every
//! rule is evaluated (no short-circuit), so alerts can co-occur. When nothing
//! fires the result is a single informational entry; it is never empty.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::services::metrics::MetricsRecord;

/// NBR below this suggests burnt or burning vegetation.
const FIRE_NBR_THRESHOLD: f64 = 0.1;
/// Consecutive NDVI readings that must strictly decrease.
const DECLINE_WINDOW: usize = 3;
/// 7-day precipitation above which declining vigor is not blamed on water.
const WET_SOIL_PRECIP_MM: f64 = 20.0;
/// VV backscatter below this (dB) on every recent pass indicates dry soil.
const DRY_SOIL_VV_DB: f64 = -14.0;
/// Minimum recent VV readings the irrigation rule needs.
const MIN_VV_READINGS: usize = 3;
/// 7-day precipitation below which irrigation is suggested.
const IRRIGATION_PRECIP_MM: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionCategory {
    FireRisk,
    NutritionalStress,
    WaterStress,
    IrrigationNeed,
    Normal,
}

/// How loudly a prescription is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Action,
    Alert,
    Urgent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Prescription {
    pub category: PrescriptionCategory,
    pub severity: Severity,
    /// Rendered human-readable message
    pub message: String,
}

impl Prescription {
    fn new(category: PrescriptionCategory, severity: Severity, message: &str) -> Self {
        Self {
            category,
            severity,
            message: message.to_string(),
        }
    }

    fn normal() -> Self {
        Self::new(
            PrescriptionCategory::Normal,
            Severity::Info,
            "Normal monitoring - no urgent action required.",
        )
    }
}

pub trait Rule: Send + Sync {
    fn id(&self) -> &'static str;
    fn evaluate(&self, record: &MetricsRecord) -> Option<Prescription>;
}

pub struct FireRiskRule;

impl Rule for FireRiskRule {
    fn id(&self) -> &'static str {
        "fire_risk"
    }

    fn evaluate(&self, record: &MetricsRecord) -> Option<Prescription> {
        (record.nbr_mean < FIRE_NBR_THRESHOLD).then(|| {
            Prescription::new(
                PrescriptionCategory::FireRisk,
                Severity::Urgent,
                "URGENT: Fire/burn inspection required in the area.",
            )
        })
    }
}

/// Falling NDVI, attributed to nutrition or to water depending on rainfall.
pub struct VigorDeclineRule;

impl Rule for VigorDeclineRule {
    fn id(&self) -> &'static str {
        "vigor_decline"
    }

    fn evaluate(&self, record: &MetricsRecord) -> Option<Prescription> {
        if !is_declining(&record.ndvi_series, DECLINE_WINDOW) {
            return None;
        }

        if record.precipitation_7d > WET_SOIL_PRECIP_MM {
            Some(Prescription::new(
                PrescriptionCategory::NutritionalStress,
                Severity::Alert,
                "NUTRITIONAL ALERT: Continuous vigor decline with moist soil. Collect soil samples.",
            ))
        } else {
            Some(Prescription::new(
                PrescriptionCategory::WaterStress,
                Severity::Alert,
                "STRESS ALERT: Vigor decline associated with lack of rainfall.",
            ))
        }
    }
}

pub struct IrrigationNeedRule;

impl Rule for IrrigationNeedRule {
    fn id(&self) -> &'static str {
        "irrigation_need"
    }

    fn evaluate(&self, record: &MetricsRecord) -> Option<Prescription> {
        let vv = &record.recent_vv_values;
        if vv.len() < MIN_VV_READINGS {
            return None;
        }

        let persistently_dry = vv.iter().all(|v| *v < DRY_SOIL_VV_DB);
        (persistently_dry && record.precipitation_7d < IRRIGATION_PRECIP_MM).then(|| {
            Prescription::new(
                PrescriptionCategory::IrrigationNeed,
                Severity::Action,
                "AUTOMATED ACTION: Persistently dry soil. Consider switching on the irrigation system.",
            )
        })
    }
}

/// True when the last `window` values exist and each is strictly below the one before.
fn is_declining(series: &[f64], window: usize) -> bool {
    if window < 2 || series.len() < window {
        return false;
    }
    series[series.len() - window..]
        .windows(2)
        .all(|pair| pair[0] > pair[1])
}

pub struct PrescriptionEngine {
    rules: Vec<Box<dyn Rule>>,
}

impl PrescriptionEngine {
    pub fn new() -> Self {
        let rules: Vec<Box<dyn Rule>> = vec![
            Box::new(FireRiskRule),
            Box::new(VigorDeclineRule),
            Box::new(IrrigationNeedRule),
        ];
        Self { rules }
    }

    pub fn generate(&self, record: &MetricsRecord) -> Vec<Prescription> {
        let mut prescriptions: Vec<Prescription> = self
            .rules
            .iter()
            .filter_map(|rule| {
                let p = rule.evaluate(record);
                if p.is_some() {
                    tracing::debug!("Rule '{}' fired", rule.id());
                }
                p
            })
            .collect();

        if prescriptions.is_empty() {
            prescriptions.push(Prescription::normal());
        }
        prescriptions
    }
}

impl Default for PrescriptionEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Highest severity in a prescription list.
pub fn max_severity(prescriptions: &[Prescription]) -> Severity {
    prescriptions
        .iter()
        .map(|p| p.severity)
        .max()
        .unwrap_or(Severity::Info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use proptest::test_runner::Config;

    /// A record that triggers nothing.
    fn calm() -> MetricsRecord {
        MetricsRecord {
            precipitation_7d: 15.0,
            precipitation_30d: 80.0,
            ndvi_mean: 0.7,
            nbr_mean: 0.4,
            vv_mean: -11.0,
            vh_mean: -17.0,
            rvi_mean: 1.2,
            ndvi_series: vec![0.6, 0.65, 0.7],
            recent_vv_values: vec![-11.0, -12.0, -10.5],
        }
    }

    fn categories(record: &MetricsRecord) -> Vec<PrescriptionCategory> {
        PrescriptionEngine::new()
            .generate(record)
            .into_iter()
            .map(|p| p.category)
            .collect()
    }

    #[test]
    fn test_calm_record_yields_single_normal() {
        let out = PrescriptionEngine::new().generate(&calm());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].category, PrescriptionCategory::Normal);
        assert_eq!(out[0].severity, Severity::Info);
    }

    #[test]
    fn test_fire_risk_boundary() {
        let mut r = calm();
        r.nbr_mean = 0.1;
        assert!(!categories(&r).contains(&PrescriptionCategory::FireRisk));

        r.nbr_mean = 0.0999;
        assert_eq!(categories(&r), vec![PrescriptionCategory::FireRisk]);
    }

    #[test]
    fn test_fire_risk_independent_of_other_rules() {
        let mut r = calm();
        r.nbr_mean = -0.2;
        r.ndvi_series = vec![0.6, 0.5, 0.4];
        r.precipitation_7d = 5.0;
        r.recent_vv_values = vec![-15.0, -16.0, -14.5];

        assert_eq!(
            categories(&r),
            vec![
                PrescriptionCategory::FireRisk,
                PrescriptionCategory::WaterStress,
                PrescriptionCategory::IrrigationNeed,
            ]
        );
    }

    #[test]
    fn test_stress_needs_three_readings() {
        let mut r = calm();
        r.ndvi_series = vec![0.6, 0.4];
        assert!(!categories(&r).contains(&PrescriptionCategory::WaterStress));
        r.ndvi_series = vec![];
        assert!(!categories(&r).contains(&PrescriptionCategory::WaterStress));
    }

    #[test]
    fn test_nutritional_variant_with_wet_soil() {
        let mut r = calm();
        r.ndvi_series = vec![0.6, 0.5, 0.4];
        r.precipitation_7d = 25.0;
        assert_eq!(categories(&r), vec![PrescriptionCategory::NutritionalStress]);
    }

    #[test]
    fn test_water_stress_variant_with_dry_week() {
        let mut r = calm();
        r.ndvi_series = vec![0.6, 0.5, 0.4];
        r.precipitation_7d = 5.0;
        assert_eq!(categories(&r), vec![PrescriptionCategory::WaterStress]);
    }

    #[test]
    fn test_stress_boundary_at_twenty_mm_is_water() {
        let mut r = calm();
        r.ndvi_series = vec![0.6, 0.5, 0.4];
        r.precipitation_7d = 20.0;
        assert_eq!(categories(&r), vec![PrescriptionCategory::WaterStress]);
    }

    #[test]
    fn test_decline_uses_last_three_only() {
        let mut r = calm();
        // Earlier rise is irrelevant; last three are strictly decreasing.
        r.ndvi_series = vec![0.2, 0.3, 0.7, 0.6, 0.5];
        assert!(categories(&r).contains(&PrescriptionCategory::NutritionalStress)
            || categories(&r).contains(&PrescriptionCategory::WaterStress));

        // A plateau is not a decline.
        r.ndvi_series = vec![0.7, 0.6, 0.6];
        assert_eq!(categories(&r), vec![PrescriptionCategory::Normal]);
    }

    #[test]
    fn test_irrigation_fires() {
        let mut r = calm();
        r.recent_vv_values = vec![-15.0, -16.0, -14.5];
        r.precipitation_7d = 8.0;
        assert_eq!(categories(&r), vec![PrescriptionCategory::IrrigationNeed]);
    }

    #[test]
    fn test_irrigation_suppressed_by_any_wet_reading() {
        for i in 0..3 {
            let mut r = calm();
            r.recent_vv_values = vec![-15.0, -16.0, -14.5];
            r.recent_vv_values[i] = -10.0;
            r.precipitation_7d = 8.0;
            assert!(!categories(&r).contains(&PrescriptionCategory::IrrigationNeed));
        }
    }

    #[test]
    fn test_irrigation_suppressed_by_rain() {
        let mut r = calm();
        r.recent_vv_values = vec![-15.0, -16.0, -14.5];
        r.precipitation_7d = 10.0;
        assert!(!categories(&r).contains(&PrescriptionCategory::IrrigationNeed));
    }

    #[test]
    fn test_irrigation_tolerates_short_series() {
        let mut r = calm();
        r.recent_vv_values = vec![-15.0, -16.0];
        r.precipitation_7d = 0.0;
        assert!(!categories(&r).contains(&PrescriptionCategory::IrrigationNeed));
    }

    #[test]
    fn test_zero_filled_record_raises_fire_alert() {
        // A record with every collector zero-filled still has nbr_mean = 0 < 0.1.
        assert_eq!(
            categories(&MetricsRecord::default()),
            vec![PrescriptionCategory::FireRisk]
        );
    }

    #[test]
    fn test_max_severity() {
        let mut r = calm();
        r.ndvi_series = vec![0.6, 0.5, 0.4];
        r.nbr_mean = 0.0;
        let out = PrescriptionEngine::new().generate(&r);
        assert_eq!(max_severity(&out), Severity::Urgent);
        assert_eq!(max_severity(&[]), Severity::Info);
    }

    fn any_record() -> impl Strategy<Value = MetricsRecord> {
        (
            (0.0..200.0f64, 0.0..800.0f64, -1.0..1.0f64, -1.0..1.0f64),
            (-30.0..5.0f64, -35.0..0.0f64, 0.0..4.0f64),
            prop::collection::vec(-1.0..1.0f64, 0..12),
            prop::collection::vec(-30.0..5.0f64, 0..4),
        )
            .prop_map(
                |((p7, p30, ndvi, nbr), (vv, vh, rvi), ndvi_series, recent_vv_values)| MetricsRecord {
                    precipitation_7d: p7,
                    precipitation_30d: p30,
                    ndvi_mean: ndvi,
                    nbr_mean: nbr,
                    vv_mean: vv,
                    vh_mean: vh,
                    rvi_mean: rvi,
                    ndvi_series,
                    recent_vv_values,
                },
            )
    }

    proptest! {
        #![proptest_config(Config::with_cases(256))]

        #[test]
        fn fire_rule_silent_at_or_above_threshold(mut record in any_record(), nbr in 0.1..1.0f64) {
            record.nbr_mean = nbr;
            prop_assert!(!categories(&record).contains(&PrescriptionCategory::FireRisk));
        }

        #[test]
        fn fire_rule_fires_below_threshold(mut record in any_record(), nbr in -1.0..0.1f64) {
            record.nbr_mean = nbr;
            let out = PrescriptionEngine::new().generate(&record);
            prop_assert_eq!(out[0].category, PrescriptionCategory::FireRisk);
            prop_assert_eq!(max_severity(&out), Severity::Urgent);
        }

        #[test]
        fn stress_rule_silent_for_short_series(
            mut record in any_record(),
            series in prop::collection::vec(-1.0..1.0f64, 0..DECLINE_WINDOW),
        ) {
            record.ndvi_series = series;
            let cats = categories(&record);
            prop_assert!(!cats.contains(&PrescriptionCategory::NutritionalStress));
            prop_assert!(!cats.contains(&PrescriptionCategory::WaterStress));
        }

        #[test]
        fn engine_output_never_empty(record in any_record()) {
            let cats = categories(&record);
            prop_assert!(!cats.is_empty());
            if cats.contains(&PrescriptionCategory::Normal) {
                prop_assert_eq!(cats, vec![PrescriptionCategory::Normal]);
            }
        }
    }
}
