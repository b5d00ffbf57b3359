use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::services::geometry::Polygon;
use crate::services::metrics::MetricsRecord;
use crate::services::prescription::Prescription;

/// Farm lifecycle status. Farms are never deleted, only deactivated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FarmStatus {
    Active,
    Inactive,
}

impl FarmStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FarmStatus::Active => "active",
            FarmStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for FarmStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FarmStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(FarmStatus::Active),
            "inactive" => Ok(FarmStatus::Inactive),
            other => Err(format!("unknown farm status '{}'", other)),
        }
    }
}

/// A registered farm.
#[derive(Debug, Clone, PartialEq)]
pub struct Farm {
    pub id: Uuid,
    pub contact_address: String,
    pub name: String,
    pub polygon: Polygon,
    pub activated_at: DateTime<Utc>,
    pub status: FarmStatus,
    pub last_analysis_at: Option<DateTime<Utc>>,
    pub analysis_count: i32,
}

/// Validated registration input.
#[derive(Debug, Clone)]
pub struct NewFarm {
    pub contact_address: String,
    pub name: String,
    pub polygon: Polygon,
}

/// One analysis run as appended to a farm's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnalysisEntry {
    pub analyzed_at: DateTime<Utc>,
    pub metrics: MetricsRecord,
    pub prescriptions: Vec<Prescription>,
    pub notification_sent: bool,
}

/// A stored history entry.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub farm_id: Uuid,
    pub entry: AnalysisEntry,
}

/// Raw `farms` row. The polygon column holds `[[lon, lat], ...]`.
#[derive(Debug, FromRow)]
pub struct FarmRow {
    pub id: Uuid,
    pub contact_address: String,
    pub name: String,
    pub polygon: serde_json::Value,
    pub activated_at: DateTime<Utc>,
    pub status: String,
    pub last_analysis_at: Option<DateTime<Utc>>,
    pub analysis_count: i32,
}

impl TryFrom<FarmRow> for Farm {
    type Error = String;

    fn try_from(row: FarmRow) -> Result<Self, Self::Error> {
        let polygon: Polygon = serde_json::from_value(row.polygon)
            .map_err(|e| format!("farm {} has an unreadable polygon: {}", row.id, e))?;
        let status = row.status.parse::<FarmStatus>()?;

        Ok(Farm {
            id: row.id,
            contact_address: row.contact_address,
            name: row.name,
            polygon,
            activated_at: row.activated_at,
            status,
            last_analysis_at: row.last_analysis_at,
            analysis_count: row.analysis_count,
        })
    }
}

/// Raw `analysis_history` row.
#[derive(Debug, FromRow)]
#[allow(dead_code)] // created_at is selected for ordering and auditing only
pub struct HistoryRow {
    pub id: Uuid,
    pub farm_id: Uuid,
    pub analyzed_at: DateTime<Utc>,
    pub metrics: Json<MetricsRecord>,
    pub prescriptions: Json<Vec<Prescription>>,
    pub notification_sent: bool,
    pub created_at: DateTime<Utc>,
}

impl From<HistoryRow> for HistoryEntry {
    fn from(row: HistoryRow) -> Self {
        HistoryEntry {
            id: row.id,
            farm_id: row.farm_id,
            entry: AnalysisEntry {
                analyzed_at: row.analyzed_at,
                metrics: row.metrics.0,
                prescriptions: row.prescriptions.0,
                notification_sent: row.notification_sent,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::geometry::square;
    use serde_json::json;

    fn row(polygon: serde_json::Value, status: &str) -> FarmRow {
        FarmRow {
            id: Uuid::new_v4(),
            contact_address: "ana@example.com".to_string(),
            name: "Fazenda Boa Vista".to_string(),
            polygon,
            activated_at: Utc::now(),
            status: status.to_string(),
            last_analysis_at: None,
            analysis_count: 4,
        }
    }

    #[test]
    fn test_status_parse_and_display() {
        assert_eq!("active".parse::<FarmStatus>(), Ok(FarmStatus::Active));
        assert_eq!("inactive".parse::<FarmStatus>(), Ok(FarmStatus::Inactive));
        assert!("archived".parse::<FarmStatus>().is_err());
        assert_eq!(FarmStatus::Inactive.to_string(), "inactive");
    }

    #[test]
    fn test_polygon_survives_storage_round_trip() {
        let polygon = Polygon::new(vec![
            crate::services::geometry::Coordinate(-47.91, -15.78),
            crate::services::geometry::Coordinate(-47.90, -15.78),
            crate::services::geometry::Coordinate(-47.90, -15.77),
            crate::services::geometry::Coordinate(-47.915, -15.765),
        ])
        .unwrap();

        let stored = serde_json::to_value(&polygon).unwrap();
        let farm = Farm::try_from(row(stored, "active")).unwrap();
        assert_eq!(farm.polygon, polygon);
        assert_eq!(farm.polygon.vertices(), polygon.vertices());
        assert_eq!(farm.analysis_count, 4);
    }

    #[test]
    fn test_corrupt_rows_are_rejected() {
        let good = serde_json::to_value(square(1.0, 1.0)).unwrap();
        assert!(Farm::try_from(row(good, "deleted")).is_err());
        assert!(Farm::try_from(row(json!([[0.0, 0.0], [1.0, 1.0]]), "active")).is_err());
        assert!(Farm::try_from(row(json!({"type": "Polygon"}), "active")).is_err());
    }

    #[test]
    fn test_history_row_conversion() {
        let farm_id = Uuid::new_v4();
        let row = HistoryRow {
            id: Uuid::new_v4(),
            farm_id,
            analyzed_at: Utc::now(),
            metrics: Json(MetricsRecord::default()),
            prescriptions: Json(vec![]),
            notification_sent: true,
            created_at: Utc::now(),
        };
        let entry = HistoryEntry::from(row);
        assert_eq!(entry.farm_id, farm_id);
        assert!(entry.entry.notification_sent);
    }
}
