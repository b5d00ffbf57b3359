//! In-memory stand-ins for the external collaborators, shared by unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::db::models::{AnalysisEntry, Farm, FarmStatus, HistoryEntry, NewFarm};
use crate::services::geometry::Polygon;
use crate::services::notifier::{NotificationSink, NotifyError};
use crate::services::raster::{ReductionRequest, RegionReducer, SeriesPoint, SourceError};
use crate::services::registry::{FarmRegistry, ListedFarm, RegistryError, UnreadableFarm};

type Key = (String, String);

fn key(collection: &str, expression: &str) -> Key {
    (collection.to_string(), expression.to_string())
}

/// Canned raster answers keyed by `(collection, rendered expression)`.
/// Unknown keys answer `null` / an empty series.
#[derive(Default)]
pub(crate) struct StubReducer {
    values: HashMap<Key, Option<f64>>,
    series: HashMap<Key, Vec<SeriesPoint>>,
    fail_all: Option<String>,
    failing_collections: Vec<String>,
    failing_polygons: Vec<Polygon>,
    pub(crate) calls: Mutex<Vec<ReductionRequest>>,
}

impl StubReducer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing(reason: &str) -> Self {
        Self {
            fail_all: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub(crate) fn with_value(mut self, collection: &str, expression: &str, v: Option<f64>) -> Self {
        self.values.insert(key(collection, expression), v);
        self
    }

    /// `points` are `(RFC3339 time, value)` in any order.
    pub(crate) fn with_series(
        mut self,
        collection: &str,
        expression: &str,
        points: &[(&str, Option<f64>)],
    ) -> Self {
        let points = points
            .iter()
            .map(|(t, v)| SeriesPoint {
                time: t.parse::<DateTime<Utc>>().unwrap(),
                value: *v,
            })
            .collect();
        self.series.insert(key(collection, expression), points);
        self
    }

    pub(crate) fn fail_collection(mut self, collection: &str) -> Self {
        self.failing_collections.push(collection.to_string());
        self
    }

    pub(crate) fn fail_polygon(mut self, polygon: Polygon) -> Self {
        self.failing_polygons.push(polygon);
        self
    }

    fn check(&self, polygon: &Polygon, request: &ReductionRequest) -> Result<(), SourceError> {
        self.calls.lock().unwrap().push(request.clone());
        if let Some(reason) = &self.fail_all {
            return Err(SourceError::Request(reason.clone()));
        }
        if self
            .failing_collections
            .iter()
            .any(|c| c == request.collection)
        {
            return Err(SourceError::Status {
                status: 503,
                body: format!("{} unavailable", request.collection),
            });
        }
        if self.failing_polygons.contains(polygon) {
            return Err(SourceError::Status {
                status: 400,
                body: "degenerate geometry".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RegionReducer for StubReducer {
    async fn reduce(
        &self,
        polygon: &Polygon,
        request: &ReductionRequest,
    ) -> Result<Option<f64>, SourceError> {
        self.check(polygon, request)?;
        let k = key(request.collection, &request.expression.to_string());
        Ok(self.values.get(&k).copied().flatten())
    }

    async fn reduce_series(
        &self,
        polygon: &Polygon,
        request: &ReductionRequest,
        latest: Option<usize>,
    ) -> Result<Vec<SeriesPoint>, SourceError> {
        self.check(polygon, request)?;
        let k = key(request.collection, &request.expression.to_string());
        let mut points = self.series.get(&k).cloned().unwrap_or_default();
        points.sort_by_key(|p| p.time);
        if let Some(n) = latest {
            let skip = points.len().saturating_sub(n);
            points.drain(..skip);
        }
        Ok(points)
    }
}

/// Records every message; optionally fails every send.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub(crate) fail: bool,
    pub(crate) sent: Mutex<Vec<(String, String, String)>>,
}

impl RecordingNotifier {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn send(&self, recipient: &str, subject: &str, html_body: &str) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Transport("relay unreachable".to_string()));
        }
        self.sent.lock().unwrap().push((
            recipient.to_string(),
            subject.to_string(),
            html_body.to_string(),
        ));
        Ok(())
    }
}

/// Farm store held in memory. `unreadable` records are listed after the
/// active farms.
#[derive(Default)]
pub(crate) struct MemoryRegistry {
    pub(crate) farms: Mutex<Vec<Farm>>,
    pub(crate) unreadable: Mutex<Vec<UnreadableFarm>>,
    pub(crate) history: Mutex<Vec<(Uuid, AnalysisEntry)>>,
    pub(crate) fail_writes: bool,
}

impl MemoryRegistry {
    pub(crate) fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub(crate) fn history_for(&self, farm_id: Uuid) -> Vec<AnalysisEntry> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == farm_id)
            .map(|(_, e)| e.clone())
            .collect()
    }
}

#[async_trait]
impl FarmRegistry for MemoryRegistry {
    async fn register(&self, new_farm: NewFarm) -> Result<Farm, RegistryError> {
        if self.fail_writes {
            return Err(RegistryError::Database(sqlx::Error::PoolTimedOut));
        }
        let farm = Farm {
            id: Uuid::new_v4(),
            contact_address: new_farm.contact_address,
            name: new_farm.name,
            polygon: new_farm.polygon,
            activated_at: Utc::now(),
            status: FarmStatus::Active,
            last_analysis_at: None,
            analysis_count: 0,
        };
        self.farms.lock().unwrap().push(farm.clone());
        Ok(farm)
    }

    async fn get(&self, farm_id: Uuid) -> Result<Farm, RegistryError> {
        self.farms
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.id == farm_id)
            .cloned()
            .ok_or(RegistryError::NotFound(farm_id))
    }

    async fn list_active(&self) -> Result<Vec<ListedFarm>, RegistryError> {
        let mut listed: Vec<ListedFarm> = self
            .farms
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.status == FarmStatus::Active)
            .cloned()
            .map(Ok)
            .collect();
        listed.extend(self.unreadable.lock().unwrap().iter().cloned().map(Err));
        Ok(listed)
    }

    async fn append_history(&self, farm_id: Uuid, entry: &AnalysisEntry) -> Result<(), RegistryError> {
        if self.fail_writes {
            return Err(RegistryError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut farms = self.farms.lock().unwrap();
        let farm = farms
            .iter_mut()
            .find(|f| f.id == farm_id)
            .ok_or(RegistryError::NotFound(farm_id))?;
        farm.analysis_count += 1;
        farm.last_analysis_at = Some(entry.analyzed_at);
        self.history.lock().unwrap().push((farm_id, entry.clone()));
        Ok(())
    }

    async fn update_status(&self, farm_id: Uuid, status: FarmStatus) -> Result<(), RegistryError> {
        let mut farms = self.farms.lock().unwrap();
        let farm = farms
            .iter_mut()
            .find(|f| f.id == farm_id)
            .ok_or(RegistryError::NotFound(farm_id))?;
        farm.status = status;
        Ok(())
    }

    async fn history(&self, farm_id: Uuid, limit: i64) -> Result<Vec<HistoryEntry>, RegistryError> {
        let mut entries: Vec<HistoryEntry> = self
            .history_for(farm_id)
            .into_iter()
            .map(|entry| HistoryEntry {
                id: Uuid::new_v4(),
                farm_id,
                entry,
            })
            .collect();
        entries.reverse();
        entries.truncate(limit.max(0) as usize);
        Ok(entries)
    }
}

/// A farm record for tests that skip registration.
pub(crate) fn farm(name: &str, polygon: Polygon) -> Farm {
    Farm {
        id: Uuid::new_v4(),
        contact_address: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        name: name.to_string(),
        polygon,
        activated_at: Utc::now(),
        status: FarmStatus::Active,
        last_analysis_at: None,
        analysis_count: 0,
    }
}
