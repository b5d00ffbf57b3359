//! Farm analysis orchestration.
//!
//! One run per farm: all collectors concurrently, merge into a fully-shaped
//! `MetricsRecord`, evaluate prescriptions, then notify and persist. A failed
//! collector contributes its zero defaults and the run carries on; each
//! stage's failure is recorded in the report and a run never returns an error.
//!
//! Batch runs fan out over spawned tasks bounded by a semaphore, so a farm
//! that panics or cannot be read back from the registry is counted as failed
//! and the rest carry on.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::{AnalysisEntry, Farm};
use crate::services::collectors::{run_collector, CollectorOutcome, CollectorStatus, SignalCollector};
use crate::services::metrics::MetricsRecord;
use crate::services::notifier::NotificationSink;
use crate::services::prescription::{Prescription, PrescriptionEngine};
use crate::services::raster::RegionReducer;
use crate::services::registry::{FarmRegistry, ListedFarm};
use crate::services::report;

/// Overall outcome of one farm's run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every stage was attempted; see the per-stage statuses.
    Completed,
    /// The farm record was unreadable or the run itself crashed.
    Failed,
}

/// Outcome of a side-effect stage (notification, persistence).
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StageStatus {
    Success,
    Failed { reason: String },
    Skipped,
}

impl StageStatus {
    fn from_result<E: std::fmt::Display>(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => StageStatus::Success,
            Err(e) => StageStatus::Failed {
                reason: e.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SourceStatus {
    pub source: String,
    pub outcome: CollectorStatus,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FarmAnalysisReport {
    pub farm_id: Uuid,
    pub farm_name: String,
    pub analyzed_at: DateTime<Utc>,
    pub status: RunStatus,
    /// Every source errored, so the metrics are all zero defaults.
    pub no_signal: bool,
    pub sources: Vec<SourceStatus>,
    pub metrics: MetricsRecord,
    pub prescriptions: Vec<Prescription>,
    pub notification: StageStatus,
    pub persistence: StageStatus,
}

impl FarmAnalysisReport {
    fn failed(farm_id: Uuid, farm_name: &str) -> Self {
        Self {
            farm_id,
            farm_name: farm_name.to_string(),
            analyzed_at: Utc::now(),
            status: RunStatus::Failed,
            no_signal: false,
            sources: Vec::new(),
            metrics: MetricsRecord::default(),
            prescriptions: Vec::new(),
            notification: StageStatus::Skipped,
            persistence: StageStatus::Skipped,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchReport {
    pub total_farms: usize,
    pub successful: usize,
    pub failed: usize,
    /// Per-farm reports, in registry order.
    pub results: Vec<FarmAnalysisReport>,
}

pub struct FarmAnalyzer {
    reducer: Arc<dyn RegionReducer>,
    collectors: Vec<Box<dyn SignalCollector>>,
    engine: PrescriptionEngine,
    notifier: Arc<dyn NotificationSink>,
    registry: Arc<dyn FarmRegistry>,
    timeout_secs: u64,
    batch_concurrency: usize,
}

impl FarmAnalyzer {
    pub fn new(
        reducer: Arc<dyn RegionReducer>,
        collectors: Vec<Box<dyn SignalCollector>>,
        notifier: Arc<dyn NotificationSink>,
        registry: Arc<dyn FarmRegistry>,
        timeout_secs: u64,
        batch_concurrency: usize,
    ) -> Self {
        Self {
            reducer,
            collectors,
            engine: PrescriptionEngine::new(),
            notifier,
            registry,
            timeout_secs,
            batch_concurrency: batch_concurrency.max(1),
        }
    }

    pub fn registry(&self) -> &Arc<dyn FarmRegistry> {
        &self.registry
    }

    /// Analyse one farm end to end. Never fails; see the report for stage outcomes.
    pub async fn run(&self, farm: &Farm) -> FarmAnalysisReport {
        let now = Utc::now();
        tracing::info!("Analysing farm '{}' ({})", farm.name, farm.id);

        let outcomes = join_all(self.collectors.iter().map(|c| {
            run_collector(
                c.as_ref(),
                self.reducer.as_ref(),
                &farm.polygon,
                now,
                self.timeout_secs,
            )
        }))
        .await;

        let sources: Vec<SourceStatus> = self
            .collectors
            .iter()
            .zip(&outcomes)
            .map(|(c, o)| SourceStatus {
                source: c.source().to_string(),
                outcome: o.status(),
            })
            .collect();

        let no_signal = !outcomes.iter().any(CollectorOutcome::is_success);
        if no_signal {
            tracing::error!(
                "Farm '{}' ({}): every source failed, reporting zero defaults",
                farm.name,
                farm.id
            );
        }

        let mut metrics = MetricsRecord::default();
        for outcome in outcomes {
            if let CollectorOutcome::Success(patch) = outcome {
                metrics.apply(patch);
            }
        }

        let prescriptions = self.engine.generate(&metrics);

        let rendered = report::render(&farm.name, now, &metrics, &prescriptions);
        let notification = StageStatus::from_result(
            self.notifier
                .send(&farm.contact_address, &rendered.subject, &rendered.html_body)
                .await,
        );
        if let StageStatus::Failed { reason } = &notification {
            tracing::warn!("Farm '{}' ({}): report not delivered: {}", farm.name, farm.id, reason);
        }

        let entry = AnalysisEntry {
            analyzed_at: now,
            metrics,
            prescriptions,
            notification_sent: notification == StageStatus::Success,
        };
        let persistence =
            StageStatus::from_result(self.registry.append_history(farm.id, &entry).await);
        if let StageStatus::Failed { reason } = &persistence {
            tracing::error!("Farm '{}' ({}): history not saved: {}", farm.name, farm.id, reason);
        }

        FarmAnalysisReport {
            farm_id: farm.id,
            farm_name: farm.name.clone(),
            analyzed_at: now,
            status: RunStatus::Completed,
            no_signal,
            sources,
            metrics: entry.metrics,
            prescriptions: entry.prescriptions,
            notification,
            persistence,
        }
    }

    /// Analyse every listed farm, at most `batch_concurrency` at a time.
    /// Unreadable records are reported as failed without being analysed.
    pub async fn run_batch(self: &Arc<Self>, farms: Vec<ListedFarm>) -> BatchReport {
        let semaphore = Arc::new(Semaphore::new(self.batch_concurrency));

        let pending: Vec<_> = farms
            .iter()
            .map(|listed| {
                listed.as_ref().map(|farm| {
                    let analyzer = Arc::clone(self);
                    let semaphore = Arc::clone(&semaphore);
                    let owned = farm.clone();
                    let handle = tokio::spawn(async move {
                        let _permit = semaphore.acquire_owned().await.ok();
                        analyzer.run(&owned).await
                    });
                    (farm, handle)
                })
            })
            .collect();

        let mut results = Vec::with_capacity(pending.len());
        for item in pending {
            let report = match item {
                Ok((farm, handle)) => match handle.await {
                    Ok(report) => report,
                    Err(e) => {
                        tracing::error!(
                            "Farm '{}' ({}): analysis task crashed: {}",
                            farm.name,
                            farm.id,
                            e
                        );
                        FarmAnalysisReport::failed(farm.id, &farm.name)
                    }
                },
                Err(unreadable) => {
                    tracing::error!(
                        "Farm '{}' ({}): not analysed: {}",
                        unreadable.farm_name,
                        unreadable.farm_id,
                        unreadable.reason
                    );
                    FarmAnalysisReport::failed(unreadable.farm_id, &unreadable.farm_name)
                }
            };
            results.push(report);
        }

        let successful = results
            .iter()
            .filter(|r| r.status == RunStatus::Completed)
            .count();

        BatchReport {
            total_farms: results.len(),
            successful,
            failed: results.len() - successful,
            results,
        }
    }
}
