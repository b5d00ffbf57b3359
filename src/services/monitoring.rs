//! Batch monitoring runs and their in-memory status.
//!
//! The cadence is external: something calls the batch trigger (a cron job,
//! an operator). State lives in `Arc<RwLock<MonitoringState>>` and is lost on
//! restart; farm history in the registry is the durable record.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use crate::services::analysis::{BatchReport, FarmAnalyzer};
use crate::services::registry::RegistryError;

#[derive(Debug, Error)]
pub enum MonitoringError {
    #[error("a monitoring run is already in progress")]
    AlreadyRunning,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Status of the most recent batch, exposed via the status endpoint.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct MonitoringState {
    pub running: bool,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_completed_at: Option<DateTime<Utc>>,
    pub last_duration_ms: Option<u64>,
    pub last_total_farms: usize,
    pub last_successful: usize,
    pub last_failed: usize,
    pub total_batches: u64,
}

pub type SharedMonitoringState = Arc<RwLock<MonitoringState>>;

/// Resets `running` if the batch future is dropped mid-flight.
struct RunningGuard(SharedMonitoringState);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        // try_write succeeds unless a reader holds the lock this instant.
        let released = match self.0.try_write() {
            Ok(mut s) => {
                s.running = false;
                true
            }
            Err(_) => false,
        };
        if !released {
            let state = Arc::clone(&self.0);
            tokio::spawn(async move {
                state.write().await.running = false;
            });
        }
    }
}

/// List active farms and analyse them all. Only one batch runs at a time.
pub async fn run_monitoring(
    analyzer: &Arc<FarmAnalyzer>,
    state: &SharedMonitoringState,
) -> Result<BatchReport, MonitoringError> {
    {
        let mut s = state.write().await;
        if s.running {
            return Err(MonitoringError::AlreadyRunning);
        }
        s.running = true;
        s.last_started_at = Some(Utc::now());
    }
    let _guard = RunningGuard(Arc::clone(state));
    let started = Instant::now();

    let farms = analyzer.registry().list_active().await?;
    tracing::info!("Monitoring run started for {} active farms", farms.len());

    let batch = analyzer.run_batch(farms).await;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    {
        let mut s = state.write().await;
        s.last_completed_at = Some(Utc::now());
        s.last_duration_ms = Some(elapsed_ms);
        s.last_total_farms = batch.total_farms;
        s.last_successful = batch.successful;
        s.last_failed = batch.failed;
        s.total_batches += 1;
    }

    tracing::info!(
        "Monitoring run finished in {}ms: {} farms, {} successful, {} failed",
        elapsed_ms,
        batch.total_farms,
        batch.successful,
        batch.failed
    );
    Ok(batch)
}
