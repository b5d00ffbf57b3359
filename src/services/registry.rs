//! Farm registry: the persistent store behind registration, batch listing
//! and analysis history.

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::db::models::{AnalysisEntry, Farm, FarmRow, FarmStatus, HistoryEntry, NewFarm};
use crate::db::queries;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("farm {0} not found")]
    NotFound(Uuid),

    #[error("stored record is invalid: {0}")]
    Corrupt(String),
}

/// An active farm whose stored record could not be decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct UnreadableFarm {
    pub farm_id: Uuid,
    pub farm_name: String,
    pub reason: String,
}

/// One entry of the active-farm listing, in registry order.
pub type ListedFarm = Result<Farm, UnreadableFarm>;

#[async_trait]
pub trait FarmRegistry: Send + Sync {
    /// Store a new active farm and return it with its generated id.
    async fn register(&self, new_farm: NewFarm) -> Result<Farm, RegistryError>;

    async fn get(&self, farm_id: Uuid) -> Result<Farm, RegistryError>;

    /// Active farms, with undecodable records kept in place so callers can
    /// count them.
    async fn list_active(&self) -> Result<Vec<ListedFarm>, RegistryError>;

    /// Append one immutable history entry, bumping the farm's analysis
    /// counter and last-analysis timestamp.
    async fn append_history(&self, farm_id: Uuid, entry: &AnalysisEntry)
        -> Result<(), RegistryError>;

    async fn update_status(&self, farm_id: Uuid, status: FarmStatus) -> Result<(), RegistryError>;

    /// Up to `limit` entries, newest first.
    async fn history(&self, farm_id: Uuid, limit: i64) -> Result<Vec<HistoryEntry>, RegistryError>;
}

/// PostgreSQL-backed registry.
#[derive(Clone)]
pub struct PgFarmRegistry {
    pool: PgPool,
}

impl PgFarmRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FarmRegistry for PgFarmRegistry {
    async fn register(&self, new_farm: NewFarm) -> Result<Farm, RegistryError> {
        let row = queries::insert_farm(&self.pool, &new_farm).await?;
        Farm::try_from(row).map_err(RegistryError::Corrupt)
    }

    async fn get(&self, farm_id: Uuid) -> Result<Farm, RegistryError> {
        let row = queries::get_farm(&self.pool, farm_id)
            .await?
            .ok_or(RegistryError::NotFound(farm_id))?;
        Farm::try_from(row).map_err(RegistryError::Corrupt)
    }

    async fn list_active(&self) -> Result<Vec<ListedFarm>, RegistryError> {
        let rows = queries::list_active_farms(&self.pool).await?;
        Ok(rows.into_iter().map(decode_listed).collect())
    }

    async fn append_history(
        &self,
        farm_id: Uuid,
        entry: &AnalysisEntry,
    ) -> Result<(), RegistryError> {
        if queries::append_history(&self.pool, farm_id, entry).await? {
            Ok(())
        } else {
            Err(RegistryError::NotFound(farm_id))
        }
    }

    async fn update_status(&self, farm_id: Uuid, status: FarmStatus) -> Result<(), RegistryError> {
        match queries::update_farm_status(&self.pool, farm_id, status).await? {
            0 => Err(RegistryError::NotFound(farm_id)),
            _ => Ok(()),
        }
    }

    async fn history(&self, farm_id: Uuid, limit: i64) -> Result<Vec<HistoryEntry>, RegistryError> {
        let rows = queries::get_history(&self.pool, farm_id, limit).await?;
        Ok(rows.into_iter().map(HistoryEntry::from).collect())
    }
}

fn decode_listed(row: FarmRow) -> ListedFarm {
    let (farm_id, farm_name) = (row.id, row.name.clone());
    Farm::try_from(row).map_err(|reason| {
        tracing::warn!("Farm {} has invalid stored data: {}", farm_id, reason);
        UnreadableFarm {
            farm_id,
            farm_name,
            reason,
        }
    })
}
