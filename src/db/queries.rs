use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{AnalysisEntry, FarmRow, FarmStatus, HistoryRow, NewFarm};

const FARM_COLUMNS: &str = "id, contact_address, name, polygon, activated_at, status,
                            last_analysis_at, analysis_count";

/// Insert a new active farm.
pub async fn insert_farm(pool: &PgPool, new_farm: &NewFarm) -> Result<FarmRow, sqlx::Error> {
    let polygon = serde_json::to_value(&new_farm.polygon)
        .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

    sqlx::query_as::<_, FarmRow>(&format!(
        "INSERT INTO farms (id, contact_address, name, polygon, activated_at, status, analysis_count)
         VALUES ($1, $2, $3, $4, NOW(), $5, 0)
         RETURNING {FARM_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&new_farm.contact_address)
    .bind(&new_farm.name)
    .bind(polygon)
    .bind(FarmStatus::Active.as_str())
    .fetch_one(pool)
    .await
}

/// Get a single farm by ID.
pub async fn get_farm(pool: &PgPool, id: Uuid) -> Result<Option<FarmRow>, sqlx::Error> {
    sqlx::query_as::<_, FarmRow>(&format!("SELECT {FARM_COLUMNS} FROM farms WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// List all active farms, oldest registration first.
pub async fn list_active_farms(pool: &PgPool) -> Result<Vec<FarmRow>, sqlx::Error> {
    sqlx::query_as::<_, FarmRow>(&format!(
        "SELECT {FARM_COLUMNS} FROM farms WHERE status = $1 ORDER BY activated_at, id"
    ))
    .bind(FarmStatus::Active.as_str())
    .fetch_all(pool)
    .await
}

/// Set a farm's lifecycle status. Returns the number of rows touched.
pub async fn update_farm_status(
    pool: &PgPool,
    id: Uuid,
    status: FarmStatus,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE farms SET status = $2 WHERE id = $1")
        .bind(id)
        .bind(status.as_str())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Append a history entry and bump the farm's counter in one transaction.
///
/// Returns `false` (and writes nothing) when the farm does not exist.
pub async fn append_history(
    pool: &PgPool,
    farm_id: Uuid,
    entry: &AnalysisEntry,
) -> Result<bool, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        "UPDATE farms
         SET analysis_count = analysis_count + 1, last_analysis_at = $2
         WHERE id = $1",
    )
    .bind(farm_id)
    .bind(entry.analyzed_at)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if updated == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query(
        "INSERT INTO analysis_history
            (id, farm_id, analyzed_at, metrics, prescriptions, notification_sent, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, NOW())",
    )
    .bind(Uuid::new_v4())
    .bind(farm_id)
    .bind(entry.analyzed_at)
    .bind(Json(&entry.metrics))
    .bind(Json(&entry.prescriptions))
    .bind(entry.notification_sent)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

/// Most recent history entries for a farm, newest first.
pub async fn get_history(
    pool: &PgPool,
    farm_id: Uuid,
    limit: i64,
) -> Result<Vec<HistoryRow>, sqlx::Error> {
    sqlx::query_as::<_, HistoryRow>(
        "SELECT id, farm_id, analyzed_at, metrics, prescriptions, notification_sent, created_at
         FROM analysis_history
         WHERE farm_id = $1
         ORDER BY analyzed_at DESC, created_at DESC
         LIMIT $2",
    )
    .bind(farm_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

