// src/pipeline/store.rs
//! Durable storage of pipeline records.

use super::{NewVideo, PipelineRecord, Stage};
use crate::error::{StoreError, StoreResult};
use crate::validation::WatermarkPosition;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

const RECORD_COLUMNS: &str = "id, source_url, description, watermark_position, \
     acquired_artifact, transformed_artifact, primary_publish_status, \
     secondary_publish_status, created_at, updated_at";

/// Pipeline record store.
///
/// Every write is its own statement, so a crash between stages always leaves
/// a readable, resumable record behind.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new record with all stage fields unset.
    async fn create(&self, video: &NewVideo) -> StoreResult<PipelineRecord>;

    /// Set one stage field. Fields are write-once.
    async fn update_field(&self, id: &str, stage: Stage, value: &str) -> StoreResult<()>;

    /// Records with at least one unset stage field, in insertion order.
    async fn list_incomplete(&self) -> StoreResult<Vec<PipelineRecord>>;

    async fn get(&self, id: &str) -> StoreResult<PipelineRecord>;
}

/// SQLx implementation of RecordStore.
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
struct PipelineRecordRow {
    id: String,
    source_url: String,
    description: String,
    watermark_position: String,
    acquired_artifact: Option<String>,
    transformed_artifact: Option<String>,
    primary_publish_status: Option<String>,
    secondary_publish_status: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PipelineRecordRow> for PipelineRecord {
    type Error = StoreError;

    fn try_from(row: PipelineRecordRow) -> Result<Self, Self::Error> {
        let watermark_position = row
            .watermark_position
            .parse::<WatermarkPosition>()
            .map_err(|e| StoreError::InvalidRow(format!("record {}: {}", row.id, e)))?;

        Ok(PipelineRecord {
            id: row.id,
            source_url: row.source_url,
            description: row.description,
            watermark_position,
            acquired_artifact: non_empty(row.acquired_artifact),
            transformed_artifact: non_empty(row.transformed_artifact),
            primary_publish_status: non_empty(row.primary_publish_status),
            secondary_publish_status: non_empty(row.secondary_publish_status),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// Empty text in a stage column means the stage has not been reached.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn unset(column: &str) -> String {
    format!("({column} IS NULL OR {column} = '')")
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn create(&self, video: &NewVideo) -> StoreResult<PipelineRecord> {
        let now = Utc::now();
        let record = PipelineRecord {
            id: Uuid::new_v4().to_string(),
            source_url: video.source_url.clone(),
            description: video.description.clone(),
            watermark_position: video.watermark_position,
            acquired_artifact: None,
            transformed_artifact: None,
            primary_publish_status: None,
            secondary_publish_status: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO pipeline_records
                (id, source_url, description, watermark_position, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.source_url)
        .bind(&record.description)
        .bind(record.watermark_position.as_str())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!("🗂️ Created pipeline record {} for {}", record.id, record.source_url);
        Ok(record)
    }

    async fn update_field(&self, id: &str, stage: Stage, value: &str) -> StoreResult<()> {
        let column = stage.column();
        if value.is_empty() {
            return Err(StoreError::EmptyValue(column));
        }

        // Column names come from `Stage::column`, never from input.
        let sql = format!(
            "UPDATE pipeline_records SET {column} = ?, updated_at = ? WHERE id = ? AND {}",
            unset(column)
        );

        let result = sqlx::query(&sql)
            .bind(value)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pipeline_records WHERE id = ?")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

            return Err(if exists == 0 {
                StoreError::NotFound(id.to_string())
            } else {
                StoreError::AlreadySet {
                    id: id.to_string(),
                    field: column,
                }
            });
        }

        tracing::debug!("💾 Record {}: {} = {}", id, column, value);
        Ok(())
    }

    async fn list_incomplete(&self) -> StoreResult<Vec<PipelineRecord>> {
        let condition = Stage::ALL
            .iter()
            .map(|stage| unset(stage.column()))
            .collect::<Vec<_>>()
            .join(" OR ");

        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM pipeline_records WHERE {condition} ORDER BY rowid"
        );

        let rows = sqlx::query_as::<_, PipelineRecordRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(PipelineRecord::try_from).collect()
    }

    async fn get(&self, id: &str) -> StoreResult<PipelineRecord> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM pipeline_records WHERE id = ?");

        sqlx::query_as::<_, PipelineRecordRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
            .and_then(PipelineRecord::try_from)
    }
}
