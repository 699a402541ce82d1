//! Cost record storage

use super::record::CostRecord;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conclave_replay::store::{format_timestamp, parse_timestamp};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Append-only cost record storage with a time range query
#[async_trait]
pub trait CostStore: Send + Sync {
    /// Append a record
    async fn append(&self, record: &CostRecord) -> Result<()>;

    /// Records created at or after `since`, oldest first
    async fn records_since(&self, since: DateTime<Utc>) -> Result<Vec<CostRecord>>;

    /// Total USD spent at or after `since`
    async fn spend_since(&self, since: DateTime<Utc>) -> Result<f64>;

    /// Store name (for logging)
    fn name(&self) -> &str;
}

/// In-memory cost store
#[derive(Debug, Default)]
pub struct MemoryCostStore {
    records: RwLock<Vec<CostRecord>>,
}

impl MemoryCostStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CostStore for MemoryCostStore {
    async fn append(&self, record: &CostRecord) -> Result<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn records_since(&self, since: DateTime<Utc>) -> Result<Vec<CostRecord>> {
        let mut records: Vec<_> = self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.created_at >= since)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    async fn spend_since(&self, since: DateTime<Utc>) -> Result<f64> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.created_at >= since)
            .map(|r| r.cost_usd)
            .sum())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// SQLite cost store sharing the decision log's pool
#[derive(Clone)]
pub struct SqliteCostStore {
    pool: SqlitePool,
}

impl SqliteCostStore {
    /// Create a store over an existing pool
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the cost_records table
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cost_records (
                id TEXT PRIMARY KEY,
                agent TEXT NOT NULL,
                model TEXT NOT NULL,
                tokens_used INTEGER NOT NULL,
                cost_usd REAL NOT NULL,
                conversation_id TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_cost_records_created_at ON cost_records(created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }
}

#[async_trait]
impl CostStore for SqliteCostStore {
    async fn append(&self, record: &CostRecord) -> Result<()> {
        let tokens = i64::try_from(record.tokens_used).unwrap_or(i64::MAX);
        sqlx::query(
            r#"
            INSERT INTO cost_records (id, agent, model, tokens_used, cost_usd, conversation_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.agent)
        .bind(&record.model)
        .bind(tokens)
        .bind(record.cost_usd)
        .bind(&record.conversation_id)
        .bind(format_timestamp(record.created_at))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn records_since(&self, since: DateTime<Utc>) -> Result<Vec<CostRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, agent, model, tokens_used, cost_usd, conversation_id, created_at
            FROM cost_records
            WHERE created_at >= ?
            ORDER BY created_at ASC
            "#,
        )
        .bind(format_timestamp(since))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(row_to_record).collect()
    }

    async fn spend_since(&self, since: DateTime<Utc>) -> Result<f64> {
        let total: f64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(cost_usd), 0.0) FROM cost_records WHERE created_at >= ?",
        )
        .bind(format_timestamp(since))
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(total)
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

fn row_to_record(row: SqliteRow) -> Result<CostRecord> {
    let id: String = row.get("id");
    let tokens: i64 = row.get("tokens_used");
    let created_at: String = row.get("created_at");

    Ok(CostRecord {
        id: Uuid::parse_str(&id).map_err(|e| Error::Serialization(format!("invalid uuid: {e}")))?,
        agent: row.get("agent"),
        model: row.get("model"),
        tokens_used: u64::try_from(tokens).unwrap_or_default(),
        cost_usd: row.get("cost_usd"),
        conversation_id: row.get("conversation_id"),
        created_at: parse_timestamp(&created_at)?,
    })
}

fn db_error(e: sqlx::Error) -> Error {
    Error::Database(e.to_string())
}
