//! Approval request storage

use super::request::{ApprovalFilter, ApprovalRequest, ApprovalStatus};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conclave_replay::store::{format_timestamp, parse_timestamp};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Approval request storage
///
/// Stored rows carry the persisted status only; expiry is applied by readers.
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// Insert a new request
    async fn insert(&self, request: &ApprovalRequest) -> Result<()>;

    /// Fetch a request by ID
    async fn get(&self, id: Uuid) -> Result<Option<ApprovalRequest>>;

    /// Move a request out of `pending`.
    ///
    /// Applies only if the stored status is `pending` and `expiry_at` is after
    /// `at`; returns whether the row changed.
    async fn transition(&self, id: Uuid, to: ApprovalStatus, at: DateTime<Utc>) -> Result<bool>;

    /// Requests matching the filter's agent, conversation and creation
    /// window, oldest first. Status filtering is left to the caller.
    async fn list(&self, filter: &ApprovalFilter) -> Result<Vec<ApprovalRequest>>;

    /// Store name (for logging)
    fn name(&self) -> &str;
}

/// In-memory approval store
#[derive(Debug, Default)]
pub struct MemoryApprovalStore {
    requests: RwLock<HashMap<Uuid, ApprovalRequest>>,
}

impl MemoryApprovalStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApprovalStore for MemoryApprovalStore {
    async fn insert(&self, request: &ApprovalRequest) -> Result<()> {
        self.requests
            .write()
            .await
            .insert(request.id, request.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ApprovalRequest>> {
        Ok(self.requests.read().await.get(&id).cloned())
    }

    async fn transition(&self, id: Uuid, to: ApprovalStatus, at: DateTime<Utc>) -> Result<bool> {
        let mut requests = self.requests.write().await;
        match requests.get_mut(&id) {
            Some(request) if request.status == ApprovalStatus::Pending && request.expiry_at > at => {
                request.status = to;
                request.decided_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list(&self, filter: &ApprovalFilter) -> Result<Vec<ApprovalRequest>> {
        let mut requests: Vec<_> = self
            .requests
            .read()
            .await
            .values()
            .filter(|r| filter.accepts(r))
            .cloned()
            .collect();
        requests.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(requests)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// SQLite approval store sharing the decision log's pool
#[derive(Clone)]
pub struct SqliteApprovalStore {
    pool: SqlitePool,
}

impl SqliteApprovalStore {
    /// Create a store over an existing pool
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the approval_requests table
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS approval_requests (
                id TEXT PRIMARY KEY,
                agent TEXT NOT NULL,
                action TEXT NOT NULL,
                reasoning TEXT NOT NULL,
                data TEXT NOT NULL,
                status TEXT NOT NULL,
                conversation_id TEXT,
                created_at TEXT NOT NULL,
                expiry_at TEXT NOT NULL,
                decided_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_approval_requests_created_at ON approval_requests(created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_approval_requests_status ON approval_requests(status, expiry_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }
}

#[async_trait]
impl ApprovalStore for SqliteApprovalStore {
    async fn insert(&self, request: &ApprovalRequest) -> Result<()> {
        let data = serde_json::to_string(&request.data)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO approval_requests
                (id, agent, action, reasoning, data, status, conversation_id, created_at, expiry_at, decided_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(request.id.to_string())
        .bind(&request.agent)
        .bind(&request.action)
        .bind(&request.reasoning)
        .bind(data)
        .bind(request.status.as_str())
        .bind(&request.conversation_id)
        .bind(format_timestamp(request.created_at))
        .bind(format_timestamp(request.expiry_at))
        .bind(request.decided_at.map(format_timestamp))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<ApprovalRequest>> {
        let row = sqlx::query("SELECT * FROM approval_requests WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.map(row_to_request).transpose()
    }

    async fn transition(&self, id: Uuid, to: ApprovalStatus, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE approval_requests
            SET status = ?, decided_at = ?
            WHERE id = ? AND status = 'pending' AND expiry_at > ?
            "#,
        )
        .bind(to.as_str())
        .bind(format_timestamp(at))
        .bind(id.to_string())
        .bind(format_timestamp(at))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn list(&self, filter: &ApprovalFilter) -> Result<Vec<ApprovalRequest>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM approval_requests
            WHERE (?1 IS NULL OR agent = ?1)
              AND (?2 IS NULL OR conversation_id = ?2)
              AND (?3 IS NULL OR created_at >= ?3)
              AND (?4 IS NULL OR created_at < ?4)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(&filter.agent)
        .bind(&filter.conversation_id)
        .bind(filter.created_after.map(format_timestamp))
        .bind(filter.created_before.map(format_timestamp))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(row_to_request).collect()
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

fn row_to_request(row: SqliteRow) -> Result<ApprovalRequest> {
    let id: String = row.get("id");
    let data: String = row.get("data");
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let expiry_at: String = row.get("expiry_at");
    let decided_at: Option<String> = row.get("decided_at");

    Ok(ApprovalRequest {
        id: Uuid::parse_str(&id).map_err(|e| Error::Serialization(format!("invalid uuid: {e}")))?,
        agent: row.get("agent"),
        action: row.get("action"),
        reasoning: row.get("reasoning"),
        data: serde_json::from_str(&data)
            .map_err(|e| Error::Serialization(format!("invalid json: {e}")))?,
        status: status.parse().map_err(Error::Serialization)?,
        conversation_id: row.get("conversation_id"),
        created_at: parse_timestamp(&created_at)?,
        expiry_at: parse_timestamp(&expiry_at)?,
        decided_at: decided_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

fn db_error(e: sqlx::Error) -> Error {
    Error::Database(e.to_string())
}
