//! EventStore - SQLite-based event storage

use super::helpers::{format_timestamp, row_to_event};
use super::traits::EventStoreTrait;
use crate::error::{Error, Result};
use crate::event::LogEvent;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Event store persisting the decision log to SQLite
#[derive(Clone)]
pub struct EventStore {
    pool: SqlitePool,
}

impl EventStore {
    /// Create a new event store with the given connection pool.
    ///
    /// The caller is responsible for having run [`EventStore::migrate`].
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new event store from a database path
    ///
    /// This will create the database file if it doesn't exist and run migrations.
    pub async fn from_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Database(format!("failed to create directory: {e}")))?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        let store = Self { pool };
        store.migrate().await?;

        info!("SQLite event store initialized at {}", db_path.display());
        Ok(store)
    }

    /// Create a new in-memory event store (for testing)
    pub async fn in_memory() -> Result<Self> {
        // A single connection so every handle on the pool sees the same database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| Error::Database(e.to_string()))?;

        let store = Self { pool };
        store.migrate().await?;

        debug!("In-memory SQLite event store initialized");
        Ok(store)
    }

    /// Create the events table and its indexes
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                conversation_id TEXT NOT NULL,
                agent TEXT NOT NULL,
                action TEXT NOT NULL,
                level TEXT NOT NULL DEFAULT 'info',
                data TEXT NOT NULL DEFAULT '{}',
                final_decision TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_events_conversation
            ON events(conversation_id, created_at, seq)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_events_created
            ON events(created_at, seq)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        debug!("Event log migrations completed");
        Ok(())
    }

    /// Get a reference to the underlying connection pool
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Record a new event
    #[instrument(skip(self, event), fields(event_id = %event.id, conversation_id = %event.conversation_id))]
    pub async fn record_event(&self, event: &LogEvent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO events (
                id, conversation_id, agent, action, level,
                data, final_decision, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8
            )
            "#,
        )
        .bind(event.id.to_string())
        .bind(&event.conversation_id)
        .bind(&event.agent)
        .bind(event.action.as_str())
        .bind(event.level.as_str())
        .bind(event.data.to_string())
        .bind(&event.final_decision)
        .bind(format_timestamp(event.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        debug!(action = %event.action, "Recorded event");
        Ok(())
    }

    /// Get all events for a conversation
    #[instrument(skip(self))]
    pub async fn get_conversation_events(&self, conversation_id: &str) -> Result<Vec<LogEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, conversation_id, agent, action, level,
                   data, final_decision, created_at
            FROM events
            WHERE conversation_id = ?1
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        rows.into_iter().map(row_to_event).collect()
    }

    /// Get events across all conversations from a point in time
    #[instrument(skip(self))]
    pub async fn list_events_since(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<LogEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, conversation_id, agent, action, level,
                   data, final_decision, created_at
            FROM events
            WHERE created_at >= ?1
            ORDER BY created_at ASC, seq ASC
            LIMIT ?2
            "#,
        )
        .bind(format_timestamp(since))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        rows.into_iter().map(row_to_event).collect()
    }

    /// Count events for a conversation
    #[instrument(skip(self))]
    pub async fn count_events(&self, conversation_id: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE conversation_id = ?1")
                .bind(conversation_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| Error::Database(e.to_string()))?;

        Ok(count)
    }
}

#[async_trait::async_trait]
impl EventStoreTrait for EventStore {
    async fn append(&self, event: LogEvent) -> Result<()> {
        self.record_event(&event).await
    }

    async fn get_events(&self, conversation_id: &str) -> Result<Vec<LogEvent>> {
        self.get_conversation_events(conversation_id).await
    }

    async fn get_events_since(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<LogEvent>> {
        self.list_events_since(since, limit).await
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
