//! Trait for event storage backends

use crate::error::Result;
use crate::event::LogEvent;
use chrono::{DateTime, Utc};

/// Trait for event storage backends
///
/// Any store offering append plus a time-ordered range query satisfies it.
/// Implementations must return events ordered by `created_at`, with ties kept
/// in append order.
#[async_trait::async_trait]
pub trait EventStoreTrait: Send + Sync {
    /// Append an event to the log
    async fn append(&self, event: LogEvent) -> Result<()>;

    /// Get all events for a conversation, oldest first
    async fn get_events(&self, conversation_id: &str) -> Result<Vec<LogEvent>>;

    /// Get events across all conversations created at or after `since`,
    /// oldest first
    async fn get_events_since(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<LogEvent>>;

    /// Get the event store name (for logging)
    fn name(&self) -> &str;
}
