//! MemoryEventStore - In-process event storage

use super::traits::EventStoreTrait;
use crate::error::{Error, Result};
use crate::event::LogEvent;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// Event store keeping the log in memory.
///
/// Used for tests and ephemeral deployments. The store can be switched
/// offline to exercise the fire-and-continue write path.
#[derive(Debug)]
pub struct MemoryEventStore {
    events: RwLock<Vec<LogEvent>>,
    available: AtomicBool,
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEventStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the backing store going offline or coming back
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of events held
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    /// Whether the log is empty
    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::Database("memory store offline".to_string()))
        }
    }
}

#[async_trait::async_trait]
impl EventStoreTrait for MemoryEventStore {
    async fn append(&self, event: LogEvent) -> Result<()> {
        self.check_available()?;
        self.events.write().await.push(event);
        Ok(())
    }

    async fn get_events(&self, conversation_id: &str) -> Result<Vec<LogEvent>> {
        self.check_available()?;
        let events = self.events.read().await;
        let mut matching: Vec<LogEvent> = events
            .iter()
            .filter(|e| e.conversation_id == conversation_id)
            .cloned()
            .collect();
        // Stable sort keeps append order for equal timestamps
        matching.sort_by_key(|e| e.created_at);
        Ok(matching)
    }

    async fn get_events_since(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<LogEvent>> {
        self.check_available()?;
        let events = self.events.read().await;
        let mut matching: Vec<LogEvent> = events
            .iter()
            .filter(|e| e.created_at >= since)
            .cloned()
            .collect();
        matching.sort_by_key(|e| e.created_at);
        matching.truncate(limit);
        Ok(matching)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
