//! Conversation repositories
//!
//! Reads go through a repository seam with two implementations: the live
//! in-memory cache and log replay. `ReadThrough` composes them and never
//! writes a replayed conversation back into the cache, so an evicted entry
//! stays visible as a cache miss.

use crate::error::Result;
use async_trait::async_trait;
use conclave_replay::{Conversation, ConversationReplayer, Reconstruction};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Read access to conversations
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Look up a conversation, `None` if this repository does not know it
    async fn find(&self, id: &str) -> Result<Option<Conversation>>;

    /// Repository name (for logging)
    fn name(&self) -> &str;
}

/// Live conversation state
#[derive(Default)]
pub struct MemoryRepository {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl MemoryRepository {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a conversation; false if the id is already cached
    pub async fn insert_new(&self, conversation: Conversation) -> bool {
        let mut conversations = self.conversations.write().await;
        if conversations.contains_key(&conversation.id) {
            return false;
        }
        conversations.insert(conversation.id.clone(), conversation);
        true
    }

    /// Mutate a cached conversation under the write lock
    pub async fn update<R>(&self, id: &str, f: impl FnOnce(&mut Conversation) -> R) -> Option<R> {
        let mut conversations = self.conversations.write().await;
        conversations.get_mut(id).map(f)
    }

    /// Remove a cached conversation
    pub async fn remove(&self, id: &str) -> Option<Conversation> {
        self.conversations.write().await.remove(id)
    }

    /// All cached conversations, oldest first
    pub async fn snapshot(&self) -> Vec<Conversation> {
        let mut all: Vec<_> = self.conversations.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
        all
    }

    /// Number of cached conversations still in progress
    pub async fn in_progress_count(&self) -> usize {
        self.conversations
            .read()
            .await
            .values()
            .filter(|c| !c.is_terminal())
            .count()
    }

    /// Drop every cached conversation, returning how many there were
    pub async fn clear(&self) -> usize {
        let mut conversations = self.conversations.write().await;
        let count = conversations.len();
        conversations.clear();
        count
    }
}

#[async_trait]
impl ConversationRepository for MemoryRepository {
    async fn find(&self, id: &str) -> Result<Option<Conversation>> {
        Ok(self.conversations.read().await.get(id).cloned())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Conversations rebuilt from the decision log
#[derive(Clone)]
pub struct LogReplayRepository {
    replayer: ConversationReplayer,
}

impl LogReplayRepository {
    /// Create a repository over a replayer
    #[must_use]
    pub fn new(replayer: ConversationReplayer) -> Self {
        Self { replayer }
    }

    /// Full reconstruction, including any gaps that were inferred over
    pub async fn reconstruct(&self, id: &str) -> Result<Option<Reconstruction>> {
        match self.replayer.reconstruct(id).await {
            Ok(reconstruction) => Ok(Some(reconstruction)),
            Err(conclave_replay::Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ConversationRepository for LogReplayRepository {
    async fn find(&self, id: &str) -> Result<Option<Conversation>> {
        Ok(self.reconstruct(id).await?.map(|r| r.conversation))
    }

    fn name(&self) -> &str {
        "log-replay"
    }
}

/// Fast path first, fallback on miss, no write-back
#[derive(Clone)]
pub struct ReadThrough {
    fast: Arc<dyn ConversationRepository>,
    fallback: Arc<dyn ConversationRepository>,
}

impl ReadThrough {
    /// Compose two repositories
    #[must_use]
    pub fn new(
        fast: Arc<dyn ConversationRepository>,
        fallback: Arc<dyn ConversationRepository>,
    ) -> Self {
        Self { fast, fallback }
    }
}

#[async_trait]
impl ConversationRepository for ReadThrough {
    async fn find(&self, id: &str) -> Result<Option<Conversation>> {
        if let Some(conversation) = self.fast.find(id).await? {
            return Ok(Some(conversation));
        }
        tracing::debug!(
            conversation_id = %id,
            "Cache miss in {}, falling back to {}",
            self.fast.name(),
            self.fallback.name()
        );
        self.fallback.find(id).await
    }

    fn name(&self) -> &str {
        "read-through"
    }
}
