//! Conversation Registry
//!
//! Owns the live state of every active conversation. Every transition is
//! mirrored to the decision log; a failed log write is reported on the audit
//! target and the in-memory transition stands.

mod repository;


pub use repository::{ConversationRepository, LogReplayRepository, MemoryRepository, ReadThrough};

use crate::error::{Error, Result};
use conclave_replay::{
    timestamp_now, AgentResponse, Conversation, ConversationReplayer, DecisionRequest, Escalation,
    EventAction, EventStoreTrait, FinalDecision, LogEvent, LogLevel, ProtocolResult, Reconstruction,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Agent name recorded on lifecycle events
const SYSTEM_AGENT: &str = "system";

/// What happened to an appended response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Added to the live conversation
    Appended,
    /// The conversation is not cached but still open in the log; recorded there only
    LogOnly,
    /// The conversation was already terminal; recorded for audit only
    Late,
}

/// Registry of live conversations backed by the decision log
pub struct ConversationRegistry {
    cache: Arc<MemoryRepository>,
    replay: Arc<LogReplayRepository>,
    reader: ReadThrough,
    events: Arc<dyn EventStoreTrait>,
}

impl ConversationRegistry {
    /// Create a registry writing to the given event store
    #[must_use]
    pub fn new(events: Arc<dyn EventStoreTrait>) -> Self {
        let cache = Arc::new(MemoryRepository::new());
        let replay = Arc::new(LogReplayRepository::new(ConversationReplayer::new(
            events.clone(),
        )));
        let reader = ReadThrough::new(cache.clone(), replay.clone());
        Self {
            cache,
            replay,
            reader,
            events,
        }
    }

    /// Open a conversation.
    ///
    /// Generates an id when none is given. Fails with `DuplicateConversation`
    /// if the id is cached or already has a history in the log.
    #[instrument(skip(self, request), fields(conversation_id))]
    pub async fn create(&self, id: Option<String>, request: &DecisionRequest) -> Result<Conversation> {
        let id = match id {
            Some(id) => {
                if self.known_to_log(&id).await {
                    return Err(Error::DuplicateConversation(id));
                }
                id
            }
            None => Uuid::new_v4().to_string(),
        };
        tracing::Span::current().record("conversation_id", id.as_str());

        let payload =
            serde_json::to_value(request).map_err(|e| Error::Serialization(e.to_string()))?;
        let started_at = timestamp_now();
        let conversation = Conversation::new(id.clone(), request, started_at);

        if !self.cache.insert_new(conversation.clone()).await {
            return Err(Error::DuplicateConversation(id));
        }

        self.record(
            LogEvent::new(&id, SYSTEM_AGENT, EventAction::ConversationStarted)
                .with_data(payload)
                .at(started_at),
        )
        .await;

        info!(
            conversation_id = %id,
            kind = %request.kind,
            severity = request.severity.as_str(),
            "Conversation started"
        );
        Ok(conversation)
    }

    /// Append an agent response.
    ///
    /// A response for a terminal conversation is logged as
    /// `late_agent_response` and never mutates it.
    #[instrument(skip(self, response), fields(agent = %response.agent))]
    pub async fn append_response(&self, id: &str, response: AgentResponse) -> Result<AppendOutcome> {
        let appended = self
            .cache
            .update(id, |c| c.push_response(response.clone()))
            .await;

        let outcome = match appended {
            Some(true) => AppendOutcome::Appended,
            Some(false) => AppendOutcome::Late,
            None => match self.replay.find(id).await? {
                Some(logged) if logged.is_terminal() => AppendOutcome::Late,
                Some(_) => AppendOutcome::LogOnly,
                None => return Err(Error::NotFound(id.to_string())),
            },
        };

        let (action, level) = match outcome {
            AppendOutcome::Late => {
                warn!(
                    conversation_id = %id,
                    agent = %response.agent,
                    "Response arrived after finalization, recording for audit only"
                );
                (EventAction::LateAgentResponse, LogLevel::Warn)
            }
            _ if response.is_error() => (EventAction::AgentResponse, LogLevel::Warn),
            _ => (EventAction::AgentResponse, LogLevel::Info),
        };

        let timestamp = response.timestamp;
        match serde_json::to_value(&response) {
            Ok(data) => {
                self.record(
                    LogEvent::new(id, response.agent.clone(), action)
                        .with_level(level)
                        .with_data(data)
                        .at(timestamp),
                )
                .await;
            }
            Err(e) => error!(
                target: "conclave::audit",
                conversation_id = %id,
                error = %e,
                "Failed to serialize agent response"
            ),
        }

        debug!(conversation_id = %id, outcome = ?outcome, "Response recorded");
        Ok(outcome)
    }

    /// Finalize a conversation.
    ///
    /// Idempotent: finalizing a terminal conversation returns it unchanged and
    /// writes nothing.
    #[instrument(skip(self, protocol_result))]
    pub async fn finalize(
        &self,
        id: &str,
        decision: FinalDecision,
        protocol_result: Option<ProtocolResult>,
    ) -> Result<Conversation> {
        self.finish(id, decision, protocol_result, None).await
    }

    /// Stop a conversation regardless of in-flight agent calls.
    ///
    /// A no-op on terminal conversations. If the conversation is no longer
    /// cached but still open in the log, the stop marker is written to the log.
    #[instrument(skip(self))]
    pub async fn manually_stop(&self, id: &str, reason: &str) -> Result<Conversation> {
        self.finish(id, FinalDecision::Stopped, None, Some(reason))
            .await
    }

    /// Record that a decision was handed to the approval gate
    pub async fn note_escalation(&self, id: &str, escalation: &Escalation) {
        let data = json!({
            "approval_id": escalation.approval_id,
            "reason": escalation.reason,
        });
        self.record(
            LogEvent::new(id, SYSTEM_AGENT, EventAction::ConversationEscalated)
                .with_level(LogLevel::Warn)
                .with_data(data)
                .with_final_decision(FinalDecision::Escalated.as_str()),
        )
        .await;
        info!(
            conversation_id = %id,
            approval_id = %escalation.approval_id,
            "Conversation escalated to human approval"
        );
    }

    /// Look up a conversation, falling back to log replay on a cache miss
    pub async fn get(&self, id: &str) -> Result<Option<Conversation>> {
        self.reader.find(id).await
    }

    /// Reconstruct a conversation from the log alone
    pub async fn reconstruct(&self, id: &str) -> Result<Option<Reconstruction>> {
        self.replay.reconstruct(id).await
    }

    /// Currently cached conversations, oldest first
    pub async fn list_all(&self) -> Vec<Conversation> {
        self.cache.snapshot().await
    }

    /// Number of cached conversations still in progress
    pub async fn in_progress_count(&self) -> usize {
        self.cache.in_progress_count().await
    }

    /// Drop a conversation from the cache; the log is untouched
    pub async fn evict(&self, id: &str) -> Option<Conversation> {
        self.cache.remove(id).await
    }

    /// Drop every cached conversation
    pub async fn clear(&self) -> usize {
        self.cache.clear().await
    }

    async fn finish(
        &self,
        id: &str,
        decision: FinalDecision,
        protocol_result: Option<ProtocolResult>,
        reason: Option<&str>,
    ) -> Result<Conversation> {
        let at = timestamp_now();
        let cached = self
            .cache
            .update(id, |c| {
                let changed = c.finish(decision, protocol_result.clone(), at);
                (changed, c.clone())
            })
            .await;

        let conversation = match cached {
            Some((true, conversation)) => conversation,
            Some((false, conversation)) => {
                debug!(conversation_id = %id, "Conversation already terminal, nothing to do");
                return Ok(conversation);
            }
            None => {
                let Some(mut logged) = self.replay.find(id).await? else {
                    return Err(Error::NotFound(id.to_string()));
                };
                if !logged.finish(decision, protocol_result.clone(), at) {
                    debug!(conversation_id = %id, "Logged conversation already terminal");
                    return Ok(logged);
                }
                warn!(conversation_id = %id, "Finalizing a conversation that is not cached");
                logged
            }
        };

        self.record(terminal_event(id, decision, protocol_result.as_ref(), reason, at))
            .await;

        info!(
            conversation_id = %id,
            final_decision = %decision,
            status = %conversation.status,
            responses = conversation.responses.len(),
            "Conversation finalized"
        );
        Ok(conversation)
    }

    /// Whether the log already holds a lifecycle for `id`.
    ///
    /// An unreadable log is treated as unknown so that creation keeps working
    /// during an outage.
    async fn known_to_log(&self, id: &str) -> bool {
        match self.replay.find(id).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                warn!(
                    conversation_id = %id,
                    error = %e,
                    "Could not check the decision log for an existing conversation"
                );
                false
            }
        }
    }

    async fn record(&self, event: LogEvent) {
        if let Err(e) = self.events.append(event.clone()).await {
            error!(
                target: "conclave::audit",
                conversation_id = %event.conversation_id,
                action = %event.action,
                store = self.events.name(),
                error = %e,
                "Failed to write decision log event"
            );
        }
    }
}

fn terminal_event(
    id: &str,
    decision: FinalDecision,
    protocol_result: Option<&ProtocolResult>,
    reason: Option<&str>,
    at: chrono::DateTime<chrono::Utc>,
) -> LogEvent {
    let action = match decision {
        FinalDecision::Stopped => EventAction::ConversationManuallyStopped,
        d if d.signals_failure() => EventAction::ConversationFailed,
        _ => EventAction::ConversationCompleted,
    };
    let level = if decision.signals_failure() {
        LogLevel::Warn
    } else {
        LogLevel::Info
    };

    let mut data = serde_json::Map::new();
    if let Some(result) = protocol_result {
        match serde_json::to_value(result) {
            Ok(value) => {
                data.insert("protocol_result".to_string(), value);
            }
            Err(e) => error!(
                target: "conclave::audit",
                conversation_id = %id,
                error = %e,
                "Failed to serialize protocol result"
            ),
        }
    }
    if let Some(reason) = reason {
        data.insert("reason".to_string(), json!(reason));
    }

    LogEvent::new(id, SYSTEM_AGENT, action)
        .with_level(level)
        .with_data(serde_json::Value::Object(data))
        .with_final_decision(decision.as_str())
        .at(at)
}
