//! Replayer - Conversation reconstruction from the decision log
//!
//! Rebuilds a [`Conversation`] purely from its log events. Reconstruction is
//! read-only and idempotent: it never writes to the store and two calls over
//! the same log produce equal results.
//!
//! Algorithm:
//! 1. The earliest `conversation_started` event opens the conversation;
//!    without one the conversation does not exist.
//! 2. The latest terminal event (`conversation_completed`,
//!    `conversation_failed`, `conversation_manually_stopped`) fixes the status
//!    and `completed_at`.
//! 3. Otherwise the latest event carrying a final decision marks the
//!    conversation completed (a tolerated gap).
//! 4. Otherwise the conversation is still in progress.
//! 5. Contribution events become the response list, oldest first.

use crate::conversation::{
    AgentResponse, Conversation, ConversationStatus, Decision, DecisionRequest, FinalDecision,
    ProtocolResult,
};
use crate::error::{Error, Result};
use crate::event::{EventAction, LogEvent};
use crate::store::EventStoreTrait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// A place where the log did not hold what a clean lifecycle would have written.
///
/// Gaps never abort reconstruction; they describe the best-effort inference
/// that was made instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconstructionGap {
    /// A final decision was logged but no terminal marker followed
    MissingTerminalMarker {
        /// Event the completion was inferred from
        inferred_from: Uuid,
    },
    /// The start payload could not be decoded into a request
    UnreadableRequest {
        /// Offending event
        event_id: Uuid,
        /// Decoder message
        reason: String,
    },
    /// A contribution carried no recognisable decision
    UnreadableResponse {
        /// Offending event
        event_id: Uuid,
    },
    /// A final decision value is not known to this version
    UnknownFinalDecision {
        /// Offending event
        event_id: Uuid,
        /// Stored value
        value: String,
    },
}

/// Result of replaying a conversation's log
#[derive(Debug, Clone)]
pub struct Reconstruction {
    /// Rebuilt conversation
    pub conversation: Conversation,
    /// Inferences made along the way
    pub gaps: Vec<ReconstructionGap>,
    /// Number of events read
    pub event_count: usize,
}

/// Rebuilds conversations from an event store
#[derive(Clone)]
pub struct ConversationReplayer {
    store: Arc<dyn EventStoreTrait>,
}

impl ConversationReplayer {
    /// Create a replayer over a store
    #[must_use]
    pub fn new(store: Arc<dyn EventStoreTrait>) -> Self {
        Self { store }
    }

    /// Reconstruct a conversation.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the log holds no `conversation_started` event for
    /// the id, and store errors unchanged.
    #[instrument(skip(self))]
    pub async fn reconstruct(&self, conversation_id: &str) -> Result<Reconstruction> {
        let events = self.store.get_events(conversation_id).await?;
        let reconstruction = replay_events(conversation_id, &events)?;

        for gap in &reconstruction.gaps {
            warn!(conversation_id = %conversation_id, gap = ?gap, "Reconstruction gap");
        }
        debug!(
            conversation_id = %conversation_id,
            events = reconstruction.event_count,
            status = %reconstruction.conversation.status,
            "Reconstructed conversation from {}",
            self.store.name()
        );
        Ok(reconstruction)
    }
}

/// Replay an ordered event list into a conversation
pub fn replay_events(conversation_id: &str, events: &[LogEvent]) -> Result<Reconstruction> {
    let mut gaps = Vec::new();

    let started = events
        .iter()
        .find(|e| e.action == EventAction::ConversationStarted)
        .ok_or_else(|| Error::NotFound(conversation_id.to_string()))?;

    let request = match serde_json::from_value::<DecisionRequest>(started.data.clone()) {
        Ok(request) => request,
        Err(e) => {
            gaps.push(ReconstructionGap::UnreadableRequest {
                event_id: started.id,
                reason: e.to_string(),
            });
            let prompt = started
                .data
                .get("prompt")
                .and_then(|p| p.as_str())
                .unwrap_or_default();
            DecisionRequest::new(prompt)
        }
    };

    let mut conversation = Conversation::new(conversation_id, &request, started.created_at);

    conversation.responses = events
        .iter()
        .filter(|e| e.action.is_contribution())
        .map(|e| event_to_response(e, &mut gaps))
        .collect();

    if let Some(terminal) = events.iter().rev().find(|e| e.action.is_terminal()) {
        let (status, fallback) = match terminal.action {
            EventAction::ConversationCompleted => (ConversationStatus::Completed, None),
            EventAction::ConversationManuallyStopped => {
                (ConversationStatus::Failed, Some(FinalDecision::Stopped))
            }
            _ => (ConversationStatus::Failed, Some(FinalDecision::Failed)),
        };
        conversation.status = status;
        conversation.completed_at = Some(terminal.created_at);
        conversation.final_decision = parse_final_decision(terminal, &mut gaps).or(fallback);
        conversation.protocol_result = protocol_result_of(terminal);
    } else if let Some(decided) = events.iter().rev().find(|e| e.final_decision.is_some()) {
        gaps.push(ReconstructionGap::MissingTerminalMarker {
            inferred_from: decided.id,
        });
        conversation.status = ConversationStatus::Completed;
        conversation.completed_at = Some(decided.created_at);
        conversation.final_decision = parse_final_decision(decided, &mut gaps);
        conversation.protocol_result = protocol_result_of(decided);
    }

    Ok(Reconstruction {
        conversation,
        gaps,
        event_count: events.len(),
    })
}

fn parse_final_decision(event: &LogEvent, gaps: &mut Vec<ReconstructionGap>) -> Option<FinalDecision> {
    let value = event.final_decision.as_deref()?;
    match value.parse() {
        Ok(decision) => Some(decision),
        Err(_) => {
            gaps.push(ReconstructionGap::UnknownFinalDecision {
                event_id: event.id,
                value: value.to_string(),
            });
            None
        }
    }
}

fn protocol_result_of(event: &LogEvent) -> Option<ProtocolResult> {
    event
        .data
        .get("protocol_result")
        .filter(|v| !v.is_null())
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// Map a contribution event to a response.
///
/// `agent_response` events carry a full serialized response. Other producers
/// (validation steps) write looser payloads, which are read field by field.
fn event_to_response(event: &LogEvent, gaps: &mut Vec<ReconstructionGap>) -> AgentResponse {
    if let Ok(response) = serde_json::from_value::<AgentResponse>(event.data.clone()) {
        return response;
    }

    let decision = event
        .data
        .get("decision")
        .and_then(|d| d.as_str())
        .or(event.final_decision.as_deref())
        .and_then(|d| d.parse::<Decision>().ok());
    let decision = decision.unwrap_or_else(|| {
        gaps.push(ReconstructionGap::UnreadableResponse { event_id: event.id });
        Decision::NoResponse
    });

    let reasoning = event
        .data
        .get("reasoning")
        .and_then(|r| r.as_str())
        .unwrap_or_default();
    let confidence = event
        .data
        .get("confidence")
        .and_then(|c| c.as_f64())
        .unwrap_or(0.0);

    let mut response = AgentResponse::new(event.agent.clone(), decision, reasoning, confidence)
        .with_timestamp(event.created_at);
    response.data = event.data.get("data").cloned().filter(|d| !d.is_null());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::timestamp_now;
    use crate::store::MemoryEventStore;
    use chrono::Duration;

    fn started(id: &str) -> LogEvent {
        let request = DecisionRequest::new("release batch 7").with_workflow_id("wf-9");
        LogEvent::new(id, "system", EventAction::ConversationStarted)
            .with_data(serde_json::to_value(&request).unwrap())
    }

    fn response_event(id: &str, response: &AgentResponse) -> LogEvent {
        LogEvent::new(id, response.agent.clone(), EventAction::AgentResponse)
            .with_data(serde_json::to_value(response).unwrap())
            .at(response.timestamp)
    }

    #[test]
    fn test_missing_start_is_not_found() {
        let events = vec![LogEvent::new("c1", "a", EventAction::AgentResponse)];
        let err = replay_events("c1", &events).unwrap_err();
        assert!(matches!(err, Error::NotFound(id) if id == "c1"));
    }

    #[test]
    fn test_started_only_is_in_progress() {
        let reconstruction = replay_events("c1", &[started("c1")]).unwrap();
        let conversation = reconstruction.conversation;

        assert_eq!(conversation.status, ConversationStatus::InProgress);
        assert!(conversation.completed_at.is_none());
        assert!(conversation.responses.is_empty());
        assert_eq!(conversation.prompt, "release batch 7");
        assert_eq!(conversation.workflow_ids, vec!["wf-9".to_string()]);
        assert!(reconstruction.gaps.is_empty());
    }

    #[test]
    fn test_terminal_marker_sets_status_and_completion() {
        let base = timestamp_now();
        let a = AgentResponse::new("quality", Decision::Approved, "ok", 0.7)
            .with_timestamp(base + Duration::milliseconds(5));
        let terminal = LogEvent::new("c1", "system", EventAction::ConversationCompleted)
            .with_final_decision("approved")
            .at(base + Duration::milliseconds(10));

        let events = vec![started("c1"), response_event("c1", &a), terminal.clone()];
        let conversation = replay_events("c1", &events).unwrap().conversation;

        assert_eq!(conversation.status, ConversationStatus::Completed);
        assert_eq!(conversation.completed_at, Some(terminal.created_at));
        assert_eq!(conversation.final_decision, Some(FinalDecision::Approved));
        assert_eq!(conversation.responses, vec![a]);
    }

    #[test]
    fn test_final_decision_without_marker_is_inferred_completed() {
        let base = timestamp_now();
        let decided = LogEvent::new("c1", "risk", EventAction::ValidationResult)
            .with_data(serde_json::json!({"decision": "rejected", "confidence": 0.9}))
            .with_final_decision("rejected")
            .at(base + Duration::seconds(1));

        let reconstruction = replay_events("c1", &[started("c1"), decided.clone()]).unwrap();
        let conversation = &reconstruction.conversation;

        assert_eq!(conversation.status, ConversationStatus::Completed);
        assert_eq!(conversation.completed_at, Some(decided.created_at));
        assert_eq!(conversation.final_decision, Some(FinalDecision::Rejected));
        assert_eq!(
            reconstruction.gaps,
            vec![ReconstructionGap::MissingTerminalMarker {
                inferred_from: decided.id
            }]
        );
        assert_eq!(conversation.responses.len(), 1);
        assert_eq!(conversation.responses[0].decision, Decision::Rejected);
        assert_eq!(conversation.responses[0].confidence, 0.9);
    }

    #[test]
    fn test_manual_stop_is_terminal_failed() {
        let stop = LogEvent::new("c1", "operator", EventAction::ConversationManuallyStopped)
            .with_final_decision("stopped");
        let conversation = replay_events("c1", &[started("c1"), stop]).unwrap().conversation;

        assert_eq!(conversation.status, ConversationStatus::Failed);
        assert_eq!(conversation.final_decision, Some(FinalDecision::Stopped));
    }

    #[test]
    fn test_late_responses_are_not_contributions() {
        let base = timestamp_now();
        let on_time = AgentResponse::new("a", Decision::Approved, "", 0.6).with_timestamp(base);
        let terminal = LogEvent::new("c1", "system", EventAction::ConversationCompleted)
            .with_final_decision("approved")
            .at(base + Duration::milliseconds(1));
        let late = AgentResponse::new("b", Decision::Rejected, "", 1.0)
            .with_timestamp(base + Duration::milliseconds(2));
        let late_event = LogEvent::new("c1", "b", EventAction::LateAgentResponse)
            .with_data(serde_json::to_value(&late).unwrap())
            .at(late.timestamp);

        let events = vec![started("c1"), response_event("c1", &on_time), terminal, late_event];
        let conversation = replay_events("c1", &events).unwrap().conversation;

        assert_eq!(conversation.responses, vec![on_time]);
        assert_eq!(conversation.final_decision, Some(FinalDecision::Approved));
    }

    #[test]
    fn test_unknown_final_decision_is_a_gap() {
        let terminal = LogEvent::new("c1", "system", EventAction::ConversationCompleted)
            .with_final_decision("maybe");
        let reconstruction = replay_events("c1", &[started("c1"), terminal.clone()]).unwrap();

        assert_eq!(reconstruction.conversation.status, ConversationStatus::Completed);
        assert_eq!(reconstruction.conversation.final_decision, None);
        assert_eq!(
            reconstruction.gaps,
            vec![ReconstructionGap::UnknownFinalDecision {
                event_id: terminal.id,
                value: "maybe".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_reconstruct_is_idempotent() {
        let store = Arc::new(MemoryEventStore::new());
        store.append(started("c1")).await.unwrap();
        let a = AgentResponse::new("a", Decision::Conditional, "needs QA", 0.5);
        store.append(response_event("c1", &a)).await.unwrap();

        let replayer = ConversationReplayer::new(store.clone());
        let first = replayer.reconstruct("c1").await.unwrap();
        let second = replayer.reconstruct("c1").await.unwrap();

        assert_eq!(first.conversation, second.conversation);
        assert_eq!(first.event_count, 2);
        assert_eq!(store.len().await, 2);
    }
}
