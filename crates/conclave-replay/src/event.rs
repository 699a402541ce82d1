//! Event - Append-only decision log entries
//!
//! Every lifecycle transition of a conversation is recorded as a `LogEvent`.
//! Events are immutable once appended and never deleted; they are the source
//! of truth whenever live state is unavailable.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current time truncated to microseconds.
///
/// Every persisted timestamp goes through this so that values read back from
/// the store compare equal to the ones held in memory.
#[must_use]
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Lifecycle action recorded by an event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum EventAction {
    /// Conversation opened
    ConversationStarted,
    /// An agent response was appended
    AgentResponse,
    /// A response arrived after the conversation was finalized (audit only)
    LateAgentResponse,
    /// A domain validation step contributed a verdict
    ValidationResult,
    /// The outcome was handed to the human approval gate
    ConversationEscalated,
    /// Conversation finalized with a decision
    ConversationCompleted,
    /// Conversation finalized without a usable decision
    ConversationFailed,
    /// Conversation stopped by an operator
    ConversationManuallyStopped,
    /// Action written by a newer or foreign producer
    Other(String),
}

impl EventAction {
    /// Returns the string representation of the action
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::ConversationStarted => "conversation_started",
            Self::AgentResponse => "agent_response",
            Self::LateAgentResponse => "late_agent_response",
            Self::ValidationResult => "validation_result",
            Self::ConversationEscalated => "conversation_escalated",
            Self::ConversationCompleted => "conversation_completed",
            Self::ConversationFailed => "conversation_failed",
            Self::ConversationManuallyStopped => "conversation_manually_stopped",
            Self::Other(action) => action,
        }
    }

    /// Whether the action ends a conversation's mutable lifecycle
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ConversationCompleted
                | Self::ConversationFailed
                | Self::ConversationManuallyStopped
        )
    }

    /// Whether the action carries an agent's verdict for the conversation
    #[must_use]
    pub fn is_contribution(&self) -> bool {
        matches!(self, Self::AgentResponse | Self::ValidationResult)
    }
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for EventAction {
    fn from(s: String) -> Self {
        match s.as_str() {
            "conversation_started" => Self::ConversationStarted,
            "agent_response" => Self::AgentResponse,
            "late_agent_response" => Self::LateAgentResponse,
            "validation_result" => Self::ValidationResult,
            "conversation_escalated" => Self::ConversationEscalated,
            "conversation_completed" => Self::ConversationCompleted,
            "conversation_failed" => Self::ConversationFailed,
            "conversation_manually_stopped" => Self::ConversationManuallyStopped,
            _ => Self::Other(s),
        }
    }
}

impl From<EventAction> for String {
    fn from(action: EventAction) -> Self {
        action.as_str().to_string()
    }
}

/// Severity of a log event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Diagnostic detail
    Debug,
    /// Normal lifecycle step
    #[default]
    Info,
    /// Degraded but continuing
    Warn,
    /// Failure
    Error,
}

impl LogLevel {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("unknown log level: {s}")),
        }
    }
}

/// An immutable entry in the decision log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Unique identifier
    pub id: Uuid,
    /// Conversation this event belongs to
    pub conversation_id: String,
    /// Agent role, or `system` for lifecycle events
    pub agent: String,
    /// What happened
    pub action: EventAction,
    /// Severity
    pub level: LogLevel,
    /// Action-specific payload
    pub data: serde_json::Value,
    /// Final decision, when the event carries one
    pub final_decision: Option<String>,
    /// When the event occurred
    pub created_at: DateTime<Utc>,
}

impl LogEvent {
    /// Create a new event timestamped now
    #[must_use]
    pub fn new(
        conversation_id: impl Into<String>,
        agent: impl Into<String>,
        action: EventAction,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id: conversation_id.into(),
            agent: agent.into(),
            action,
            level: LogLevel::Info,
            data: serde_json::json!({}),
            final_decision: None,
            created_at: timestamp_now(),
        }
    }

    /// Set the payload
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Set the level
    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Set the final decision
    #[must_use]
    pub fn with_final_decision(mut self, decision: impl Into<String>) -> Self {
        self.final_decision = Some(decision.into());
        self
    }

    /// Override the timestamp
    #[must_use]
    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}
