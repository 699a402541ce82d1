//! Agent invocation seam
//!
//! An agent is an opaque remote decision procedure: it receives the request
//! and answers with a verdict or an error.

use async_trait::async_trait;
use conclave_replay::{ConversationType, Decision, DecisionRequest, Severity, Urgency};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by an agent invocation
///
/// These never escape dispatch; each is absorbed into a synthetic response.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    /// The agent did not answer in time
    #[error("agent timed out")]
    Timeout,

    /// The agent could not be reached
    #[error("transport error: {0}")]
    Transport(String),

    /// The agent answered with an error
    #[error("agent returned an error: {0}")]
    Remote(String),

    /// The answer could not be understood
    #[error("invalid agent response: {0}")]
    InvalidResponse(String),

    /// No agent is configured for the role
    #[error("no agent configured for role '{0}'")]
    NotConfigured(String),
}

/// What an agent is asked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCall {
    /// Conversation the call belongs to
    pub conversation_id: String,
    /// Question or proposed action
    pub prompt: String,
    /// Request kind
    #[serde(rename = "type")]
    pub kind: ConversationType,
    /// Opaque structured payload
    pub context: serde_json::Value,
    /// Urgency
    pub urgency: Urgency,
    /// Severity
    pub severity: Severity,
}

impl AgentCall {
    /// Build a call for a conversation's request
    #[must_use]
    pub fn new(conversation_id: impl Into<String>, request: &DecisionRequest) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            prompt: request.prompt.clone(),
            kind: request.kind,
            context: request.context.clone(),
            urgency: request.urgency,
            severity: request.severity,
        }
    }
}

/// Usage an agent reports for one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentUsage {
    /// Model that produced the answer
    pub model: String,
    /// Tokens consumed
    #[serde(default)]
    pub tokens: u64,
    /// Spend in USD, estimated from pricing when absent
    #[serde(default)]
    pub cost_usd: Option<f64>,
}

/// An agent's answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    /// Verdict
    pub decision: Decision,
    /// Justification
    #[serde(default)]
    pub reasoning: String,
    /// Confidence in `0..=1`
    #[serde(default)]
    pub confidence: f64,
    /// Structured findings or recommendations
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// Reported usage
    #[serde(default)]
    pub usage: Option<AgentUsage>,
}

impl AgentOutput {
    /// Create an answer without data or usage
    #[must_use]
    pub fn new(decision: Decision, reasoning: impl Into<String>, confidence: f64) -> Self {
        Self {
            decision,
            reasoning: reasoning.into(),
            confidence,
            data: None,
            usage: None,
        }
    }

    /// Attach structured data
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Attach usage
    #[must_use]
    pub fn with_usage(mut self, model: impl Into<String>, tokens: u64, cost_usd: Option<f64>) -> Self {
        self.usage = Some(AgentUsage {
            model: model.into(),
            tokens,
            cost_usd,
        });
        self
    }
}

/// Invokes agents by role
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    /// Ask the agent playing `role`
    async fn invoke(&self, role: &str, call: &AgentCall) -> Result<AgentOutput, AgentError>;

    /// Invoker name (for logging)
    fn name(&self) -> &str;
}
