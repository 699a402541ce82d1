//! Conversation - The decision-request data model
//!
//! A conversation is one decision-request lifecycle: it is opened when a
//! request is dispatched, collects agent responses in completion order and is
//! finalized exactly once. The same types are produced by the live registry
//! and by log reconstruction, so they must stay structurally comparable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    /// Agents are still being consulted
    InProgress,
    /// A final decision was reached
    Completed,
    /// The conversation ended without a usable decision
    Failed,
}

impl ConversationStatus {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Check if the status is terminal (completed or failed)
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl std::fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ConversationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("unknown conversation status: {s}")),
        }
    }
}

/// Kind of decision request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationType {
    /// A request for permission to act
    #[default]
    Request,
    /// An informational question
    Query,
    /// An analysis of supplied context
    Analysis,
    /// A validation of a proposed change
    Validation,
}

impl ConversationType {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Query => "query",
            Self::Analysis => "analysis",
            Self::Validation => "validation",
        }
    }
}

impl std::fmt::Display for ConversationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ConversationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "request" => Ok(Self::Request),
            "query" => Ok(Self::Query),
            "analysis" => Ok(Self::Analysis),
            "validation" => Ok(Self::Validation),
            _ => Err(format!("unknown conversation type: {s}")),
        }
    }
}

/// How quickly the caller needs an answer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    /// Can wait
    Low,
    /// Regular processing
    #[default]
    Normal,
    /// Should be answered promptly
    High,
    /// Blocking an operation right now
    Critical,
}

impl Urgency {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::str::FromStr for Urgency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("unknown urgency: {s}")),
        }
    }
}

/// Impact of getting the decision wrong
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Negligible impact
    Low,
    /// Ordinary business impact
    #[default]
    Medium,
    /// Significant impact
    High,
    /// Irreversible or safety-relevant impact
    Critical,
}

impl Severity {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// A single agent's verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Go ahead
    Approved,
    /// Do not go ahead
    Rejected,
    /// Go ahead only if the attached conditions hold
    Conditional,
    /// The agent never answered
    #[serde(rename = "no-response")]
    NoResponse,
}

impl Decision {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Conditional => "conditional",
            Self::NoResponse => "no-response",
        }
    }

    /// Rank used to settle exact ties: the more cautious verdict wins.
    #[must_use]
    pub fn caution_rank(&self) -> u8 {
        match self {
            Self::Rejected => 3,
            Self::Conditional => 2,
            Self::Approved => 1,
            Self::NoResponse => 0,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "conditional" => Ok(Self::Conditional),
            "no-response" | "no_response" => Ok(Self::NoResponse),
            _ => Err(format!("unknown decision: {s}")),
        }
    }
}

/// Outcome recorded when a conversation is finalized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinalDecision {
    /// Agents approved
    Approved,
    /// Agents rejected
    Rejected,
    /// Agents approved with conditions
    Conditional,
    /// Nobody answered
    #[serde(rename = "no-response")]
    NoResponse,
    /// Handed to the human approval gate
    Escalated,
    /// No agent could be reached
    Failed,
    /// Stopped by an operator
    Stopped,
}

impl FinalDecision {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Conditional => "conditional",
            Self::NoResponse => "no-response",
            Self::Escalated => "escalated",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }

    /// Whether finalizing with this decision marks the conversation failed
    #[must_use]
    pub fn signals_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Stopped)
    }

    /// Terminal status implied by this decision
    #[must_use]
    pub fn terminal_status(&self) -> ConversationStatus {
        if self.signals_failure() {
            ConversationStatus::Failed
        } else {
            ConversationStatus::Completed
        }
    }
}

impl From<Decision> for FinalDecision {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approved => Self::Approved,
            Decision::Rejected => Self::Rejected,
            Decision::Conditional => Self::Conditional,
            Decision::NoResponse => Self::NoResponse,
        }
    }
}

impl std::fmt::Display for FinalDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FinalDecision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "escalated" => Ok(Self::Escalated),
            "failed" => Ok(Self::Failed),
            "stopped" => Ok(Self::Stopped),
            other => other
                .parse::<Decision>()
                .map(Self::from)
                .map_err(|_| format!("unknown final decision: {s}")),
        }
    }
}

/// One agent's contribution to a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Role of the agent that answered
    pub agent: String,
    /// Verdict
    pub decision: Decision,
    /// Free-form justification
    pub reasoning: String,
    /// Confidence in `0..=1`
    pub confidence: f64,
    /// When the response completed
    pub timestamp: DateTime<Utc>,
    /// Structured findings or recommendations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Set when the response stands in for a failed or timed-out invocation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResponse {
    /// Create a response; confidence is clamped to `0..=1`
    #[must_use]
    pub fn new(
        agent: impl Into<String>,
        decision: Decision,
        reasoning: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            agent: agent.into(),
            decision,
            reasoning: reasoning.into(),
            confidence: clamp_confidence(confidence),
            timestamp: crate::event::timestamp_now(),
            data: None,
            error: None,
        }
    }

    /// Response standing in for an invocation that raised an error
    #[must_use]
    pub fn invocation_failed(agent: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        let mut response = Self::new(
            agent,
            Decision::Rejected,
            format!("agent invocation failed: {error}"),
            0.0,
        );
        response.error = Some(error);
        response
    }

    /// Response standing in for an agent that did not answer in time
    #[must_use]
    pub fn timed_out(agent: impl Into<String>, after: std::time::Duration) -> Self {
        let mut response = Self::new(
            agent,
            Decision::NoResponse,
            format!("no response within {}ms", after.as_millis()),
            0.0,
        );
        response.error = Some("timeout".to_string());
        response
    }

    /// Attach structured data
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Override the completion timestamp
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Whether this is a synthetic response for a failed invocation
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// Whether a consensus outcome blocks the caller or only advises it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Enforcement {
    /// A rejection blocks the action
    #[default]
    Enforce,
    /// A rejection is surfaced as a warning only
    Advise,
}

/// Which reduction rule produced the proposed decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusRule {
    /// Only one agent was consulted
    SingleAgent,
    /// Every non-error response agreed
    Unanimous,
    /// A confident rejection overrode the others
    Veto,
    /// The most frequent decision won
    Majority,
    /// Tied decisions were settled by confidence
    ConfidenceTiebreak,
}

/// Link to the approval request that took over an escalated decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Escalation {
    /// Approval request ID
    pub approval_id: Uuid,
    /// Why the policy escalated
    pub reason: String,
}

/// Result of reducing agent responses to one outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolResult {
    /// Outcome the conversation is finalized with
    pub final_decision: FinalDecision,
    /// Decision reduced from the responses, before any escalation
    pub proposed_decision: Decision,
    /// All non-error responses share one decision
    pub consensus: bool,
    /// Rule that produced `proposed_decision`
    pub rule: ConsensusRule,
    /// Strictness requested by the caller's policy
    pub enforcement: Enforcement,
    /// Set when the outcome was handed to a human
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation: Option<Escalation>,
    /// Contributing responses, in completion order
    pub responses: Vec<AgentResponse>,
}

impl ProtocolResult {
    /// Whether the caller must not proceed
    #[must_use]
    pub fn is_blocking(&self) -> bool {
        self.enforcement == Enforcement::Enforce && self.final_decision == FinalDecision::Rejected
    }
}

/// What a caller asks the agents to decide on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequest {
    /// Question or proposed action
    pub prompt: String,
    /// Request kind
    #[serde(rename = "type", default)]
    pub kind: ConversationType,
    /// Opaque structured payload forwarded to agents
    #[serde(default)]
    pub context: serde_json::Value,
    /// Urgency
    #[serde(default)]
    pub urgency: Urgency,
    /// Severity
    #[serde(default)]
    pub severity: Severity,
    /// External correlation IDs
    #[serde(default)]
    pub workflow_ids: Vec<String>,
}

impl DecisionRequest {
    /// Create a request with default kind, urgency and severity
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            kind: ConversationType::default(),
            context: serde_json::json!({}),
            urgency: Urgency::default(),
            severity: Severity::default(),
            workflow_ids: Vec::new(),
        }
    }

    /// Set the request kind
    #[must_use]
    pub fn with_kind(mut self, kind: ConversationType) -> Self {
        self.kind = kind;
        self
    }

    /// Set the context payload
    #[must_use]
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    /// Set urgency
    #[must_use]
    pub fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = urgency;
        self
    }

    /// Set severity
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Add an external correlation ID
    #[must_use]
    pub fn with_workflow_id(mut self, id: impl Into<String>) -> Self {
        self.workflow_ids.push(id.into());
        self
    }
}

/// A decision-request lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique identifier (caller-supplied or generated)
    pub id: String,
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
    /// Current status
    pub status: ConversationStatus,
    /// When the conversation was opened
    pub started_at: DateTime<Utc>,
    /// When it was finalized; set iff status is terminal
    pub completed_at: Option<DateTime<Utc>>,
    /// Responses in completion order
    pub responses: Vec<AgentResponse>,
    /// Consensus outcome, if one was computed
    pub protocol_result: Option<ProtocolResult>,
    /// Outcome the conversation was finalized with
    pub final_decision: Option<FinalDecision>,
    /// External correlation IDs
    pub workflow_ids: Vec<String>,
}

impl Conversation {
    /// Open a conversation for a request
    #[must_use]
    pub fn new(id: impl Into<String>, request: &DecisionRequest, started_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            prompt: request.prompt.clone(),
            kind: request.kind,
            context: request.context.clone(),
            urgency: request.urgency,
            severity: request.severity,
            status: ConversationStatus::InProgress,
            started_at,
            completed_at: None,
            responses: Vec::new(),
            protocol_result: None,
            final_decision: None,
            workflow_ids: request.workflow_ids.clone(),
        }
    }

    /// The request this conversation was opened for
    #[must_use]
    pub fn request(&self) -> DecisionRequest {
        DecisionRequest {
            prompt: self.prompt.clone(),
            kind: self.kind,
            context: self.context.clone(),
            urgency: self.urgency,
            severity: self.severity,
            workflow_ids: self.workflow_ids.clone(),
        }
    }

    /// Check if the conversation is finalized
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Append a response; refused once the conversation is terminal
    pub fn push_response(&mut self, response: AgentResponse) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.responses.push(response);
        true
    }

    /// Move to the terminal status implied by `decision`.
    ///
    /// Returns false, leaving the conversation untouched, if it was already
    /// terminal.
    pub fn finish(
        &mut self,
        decision: FinalDecision,
        protocol_result: Option<ProtocolResult>,
        at: DateTime<Utc>,
    ) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = decision.terminal_status();
        self.completed_at = Some(at);
        self.final_decision = Some(decision);
        self.protocol_result = protocol_result;
        true
    }
}
