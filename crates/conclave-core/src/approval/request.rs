//! Approval request types

use chrono::{DateTime, Duration, Utc};
use crate::config::MAX_APPROVAL_TTL_SECS;
use conclave_replay::timestamp_now;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of an approval request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    /// Waiting for a human
    Pending,
    /// A human approved
    Approved,
    /// A human rejected
    Rejected,
    /// Nobody answered before `expiry_at`
    Expired,
    /// Withdrawn before anyone answered
    Cancelled,
}

impl ApprovalStatus {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "expired" => Ok(Self::Expired),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            _ => Err(format!("unknown approval status: {s}")),
        }
    }
}

/// A human's answer to a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Allow the action
    Approved,
    /// Deny the action
    Rejected,
}

impl From<Verdict> for ApprovalStatus {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Approved => Self::Approved,
            Verdict::Rejected => Self::Rejected,
        }
    }
}

impl std::str::FromStr for Verdict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" | "approve" => Ok(Self::Approved),
            "rejected" | "reject" => Ok(Self::Rejected),
            _ => Err(format!("unknown verdict: {s}")),
        }
    }
}

/// An approval request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Unique request ID
    pub id: Uuid,
    /// Who asked (agent role or `consensus` for escalations)
    pub agent: String,
    /// Action awaiting sign-off
    pub action: String,
    /// Why sign-off is needed
    pub reasoning: String,
    /// Supporting payload
    pub data: serde_json::Value,
    /// Status
    pub status: ApprovalStatus,
    /// Conversation that escalated, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// When the request was created
    pub created_at: DateTime<Utc>,
    /// When the request stops accepting answers
    pub expiry_at: DateTime<Utc>,
    /// When a human answered or the request was cancelled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
}

impl ApprovalRequest {
    /// Create a pending request expiring after `ttl`.
    ///
    /// `ttl` is clamped to `MAX_APPROVAL_TTL_SECS` either way.
    #[must_use]
    pub fn new(
        agent: impl Into<String>,
        action: impl Into<String>,
        reasoning: impl Into<String>,
        data: serde_json::Value,
        ttl: Duration,
    ) -> Self {
        let now = timestamp_now();
        let ttl = ttl.clamp(-max_ttl(), max_ttl());
        Self {
            id: Uuid::new_v4(),
            agent: agent.into(),
            action: action.into(),
            reasoning: reasoning.into(),
            data,
            status: ApprovalStatus::Pending,
            conversation_id: None,
            created_at: now,
            expiry_at: now + ttl,
            decided_at: None,
        }
    }

    /// Link the request to a conversation
    #[must_use]
    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// Check if the request has expired at `now`
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ApprovalStatus::Pending && now >= self.expiry_at
    }

    /// Status as seen by a reader at `now`
    #[must_use]
    pub fn effective_status_at(&self, now: DateTime<Utc>) -> ApprovalStatus {
        if self.is_expired_at(now) {
            ApprovalStatus::Expired
        } else {
            self.status
        }
    }

    /// Status as seen by a reader now
    #[must_use]
    pub fn effective_status(&self) -> ApprovalStatus {
        self.effective_status_at(Utc::now())
    }

    /// Check if the request can still be answered
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.effective_status() == ApprovalStatus::Pending
    }

    /// Copy carrying the effective status at `now`
    #[must_use]
    pub fn seen_at(&self, now: DateTime<Utc>) -> Self {
        let mut view = self.clone();
        view.status = self.effective_status_at(now);
        view
    }
}

/// Longest lifetime a request may be given
pub(crate) fn max_ttl() -> Duration {
    Duration::seconds(MAX_APPROVAL_TTL_SECS)
}

/// Selects approval requests
#[derive(Debug, Clone, Default)]
pub struct ApprovalFilter {
    /// Effective statuses to include; empty means any
    pub statuses: Vec<ApprovalStatus>,
    /// Requesting agent
    pub agent: Option<String>,
    /// Linked conversation
    pub conversation_id: Option<String>,
    /// Created at or after
    pub created_after: Option<DateTime<Utc>>,
    /// Created strictly before
    pub created_before: Option<DateTime<Utc>>,
}

impl ApprovalFilter {
    /// Match every request
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests still awaiting a human, including lazily expired ones
    #[must_use]
    pub fn pending_or_expired() -> Self {
        Self::new()
            .with_status(ApprovalStatus::Pending)
            .with_status(ApprovalStatus::Expired)
    }

    /// Include an effective status
    #[must_use]
    pub fn with_status(mut self, status: ApprovalStatus) -> Self {
        if !self.statuses.contains(&status) {
            self.statuses.push(status);
        }
        self
    }

    /// Restrict to one agent
    #[must_use]
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    /// Restrict to one conversation
    #[must_use]
    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// Restrict to a creation window
    #[must_use]
    pub fn created_between(
        mut self,
        after: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
    ) -> Self {
        self.created_after = after;
        self.created_before = before;
        self
    }

    /// Whether an effective status passes the filter
    #[must_use]
    pub fn accepts_status(&self, status: ApprovalStatus) -> bool {
        self.statuses.is_empty() || self.statuses.contains(&status)
    }

    /// Whether a request passes the non-status criteria
    #[must_use]
    pub fn accepts(&self, request: &ApprovalRequest) -> bool {
        self.agent.as_ref().is_none_or(|a| *a == request.agent)
            && self
                .conversation_id
                .as_ref()
                .is_none_or(|c| request.conversation_id.as_ref() == Some(c))
            && self.created_after.is_none_or(|t| request.created_at >= t)
            && self.created_before.is_none_or(|t| request.created_at < t)
    }
}

/// Requests per effective status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalCounts {
    /// Still answerable
    pub pending: usize,
    /// Pending rows past their expiry
    pub expired: usize,
    /// Approved
    pub approved: usize,
    /// Rejected
    pub rejected: usize,
    /// Cancelled
    pub cancelled: usize,
}

impl ApprovalCounts {
    /// Count one request
    pub fn add(&mut self, status: ApprovalStatus) {
        match status {
            ApprovalStatus::Pending => self.pending += 1,
            ApprovalStatus::Expired => self.expired += 1,
            ApprovalStatus::Approved => self.approved += 1,
            ApprovalStatus::Rejected => self.rejected += 1,
            ApprovalStatus::Cancelled => self.cancelled += 1,
        }
    }

    /// Pending plus expired
    #[must_use]
    pub fn pending_or_expired(&self) -> usize {
        self.pending + self.expired
    }

    /// All counted requests
    #[must_use]
    pub fn total(&self) -> usize {
        self.pending + self.expired + self.approved + self.rejected + self.cancelled
    }
}
