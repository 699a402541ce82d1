//! Cost records and statistics types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// One priced agent call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    /// Record ID
    pub id: Uuid,
    /// Agent role that was invoked
    pub agent: String,
    /// Model the agent used
    pub model: String,
    /// Tokens consumed
    pub tokens_used: u64,
    /// Spend in USD
    pub cost_usd: f64,
    /// Conversation the call served, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// When the call was recorded
    pub created_at: DateTime<Utc>,
}

impl CostRecord {
    /// Create a record timestamped now
    #[must_use]
    pub fn new(
        agent: impl Into<String>,
        model: impl Into<String>,
        tokens_used: u64,
        cost_usd: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent: agent.into(),
            model: model.into(),
            tokens_used,
            cost_usd: if cost_usd.is_finite() { cost_usd.max(0.0) } else { 0.0 },
            conversation_id: None,
            created_at: conclave_replay::timestamp_now(),
        }
    }

    /// Link the record to a conversation
    #[must_use]
    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// Override the timestamp
    #[must_use]
    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// Per-agent spend over the weekly window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSpend {
    /// Number of calls
    pub requests: u64,
    /// Tokens consumed
    pub tokens: u64,
    /// Spend in USD
    pub cost_usd: f64,
}

/// Rolling spend totals
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostStats {
    /// Spend over the last 24 hours
    pub daily_total: f64,
    /// Spend over the last 7 days
    pub weekly_total: f64,
    /// Configured daily cap
    pub daily_cap: f64,
    /// Configured weekly cap
    pub weekly_cap: f64,
    /// Daily spend is above the cap
    pub daily_exceeded: bool,
    /// Weekly spend is above the cap
    pub weekly_exceeded: bool,
    /// Calls over the last 24 hours
    pub daily_requests: u64,
    /// Calls over the last 7 days
    pub weekly_requests: u64,
    /// Weekly breakdown by agent
    #[serde(default)]
    pub by_agent: HashMap<String, AgentSpend>,
}

impl CostStats {
    /// Whether any cap is exceeded
    #[must_use]
    pub fn over_budget(&self) -> bool {
        self.daily_exceeded || self.weekly_exceeded
    }
}
