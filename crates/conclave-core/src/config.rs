//! Core configuration
//!
//! Every tunable the engine reads is a named input with a documented default:
//! - `ConsensusConfig` for veto threshold, enforcement and escalation policy
//! - `DispatchConfig` for per-agent timeout and fan-out width
//! - `ApprovalConfig` for approval request lifetime
//! - `BudgetConfig` for advisory cost caps and model pricing

use crate::error::{Error, Result};
use conclave_replay::{Enforcement, Severity};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Default confidence at which a single rejection vetoes the group
pub const DEFAULT_VETO_THRESHOLD: f64 = 0.9;

/// Default per-agent timeout in seconds
pub const DEFAULT_AGENT_TIMEOUT_SECS: u64 = 30;

/// Longest lifetime an approval request may be given (ten years)
pub const MAX_APPROVAL_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Consensus settings
    #[serde(default)]
    pub consensus: ConsensusConfig,
    /// Dispatch settings
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Approval gate settings
    #[serde(default)]
    pub approval: ApprovalConfig,
    /// Budget settings
    #[serde(default)]
    pub budget: BudgetConfig,
}

impl CoreConfig {
    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let threshold = self.consensus.veto_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(invalid(
                "consensus.veto_threshold",
                format!("must be within 0..=1, got {threshold}"),
            ));
        }
        if self.dispatch.agent_timeout_secs == 0 {
            return Err(invalid("dispatch.agent_timeout_secs", "must be positive"));
        }
        if self.dispatch.max_parallel == 0 {
            return Err(invalid("dispatch.max_parallel", "must be positive"));
        }
        let ttl = self.approval.default_ttl_secs;
        if ttl <= 0 || ttl > MAX_APPROVAL_TTL_SECS {
            return Err(invalid(
                "approval.default_ttl_secs",
                format!("must be within 1..={MAX_APPROVAL_TTL_SECS}, got {ttl}"),
            ));
        }
        for (field, cap) in [
            ("budget.daily_cap_usd", self.budget.daily_cap_usd),
            ("budget.weekly_cap_usd", self.budget.weekly_cap_usd),
        ] {
            if !cap.is_finite() || cap < 0.0 {
                return Err(invalid(field, format!("must be a non-negative amount, got {cap}")));
            }
        }
        if let Some((model, price)) = self
            .budget
            .pricing
            .iter()
            .find(|(_, price)| !price.is_finite() || **price < 0.0)
        {
            return Err(invalid(
                "budget.pricing",
                format!("price for {model} must be non-negative, got {price}"),
            ));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: impl Into<String>) -> Error {
    Error::InvalidConfig {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Consensus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// A rejection at or above this confidence vetoes the group
    #[serde(default = "default_veto_threshold")]
    pub veto_threshold: f64,
    /// Whether a rejected outcome blocks the caller
    #[serde(default)]
    pub enforcement: Enforcement,
    /// When an outcome is handed to a human instead of auto-resolved
    #[serde(default)]
    pub escalation: EscalationPolicy,
}

fn default_veto_threshold() -> f64 {
    DEFAULT_VETO_THRESHOLD
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            veto_threshold: default_veto_threshold(),
            enforcement: Enforcement::default(),
            escalation: EscalationPolicy::default(),
        }
    }
}

/// Severity-driven escalation policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationPolicy {
    /// Severities escalated whenever the vote is not unanimous
    #[serde(default = "default_non_unanimous_severities")]
    pub non_unanimous_severities: Vec<Severity>,
    /// Severities escalated regardless of the vote
    #[serde(default)]
    pub always_severities: Vec<Severity>,
}

fn default_non_unanimous_severities() -> Vec<Severity> {
    vec![Severity::Critical]
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            non_unanimous_severities: default_non_unanimous_severities(),
            always_severities: Vec::new(),
        }
    }
}

impl EscalationPolicy {
    /// Policy that never escalates
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            non_unanimous_severities: Vec::new(),
            always_severities: Vec::new(),
        }
    }
}

/// Dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Bounded wait for each agent invocation
    #[serde(default = "default_agent_timeout_secs")]
    pub agent_timeout_secs: u64,
    /// Maximum concurrent invocations per conversation
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

fn default_agent_timeout_secs() -> u64 {
    DEFAULT_AGENT_TIMEOUT_SECS
}

fn default_max_parallel() -> usize {
    8
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            agent_timeout_secs: default_agent_timeout_secs(),
            max_parallel: default_max_parallel(),
        }
    }
}

impl DispatchConfig {
    /// Per-agent timeout as a `Duration`
    #[must_use]
    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_timeout_secs)
    }
}

/// Approval gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Lifetime of a request when the caller gives none
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: i64,
}

fn default_ttl_secs() -> i64 {
    3600
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl_secs(),
        }
    }
}

/// Budget configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Advisory cap over the rolling 24h window
    #[serde(default = "default_daily_cap")]
    pub daily_cap_usd: f64,
    /// Advisory cap over the rolling 7d window
    #[serde(default = "default_weekly_cap")]
    pub weekly_cap_usd: f64,
    /// USD per 1K tokens, keyed by model
    #[serde(default)]
    pub pricing: HashMap<String, f64>,
}

fn default_daily_cap() -> f64 {
    50.0
}

fn default_weekly_cap() -> f64 {
    250.0
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            daily_cap_usd: default_daily_cap(),
            weekly_cap_usd: default_weekly_cap(),
            pricing: HashMap::new(),
        }
    }
}
