//! Conclave Core - Decision orchestration engine
//!
//! This crate turns a decision request into one final decision:
//! - Registry: Live conversation state with log-replay fallback
//! - Dispatcher: Concurrent, failure-isolated agent fan-out
//! - Consensus: Veto, majority and confidence tiebreak reduction
//! - Approval: Human approval gate with lazy expiry
//! - Budget: Advisory cost tracking over rolling windows
//! - Service: The facade the surrounding application talks to

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod approval;
pub mod budget;
pub mod config;
pub mod consensus;
pub mod dispatcher;
pub mod error;
pub mod registry;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use approval::{
    ApprovalCounts, ApprovalFilter, ApprovalGate, ApprovalRequest, ApprovalStatus, ApprovalStore,
    MemoryApprovalStore, SqliteApprovalStore, Verdict,
};
pub use budget::{CostGuard, CostRecord, CostStats, CostStore, MemoryCostStore, SqliteCostStore};
pub use config::{
    ApprovalConfig, BudgetConfig, ConsensusConfig, CoreConfig, DispatchConfig, EscalationPolicy,
    MAX_APPROVAL_TTL_SECS,
};
pub use consensus::ConsensusEvaluator;
pub use dispatcher::{
    AgentCall, AgentEndpointConfig, AgentError, AgentInvoker, AgentOutput, AgentUsage, Dispatcher,
    HttpAgentInvoker,
};
pub use error::{Error, Result};
pub use registry::{
    AppendOutcome, ConversationRegistry, ConversationRepository, LogReplayRepository,
    MemoryRepository, ReadThrough,
};
pub use service::{ConversationOutcome, DecisionService, ServiceStores};

// Re-export the shared data model
pub use conclave_replay::{
    AgentResponse, ConsensusRule, Conversation, ConversationStatus, ConversationType, Decision,
    DecisionRequest, Enforcement, Escalation, FinalDecision, ProtocolResult, Severity, Urgency,
};
