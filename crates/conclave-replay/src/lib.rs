//! Conclave Replay - Decision log and recovery
//!
//! This crate provides the durable backbone of Conclave:
//! - Conversation: The decision-request data model shared by every component
//! - Event: Append-only log events and their actions
//! - Store: Event persistence (SQLite and in-memory)
//! - Replayer: Deterministic reconstruction of conversations from the log

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod conversation;
pub mod error;
pub mod event;
pub mod replayer;
pub mod store;

pub use conversation::{
    AgentResponse, ConsensusRule, Conversation, ConversationStatus, ConversationType, Decision,
    DecisionRequest, Enforcement, Escalation, FinalDecision, ProtocolResult, Severity, Urgency,
};
pub use error::{Error, Result};
pub use event::{timestamp_now, EventAction, LogEvent, LogLevel};
pub use replayer::{ConversationReplayer, Reconstruction, ReconstructionGap};
pub use store::{
    default_data_dir, default_db_path, EventStore, EventStoreTrait, MemoryEventStore,
};
