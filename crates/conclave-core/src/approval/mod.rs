//! Human Approval Gate
//!
//! A workflow for decisions that must not be fully automated, independent of
//! conversation consensus. Requests start pending and end approved, rejected
//! or cancelled by an explicit call, or expired once `expiry_at` passes.
//!
//! Expiry is evaluated when a request is read: the stored row keeps its
//! `pending` status and every reader folds it into `expired`. No background
//! sweep rewrites it.

mod gate;
mod request;
mod store;


pub use gate::ApprovalGate;
pub use request::{ApprovalCounts, ApprovalFilter, ApprovalRequest, ApprovalStatus, Verdict};
pub use store::{ApprovalStore, MemoryApprovalStore, SqliteApprovalStore};
