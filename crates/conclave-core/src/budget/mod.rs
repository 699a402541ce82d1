//! Cost/Budget Guard - Advisory spend tracking
//!
//! Every agent call that reports usage is appended as a `CostRecord`.
//! Totals are computed over rolling 24h and 7d windows by range query.
//! Caps are advisory: exceeding one is logged and reported in the stats,
//! it never blocks a dispatch.
//!
//! # Module Structure
//!
//! - `record`: Cost records and statistics types
//! - `store`: `CostStore` trait with in-memory and SQLite implementations
//! - `guard`: CostGuard implementation

mod guard;
mod record;
mod store;

#[cfg(test)]
mod tests;

pub use guard::CostGuard;
pub use record::{AgentSpend, CostRecord, CostStats};
pub use store::{CostStore, MemoryCostStore, SqliteCostStore};
