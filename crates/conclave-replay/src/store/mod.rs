//! Store - Event persistence
//!
//! This module provides the storage layer for the decision log.
//! It uses sqlx for async SQLite access (embedded, no server required) and
//! offers an in-memory implementation behind the same trait.

mod event_store;
mod helpers;
mod memory;
mod traits;

#[cfg(test)]
mod tests;

pub use event_store::EventStore;
pub use helpers::{default_data_dir, default_db_path, format_timestamp, parse_timestamp};
pub use memory::MemoryEventStore;
pub use traits::EventStoreTrait;
