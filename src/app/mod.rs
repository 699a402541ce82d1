//! Application wiring
//!
//! Loads configuration and builds the decision service over the SQLite store.

pub mod config;
pub mod loader;

pub use config::AppConfig;
pub use loader::load_config;

use anyhow::{Context, Result};
use conclave_core::{DecisionService, HttpAgentInvoker, ServiceStores};
use conclave_replay::EventStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Open the database and start the service
pub async fn open_service(config: &AppConfig) -> Result<DecisionService> {
    let db_path = config.db_path();
    let events = EventStore::from_path(&db_path)
        .await
        .with_context(|| format!("Failed to open {}", db_path.display()))?;
    let stores = ServiceStores::sqlite(events)
        .await
        .context("Failed to prepare approval and cost tables")?;

    if config.agents.is_empty() {
        warn!("No agents configured; set agents.<role>.endpoint to dispatch requests");
    }
    let invoker = HttpAgentInvoker::new(config.agents.clone());
    debug!(roles = ?invoker.roles().collect::<Vec<_>>(), "Agent endpoints loaded");

    DecisionService::init(config.core(), stores, Arc::new(invoker))
        .context("Failed to initialize decision service")
}
