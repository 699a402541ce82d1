//! Application configuration types

use conclave_core::{
    AgentEndpointConfig, ApprovalConfig, BudgetConfig, ConsensusConfig, CoreConfig, DispatchConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding conclave.db
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub consensus: ConsensusConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub approval: ApprovalConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    /// Remote agents by role
    #[serde(default)]
    pub agents: HashMap<String, AgentEndpointConfig>,
}

impl AppConfig {
    /// Engine settings
    pub fn core(&self) -> CoreConfig {
        CoreConfig {
            consensus: self.consensus.clone(),
            dispatch: self.dispatch.clone(),
            approval: self.approval.clone(),
            budget: self.budget.clone(),
        }
    }

    /// Path of the SQLite database
    pub fn db_path(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => expand_home(dir).join("conclave.db"),
            None => conclave_replay::default_db_path(),
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_path() {
        let config = AppConfig {
            data_dir: Some("/tmp/conclave-test".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.db_path(),
            PathBuf::from("/tmp/conclave-test/conclave.db")
        );

        let config = AppConfig::default();
        assert!(config.db_path().ends_with(".conclave/conclave.db"));
    }
}
