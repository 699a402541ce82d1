//! Configuration loading
//!
//! Handles loading configuration from embedded defaults, files, and environment.

use super::config::AppConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};

/// Embedded default configuration (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    let config = Config::builder()
        // 1. Embedded defaults
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. External overrides (optional)
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            File::with_name(&format!(
                "config/{}",
                std::env::var("CONCLAVE_ENV").unwrap_or_else(|_| "development".to_string())
            ))
            .required(false),
        )
        .add_source(File::with_name("config/local").required(false))
        // 3. Environment variables, CONCLAVE_DISPATCH__AGENT_TIMEOUT_SECS style
        .add_source(
            Environment::with_prefix("CONCLAVE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_core::{Enforcement, Severity};

    fn embedded_config() -> Result<AppConfig> {
        Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    #[test]
    fn test_embedded_defaults_match_core_defaults() {
        let config = embedded_config().unwrap();
        let core = config.core();

        assert_eq!(core.consensus.veto_threshold, 0.9);
        assert_eq!(core.consensus.enforcement, Enforcement::Enforce);
        assert_eq!(
            core.consensus.escalation.non_unanimous_severities,
            vec![Severity::Critical]
        );
        assert_eq!(core.dispatch.agent_timeout_secs, 30);
        assert_eq!(core.dispatch.max_parallel, 8);
        assert_eq!(core.approval.default_ttl_secs, 3600);
        assert_eq!(core.budget.daily_cap_usd, 50.0);
        assert_eq!(core.budget.weekly_cap_usd, 250.0);
        assert!(config.agents.is_empty());
        assert!(core.validate().is_ok());
    }
}
