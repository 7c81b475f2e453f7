use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_clarification_turns: {0}. Must be between 1 and 10")]
    InvalidClarificationTurns(u32),

    #[error("Invalid max_auto_replans: {0}. Must be at most 10")]
    InvalidAutoReplans(u32),

    #[error("Default city cannot be empty")]
    EmptyDefaultCity,

    #[error("Invalid second_factor_threshold: {0}. Must be positive")]
    InvalidSecondFactorThreshold(u32),

    #[error("Invalid session ttl_secs: {0}. Must be at least 60")]
    InvalidSessionTtl(u64),

    #[error("Invalid max_messages: {0}. Must be at least 1")]
    InvalidMaxMessages(usize),

    #[error("Invalid run_history: {0}. Must be at least 1")]
    InvalidRunHistory(usize),

    #[error("Invalid telemetry max_entries: {0}. Must be at least 1")]
    InvalidTelemetryEntries(usize),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .concierge/config.yaml (project config)
    /// 3. .concierge/local.yaml (local overrides, optional)
    /// 4. Environment variables (CONCIERGE_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".concierge/config.yaml"))
            .merge(Yaml::file(".concierge/local.yaml"))
            .merge(Env::prefixed("CONCIERGE_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring env overrides
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("CONCIERGE_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let orchestrator = &config.orchestrator;
        if orchestrator.max_clarification_turns == 0 || orchestrator.max_clarification_turns > 10 {
            return Err(ConfigError::InvalidClarificationTurns(
                orchestrator.max_clarification_turns,
            ));
        }

        if orchestrator.max_auto_replans > 10 {
            return Err(ConfigError::InvalidAutoReplans(orchestrator.max_auto_replans));
        }

        if orchestrator.default_city.trim().is_empty() {
            return Err(ConfigError::EmptyDefaultCity);
        }

        if orchestrator.second_factor_threshold == 0 {
            return Err(ConfigError::InvalidSecondFactorThreshold(
                orchestrator.second_factor_threshold,
            ));
        }

        if config.session.ttl_secs < 60 {
            return Err(ConfigError::InvalidSessionTtl(config.session.ttl_secs));
        }

        if config.session.max_messages == 0 {
            return Err(ConfigError::InvalidMaxMessages(config.session.max_messages));
        }

        if config.session.run_history == 0 {
            return Err(ConfigError::InvalidRunHistory(config.session.run_history));
        }

        if config.telemetry.max_entries == 0 {
            return Err(ConfigError::InvalidTelemetryEntries(
                config.telemetry.max_entries,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}
