use serde::{Deserialize, Serialize};

/// Main configuration structure for Concierge
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Orchestration policy knobs
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Session retention configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Transition/tool telemetry configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            session: SessionConfig::default(),
            telemetry: TelemetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Orchestration policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OrchestratorConfig {
    /// Asking turns allowed before defaults are assumed
    #[serde(default = "default_max_clarification_turns")]
    pub max_clarification_turns: u32,

    /// Automatic replans allowed before offering human handoff
    #[serde(default = "default_max_auto_replans")]
    pub max_auto_replans: u32,

    /// City assumed when the user never names one
    #[serde(default = "default_city")]
    pub default_city: String,

    /// Pacing delay between execution steps
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,

    /// Simulated latency of a planning pass
    #[serde(default = "default_planning_delay_ms")]
    pub planning_delay_ms: u64,

    /// Payment amount above which a second factor is required
    #[serde(default = "default_second_factor_threshold")]
    pub second_factor_threshold: u32,
}

const fn default_max_clarification_turns() -> u32 {
    2
}

const fn default_max_auto_replans() -> u32 {
    2
}

fn default_city() -> String {
    "Shanghai".to_string()
}

const fn default_step_delay_ms() -> u64 {
    350
}

const fn default_planning_delay_ms() -> u64 {
    120
}

const fn default_second_factor_threshold() -> u32 {
    500
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_clarification_turns: default_max_clarification_turns(),
            max_auto_replans: default_max_auto_replans(),
            default_city: default_city(),
            step_delay_ms: default_step_delay_ms(),
            planning_delay_ms: default_planning_delay_ms(),
            second_factor_threshold: default_second_factor_threshold(),
        }
    }
}

/// Session retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SessionConfig {
    /// Seconds a stored conversation survives without activity
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Most recent utterances kept per conversation
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Completed runs kept in history
    #[serde(default = "default_run_history")]
    pub run_history: usize,
}

const fn default_ttl_secs() -> u64 {
    4 * 60 * 60
}

const fn default_max_messages() -> usize {
    20
}

const fn default_run_history() -> usize {
    10
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_messages: default_max_messages(),
            run_history: default_run_history(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TelemetryConfig {
    /// Entries kept in the per-conversation transition log
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

const fn default_max_entries() -> usize {
    180
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}
