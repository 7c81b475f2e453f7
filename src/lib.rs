//! Concierge - conversational task orchestrator
//!
//! Concierge turns free-form requests ("hotpot in Nanshan tonight for two,
//! no queue") into structured slots, asks a bounded number of clarifying
//! questions, builds a two-lane plan (main and backup) over a simulated
//! catalog, executes the chosen lane as a sequence of tool steps, and
//! replans automatically when a run fails.
//!
//! Every simulated decision is derived from a seed built from the
//! conversation id and slot state, so the same conversation always
//! produces the same plan and the same failures.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): slot, plan, run and conversation models, ports and errors
//! - **Service Layer** (`services`): extraction, clarification, planning, execution, replanning, orchestration
//! - **Infrastructure Layer** (`infrastructure`): catalog, store, clock, telemetry, config, logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use concierge::{Config, ConversationOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let orchestrator = ConversationOrchestrator::with_defaults(&Config::default())?;
//!     let turn = orchestrator
//!         .submit_utterance("demo", "hotpot in Shenzhen Nanshan tonight for 2, mid budget")
//!         .await?;
//!     println!("{}", turn.reply);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Config, ConversationContext, ConversationMode, Failure, FailureCode, Intent, LoggingConfig,
    OptionKey, Plan, PlanOption, Run, RunStatus, SlotEvidence, SlotKey, SlotRecord,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{ConversationOrchestrator, EventBus, OrchestratorDeps, OrchestratorEvent, TurnOutcome};
