pub mod candidate;
pub mod config;
pub mod conversation;
pub mod plan;
pub mod run;
pub mod slots;

pub use candidate::{Candidate, CatalogRow, CatalogSet, RiskLevel};
pub use config::{Config, LoggingConfig, OrchestratorConfig, SessionConfig, TelemetryConfig};
pub use conversation::{
    ContextLimits, ConversationContext, ConversationMode, LoopStage, NextStep, TelemetryLog,
    TransitionRecord,
};
pub use plan::{OptionKey, Plan, PlanOption};
pub use run::{
    Failure, FailureCode, ProofRecord, RouteInfo, Run, RunResult, RunStatus, Step, StepKey,
    StepStatus, ToolOutput, TrafficLevel, step_skeleton,
};
pub use slots::{
    Budget, BudgetTier, Intent, SlotEvidence, SlotKey, SlotRecord, TimeConstraint,
    normalize_slots_in_place, summarize_slots,
};
