//! Service layer: the conversational pipeline.
//!
//! Leaves first: deterministic draws, slot extraction, clarification,
//! planning and tools, execution, replanning, mode transitions, and the
//! orchestrator that ties them together.

pub mod clarification;
pub mod deterministic;
pub mod event_bus;
pub mod execution_engine;
pub mod orchestrator;
pub mod plan_builder;
pub mod replan;
pub mod slot_extractor;
pub mod state_machine;
pub mod tool_pipeline;

pub use clarification::{ClarificationDecision, ClarificationPolicy};
pub use event_bus::{EventBus, EventBusConfig, EventEnvelope, OrchestratorEvent};
pub use execution_engine::{ExecutionEngine, ExecutionRequest};
pub use orchestrator::{ConversationOrchestrator, OrchestratorDeps, TurnOutcome};
pub use plan_builder::{PlanRequest, build_plan_from_slots};
pub use replan::{ReplanOutcome, auto_replan_after_failure};
pub use slot_extractor::{Extraction, SlotExtractor};
pub use state_machine::{Transition, TransitionHook, request_transition};
