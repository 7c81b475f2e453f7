//! Runs a plan option step by step.
//!
//! Steps execute strictly in order. Each step marks itself running, invokes
//! its tool, attaches the raw tool output and threads the resolved candidate
//! and route into later steps. A fault derived from the seed (or forced by
//! the caller) is injected at the first step able to fail with that code.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::domain::models::{
    Candidate, Failure, FailureCode, OptionKey, PlanOption, RouteInfo, Run, RunResult, RunStatus,
    SlotRecord, StepKey, StepStatus, ToolOutput, step_skeleton,
};
use crate::domain::ports::{CatalogSource, Clock, TelemetryEvent, TelemetrySink};
use crate::infrastructure::catalog::is_dense_area;
use crate::services::deterministic::{seeded_chance, stable_hash32};
use crate::services::event_bus::{EventBus, OrchestratorEvent};
use crate::services::plan_builder::slot_seed;
use crate::services::tool_pipeline::{check_constraints, generate_proof, reserve, route, search_candidates};

/// Chance that a low-budget run overflows at pricing time.
const LOW_BUDGET_OVERFLOW_CHANCE: f64 = 0.36;

/// Failure code a run of `option` is destined to hit, if any.
///
/// The queue stress case (main lane, `no_queue`, dense area, queue not yet
/// relaxed) always fails with `queue_too_long`.
pub fn derive_deterministic_failure_code(
    option: &PlanOption,
    slots: &SlotRecord,
    seed: &str,
) -> Option<FailureCode> {
    let dense = slots.area.as_deref().is_some_and(is_dense_area);
    if option.key == OptionKey::Main
        && slots.has_preference("no_queue")
        && dense
        && !slots.has_preference("queue_flexible_after_fail")
    {
        return Some(FailureCode::QueueTooLong);
    }

    let lane = option.key.as_str();
    if slots.budget.is_some_and(|b| b.is_low())
        && seeded_chance(seed, &format!("{lane}|budget_overflow"), LOW_BUDGET_OVERFLOW_CHANCE)
    {
        return Some(FailureCode::BudgetOverflow);
    }

    let resource_chance = match option.key {
        OptionKey::Main => 0.06,
        OptionKey::Backup => 0.02,
    };
    seeded_chance(seed, &format!("{lane}|resource_unavailable"), resource_chance)
        .then_some(FailureCode::ResourceUnavailable)
}

/// Whether a fault with `code` may surface at `step`.
pub fn step_can_fail_with_code(step: StepKey, code: FailureCode) -> bool {
    match code {
        FailureCode::ResourceUnavailable => matches!(step, StepKey::Query | StepKey::Queue | StepKey::Lock),
        FailureCode::BudgetOverflow => matches!(step, StepKey::Filter | StepKey::Validate | StepKey::Pay),
        FailureCode::QueueTooLong => matches!(step, StepKey::Queue | StepKey::Filter | StepKey::Validate),
        FailureCode::SecondFactorRejected | FailureCode::SecondFactorFailed => step == StepKey::Pay,
        FailureCode::UserCancelled => false,
    }
}

/// Inputs for one run.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub conversation_id: String,
    pub run_id: String,
    pub option: PlanOption,
    pub slots: SlotRecord,
    pub force_failure: bool,
    /// Answer to the payment second-factor challenge, if one was given.
    pub second_factor: Option<bool>,
}

/// State threaded between the steps of one run.
#[derive(Debug, Default)]
struct StepContext {
    candidate: Option<Candidate>,
    route: Option<RouteInfo>,
    proof_id: Option<String>,
    pending_fault: Option<FailureCode>,
}

/// Result of a single tool invocation.
#[derive(Debug)]
struct StepOutcome {
    output: ToolOutput,
    failure: Option<FailureCode>,
}

impl StepOutcome {
    fn ok(output: ToolOutput) -> Self {
        Self { output, failure: None }
    }

    fn failed(output: ToolOutput, code: FailureCode) -> Self {
        Self {
            output,
            failure: Some(code),
        }
    }
}

/// Executes plan options against the tool pipeline.
pub struct ExecutionEngine {
    catalog: Arc<dyn CatalogSource>,
    clock: Arc<dyn Clock>,
    telemetry: Arc<dyn TelemetrySink>,
    event_bus: Arc<EventBus>,
    step_delay: Duration,
    second_factor_threshold: u32,
}

impl ExecutionEngine {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn TelemetrySink>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            catalog,
            clock,
            telemetry,
            event_bus,
            step_delay: Duration::from_millis(350),
            second_factor_threshold: 500,
        }
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    pub fn with_second_factor_threshold(mut self, threshold: u32) -> Self {
        self.second_factor_threshold = threshold;
        self
    }

    /// Execute every step of `request.option` and return the finished run.
    ///
    /// A failed run has exactly one failed step; the steps after it stay queued.
    #[instrument(skip(self, request), fields(conversation_id = %request.conversation_id, run_id = %request.run_id, option = %request.option.key))]
    pub async fn execute(&self, request: &ExecutionRequest) -> Run {
        let plan_seed = slot_seed(&request.conversation_id, &request.slots);
        let run_seed = format!("{plan_seed}|{}", request.run_id);

        let derived = derive_deterministic_failure_code(&request.option, &request.slots, &run_seed);
        let planned_fault = if request.force_failure {
            Some(derived.unwrap_or(FailureCode::ResourceUnavailable))
        } else {
            derived
        };

        let skeleton = step_skeleton(request.option.intent);
        let mut run = Run::new(request.run_id.clone(), request.option.key, skeleton, self.clock.now());
        run.status = RunStatus::Running;

        let mut state = StepContext {
            pending_fault: planned_fault,
            ..Default::default()
        };

        info!(steps = skeleton.len(), ?planned_fault, "Run started");

        for index in 0..run.steps.len() {
            let key = run.steps[index].key;
            run.steps[index].status = StepStatus::Running;
            self.event_bus.publish(
                &request.conversation_id,
                OrchestratorEvent::StepStarted {
                    run_id: run.id.clone(),
                    step: key,
                },
            );

            if !self.step_delay.is_zero() {
                self.clock.sleep(self.step_delay).await;
            }

            let outcome = match state.pending_fault {
                Some(code) if step_can_fail_with_code(key, code) => {
                    state.pending_fault = None;
                    StepOutcome::failed(ToolOutput::Fault { code }, code)
                }
                _ => self.run_step_tool(key, request, &plan_seed, &run_seed, &mut state),
            };

            self.emit_tool_invocation(request, key, &outcome);
            run.steps[index].output = Some(outcome.output);

            if let Some(code) = outcome.failure {
                run.steps[index].status = StepStatus::Failed;
                run.status = RunStatus::Failed;
                run.failure = Some(Failure::new(code));
                run.finished_at = Some(self.clock.now());
                warn!(step = %key, code = %code, "Run step failed");
                self.event_bus.publish(
                    &request.conversation_id,
                    OrchestratorEvent::StepFailed {
                        run_id: run.id.clone(),
                        step: key,
                        code,
                    },
                );
                return run;
            }

            run.steps[index].status = StepStatus::Done;
            debug!(step = %key, "Run step done");
            self.event_bus.publish(
                &request.conversation_id,
                OrchestratorEvent::StepDone {
                    run_id: run.id.clone(),
                    step: key,
                },
            );
        }

        let finished_at = self.clock.now();
        let millis = finished_at.timestamp_millis().unsigned_abs() % 100_000_000;
        let (place, amount, eta) = match &state.candidate {
            Some(candidate) => (candidate.place.clone(), candidate.amount, candidate.eta_min),
            None => (request.option.place.clone(), request.option.amount, request.option.eta_min),
        };

        run.status = RunStatus::Completed;
        run.finished_at = Some(finished_at);
        run.result = Some(RunResult {
            order_id: format!("ORD-{millis:08}"),
            place,
            amount,
            eta_min: state.route.as_ref().map_or(eta, |r| r.eta_min),
            proof_id: state.proof_id.take(),
        });

        info!(order_id = ?run.result.as_ref().map(|r| &r.order_id), "Run completed");
        run
    }

    /// Invoke the tool backing `key`.
    fn run_step_tool(
        &self,
        key: StepKey,
        request: &ExecutionRequest,
        plan_seed: &str,
        run_seed: &str,
        state: &mut StepContext,
    ) -> StepOutcome {
        let slots = &request.slots;

        if key == StepKey::Query {
            return self.search_step(request, plan_seed, state);
        }

        let Some(candidate) = state.candidate.clone() else {
            return StepOutcome::failed(
                ToolOutput::Fault {
                    code: FailureCode::ResourceUnavailable,
                },
                FailureCode::ResourceUnavailable,
            );
        };

        match key {
            StepKey::Query => StepOutcome::ok(ToolOutput::Search {
                candidate_id: candidate.id.clone(),
                place: candidate.place.clone(),
                found: true,
                considered: 1,
            }),
            StepKey::Filter => {
                let check = check_constraints(&candidate, slots);
                let output = ToolOutput::Constraint {
                    passed: check.passed(),
                    code: check.code,
                    amount: candidate.amount,
                    cap: check.cap,
                    queue_min: candidate.queue_min,
                };
                match check.code {
                    Some(code) => StepOutcome::failed(output, code),
                    None => StepOutcome::ok(output),
                }
            }
            StepKey::Validate => {
                let check = check_constraints(&candidate, slots);
                let routed = route(&candidate, run_seed);
                state.route = Some(routed.clone());
                let output = ToolOutput::Validation {
                    passed: check.passed(),
                    code: check.code,
                    amount: candidate.amount,
                    route: Some(routed),
                };
                match check.code {
                    Some(code) => StepOutcome::failed(output, code),
                    None => StepOutcome::ok(output),
                }
            }
            StepKey::Queue => {
                let ticket = stable_hash32(&format!("{run_seed}|{}|queue", candidate.id)) % 10_000;
                StepOutcome::ok(ToolOutput::Queue {
                    ticket: format!("Q-{ticket:04}"),
                    wait_min: candidate.queue_min,
                })
            }
            StepKey::Lock => {
                let reservation = reserve(&candidate, request.option.key, run_seed);
                let output = ToolOutput::Reservation {
                    locked: reservation.locked,
                    hold_id: reservation.hold_id,
                };
                if reservation.locked {
                    StepOutcome::ok(output)
                } else {
                    StepOutcome::failed(output, FailureCode::ResourceUnavailable)
                }
            }
            StepKey::Pay => {
                let required = candidate.amount > self.second_factor_threshold;
                let verified = !required || request.second_factor == Some(true);
                let output = ToolOutput::Payment {
                    amount: candidate.amount,
                    second_factor_required: required,
                    verified,
                };
                match (required, request.second_factor) {
                    (false, _) | (true, Some(true)) => StepOutcome::ok(output),
                    (true, Some(false)) => StepOutcome::failed(output, FailureCode::SecondFactorRejected),
                    (true, None) => StepOutcome::failed(output, FailureCode::SecondFactorFailed),
                }
            }
            StepKey::Proof => {
                let proof = generate_proof(&request.run_id, &candidate.place, candidate.amount);
                state.proof_id = Some(proof.proof_id.clone());
                StepOutcome::ok(ToolOutput::Proof(proof))
            }
        }
    }

    /// Re-run the search and locate the option's candidate.
    fn search_step(&self, request: &ExecutionRequest, plan_seed: &str, state: &mut StepContext) -> StepOutcome {
        let slots = &request.slots;
        let catalog = self.catalog.catalog_for(slots.city.as_deref());
        let candidates = search_candidates(&catalog, slots, plan_seed);
        let considered = candidates.len();
        state.candidate = candidates
            .into_iter()
            .find(|c| c.id == request.option.candidate_id);
        let found = state.candidate.is_some();
        let output = ToolOutput::Search {
            candidate_id: request.option.candidate_id.clone(),
            place: request.option.place.clone(),
            found,
            considered,
        };
        if found {
            StepOutcome::ok(output)
        } else {
            StepOutcome::failed(output, FailureCode::ResourceUnavailable)
        }
    }

    fn emit_tool_invocation(&self, request: &ExecutionRequest, key: StepKey, outcome: &StepOutcome) {
        let output = serde_json::to_value(&outcome.output).unwrap_or(serde_json::Value::Null);
        self.telemetry.emit(TelemetryEvent {
            at: self.clock.now(),
            conversation_id: request.conversation_id.clone(),
            event: "tool_invocation".to_string(),
            payload: json!({
                "run_id": request.run_id,
                "step": key.as_str(),
                "input": {
                    "option": request.option.key.as_str(),
                    "candidate_id": request.option.candidate_id,
                },
                "output": output,
                "failure": outcome.failure.map(|c| c.as_str()),
            }),
        });
    }
}
