//! Conversation orchestrator: the inbound API.
//!
//! Ties the slot extractor, clarification policy, plan builder, execution
//! engine and replan policy together behind one handle. Each conversation
//! lives in its own `ConversationContext` behind a per-conversation mutex;
//! contexts are sharded by conversation id.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Config, ContextLimits, ConversationContext, ConversationMode, Failure, FailureCode, LoopStage,
    NextStep, OptionKey, OrchestratorConfig, Plan, PlanOption, Run, RunStatus, SlotKey, SlotRecord,
    summarize_slots,
};
use crate::domain::ports::{
    CatalogSource, Clock, ConversationStore, StoredConversation, TelemetryEvent, TelemetrySink,
};
use crate::infrastructure::catalog::StaticCatalog;
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::logging::PiiScrubber;
use crate::infrastructure::store::InMemoryConversationStore;
use crate::infrastructure::telemetry::TracingTelemetrySink;
use crate::services::clarification::{ClarificationDecision, ClarificationPolicy};
use crate::services::event_bus::{EventBus, OrchestratorEvent};
use crate::services::execution_engine::{ExecutionEngine, ExecutionRequest};
use crate::services::plan_builder::{PlanRequest, build_plan_from_slots};
use crate::services::replan::{ReplanOutcome, auto_replan_after_failure};
use crate::services::slot_extractor::SlotExtractor;
use crate::services::state_machine::{Transition, transition_to};

/// Collaborators injected into the orchestrator.
#[derive(Clone)]
pub struct OrchestratorDeps {
    pub catalog: Arc<dyn CatalogSource>,
    pub store: Arc<dyn ConversationStore>,
    pub telemetry: Arc<dyn TelemetrySink>,
    pub clock: Arc<dyn Clock>,
    pub event_bus: Arc<EventBus>,
}

impl OrchestratorDeps {
    /// Built-in adapters: static catalog, in-memory store, tracing telemetry
    /// and the system clock.
    pub fn defaults(config: &Config) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            catalog: Arc::new(StaticCatalog::new()),
            store: Arc::new(InMemoryConversationStore::new(
                Duration::from_secs(config.session.ttl_secs),
                clock.clone(),
            )),
            telemetry: Arc::new(TracingTelemetrySink),
            clock,
            event_bus: Arc::new(EventBus::default()),
        }
    }
}

/// What a caller sees after an inbound operation.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub conversation_id: String,
    pub mode: ConversationMode,
    pub loop_stage: LoopStage,
    pub reply: String,
    pub slots: SlotRecord,
    pub missing_slots: Vec<SlotKey>,
    pub plan: Option<Plan>,
    pub pending_option: Option<OptionKey>,
    /// Run executed during this operation, if any.
    pub run: Option<Run>,
    pub failure: Option<Failure>,
    pub next_step: Option<NextStep>,
}

impl TurnOutcome {
    fn from_context(context: &ConversationContext, reply: String, run: Option<Run>) -> Self {
        Self {
            conversation_id: context.id.clone(),
            mode: context.mode,
            loop_stage: context.loop_stage(),
            reply,
            slots: context.slots.clone(),
            missing_slots: context.missing_slots.clone(),
            plan: context.plan.clone(),
            pending_option: context.pending_option,
            run,
            failure: context.last_failure.clone(),
            next_step: context.next_step,
        }
    }
}

type SharedContext = Arc<Mutex<ConversationContext>>;

/// Inbound API over every conversation.
pub struct ConversationOrchestrator {
    config: OrchestratorConfig,
    limits: ContextLimits,
    extractor: SlotExtractor,
    clarification: ClarificationPolicy,
    engine: ExecutionEngine,
    scrubber: PiiScrubber,
    deps: OrchestratorDeps,
    conversations: RwLock<HashMap<String, SharedContext>>,
    planning_tokens: Mutex<HashMap<String, CancellationToken>>,
}

impl ConversationOrchestrator {
    /// # Errors
    /// Returns an error if an extraction or scrubbing pattern fails to compile
    pub fn new(config: &Config, deps: OrchestratorDeps) -> DomainResult<Self> {
        let orchestrator = &config.orchestrator;
        let engine = ExecutionEngine::new(
            deps.catalog.clone(),
            deps.clock.clone(),
            deps.telemetry.clone(),
            deps.event_bus.clone(),
        )
        .with_step_delay(Duration::from_millis(orchestrator.step_delay_ms))
        .with_second_factor_threshold(orchestrator.second_factor_threshold);

        Ok(Self {
            config: orchestrator.clone(),
            limits: ContextLimits {
                max_messages: config.session.max_messages,
                run_history: config.session.run_history,
                telemetry_entries: config.telemetry.max_entries,
            },
            extractor: SlotExtractor::new()?,
            clarification: ClarificationPolicy::new(
                orchestrator.max_clarification_turns,
                orchestrator.default_city.clone(),
            ),
            engine,
            scrubber: PiiScrubber::new()?,
            deps,
            conversations: RwLock::new(HashMap::new()),
            planning_tokens: Mutex::new(HashMap::new()),
        })
    }

    /// Orchestrator over the built-in adapters.
    ///
    /// # Errors
    /// Returns an error if an extraction or scrubbing pattern fails to compile
    pub fn with_defaults(config: &Config) -> DomainResult<Self> {
        Self::new(config, OrchestratorDeps::defaults(config))
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        self.deps.event_bus.clone()
    }

    /// Read one user utterance: extract slots, ask or plan, and auto-execute
    /// when the user granted permission and the plan allows it.
    ///
    /// A newer utterance for the same conversation cancels any planning still
    /// in flight for it.
    ///
    /// # Errors
    /// - `RunInProgress` while a run is executing
    /// - `PlanningCancelled` when a newer utterance superseded this one
    #[instrument(skip(self, text), fields(conversation_id = %conversation_id))]
    pub async fn submit_utterance(&self, conversation_id: &str, text: &str) -> DomainResult<TurnOutcome> {
        self.cancel_planning(conversation_id).await;

        let shared = self.context_for(conversation_id).await;
        let mut ctx = shared.lock().await;
        if ctx.is_executing() {
            return Err(DomainError::RunInProgress(conversation_id.to_string()));
        }

        let scrubbed = self.scrubber.scrub(text);
        ctx.push_message(scrubbed.clone());

        let previous_mode = ctx.mode;
        self.transition(&mut ctx, ConversationMode::Parsing, "utterance");

        let before_slots = ctx.slots.clone();
        let before_evidence = ctx.evidence;
        let extraction = self.extractor.extract_slots(&scrubbed, &ctx.slots);
        ctx.slots = extraction.slots;
        let after_slots = ctx.slots.clone();
        ctx.evidence.merge_turn(&before_slots, &after_slots, &extraction.evidence);

        if ctx.slots != before_slots || ctx.evidence != before_evidence {
            self.publish_slots(&ctx);
        }

        if extraction.evidence.is_empty() {
            if !ctx.slots.intent.is_known() && ctx.ask_count == 0 && ctx.plan.is_none() {
                self.transition(&mut ctx, ConversationMode::Idle, "no_actionable_intent");
                let outcome = TurnOutcome::from_context(&ctx, idle_reply().to_string(), None);
                self.save(&ctx).await;
                return Ok(outcome);
            }
            let settled = matches!(
                previous_mode,
                ConversationMode::Confirming | ConversationMode::Completed | ConversationMode::Failed
            );
            if ctx.plan.is_some() && settled {
                self.transition(&mut ctx, previous_mode, "no_new_information");
                let reply = ctx.plan.as_ref().map_or_else(String::new, |plan| {
                    plan_reply(plan, ctx.pending_option.unwrap_or(OptionKey::Main))
                });
                let outcome = TurnOutcome::from_context(&ctx, reply, None);
                self.save(&ctx).await;
                return Ok(outcome);
            }
        }

        let outcome = self.clarify_and_plan(&mut ctx, previous_mode).await;
        self.save(&ctx).await;
        outcome
    }

    /// Choose which lane to execute next.
    ///
    /// # Errors
    /// - `ValidationFailed` for anything other than main or backup
    /// - `InvalidModeForOperation` while slots are still being clarified
    /// - `NoPlan` before a plan exists
    #[instrument(skip(self), fields(conversation_id = %conversation_id))]
    pub async fn select_option(&self, conversation_id: &str, option: &str) -> DomainResult<TurnOutcome> {
        let key = OptionKey::from_str(option)
            .ok_or_else(|| DomainError::ValidationFailed(format!("unknown option '{option}'")))?;

        let shared = self.existing(conversation_id).await?;
        let mut ctx = shared.lock().await;
        match ctx.mode {
            ConversationMode::Executing => {
                return Err(DomainError::RunInProgress(conversation_id.to_string()));
            }
            mode @ (ConversationMode::Asking | ConversationMode::Parsing | ConversationMode::Planning) => {
                return Err(DomainError::InvalidModeForOperation {
                    operation: "select_option",
                    mode,
                });
            }
            _ => {}
        }
        let Some(plan) = ctx.plan.clone() else {
            return Err(DomainError::NoPlan);
        };

        ctx.pending_option = Some(key);
        if ctx.mode != ConversationMode::Confirming {
            self.transition(&mut ctx, ConversationMode::Confirming, "option_selected");
        }
        Ok(TurnOutcome::from_context(&ctx, plan_reply(&plan, key), None))
    }

    /// Execute the pending option.
    ///
    /// Allowed while confirming, or from `failed` to retry once a next step
    /// has been offered.
    ///
    /// # Errors
    /// - `RunInProgress` while another run executes
    /// - `InvalidModeForOperation` outside confirming/failed
    /// - `NoPlan` before a plan exists
    #[instrument(skip(self), fields(conversation_id = %conversation_id))]
    pub async fn confirm_execution(&self, conversation_id: &str) -> DomainResult<TurnOutcome> {
        let shared = self.existing(conversation_id).await?;
        let mut ctx = shared.lock().await;
        match ctx.mode {
            ConversationMode::Executing => {
                return Err(DomainError::RunInProgress(conversation_id.to_string()));
            }
            ConversationMode::Confirming | ConversationMode::Failed => {}
            mode => {
                return Err(DomainError::InvalidModeForOperation {
                    operation: "confirm_execution",
                    mode,
                });
            }
        }
        if ctx.plan.is_none() {
            return Err(DomainError::NoPlan);
        }

        let (reply, run) = self.execute_pending(&mut ctx, "confirmed").await?;
        let outcome = TurnOutcome::from_context(&ctx, reply, Some(run));
        self.save(&ctx).await;
        Ok(outcome)
    }

    /// Withdraw before execution. The plan is kept; the conversation idles.
    ///
    /// # Errors
    /// `InvalidModeForOperation` outside confirming
    #[instrument(skip(self), fields(conversation_id = %conversation_id))]
    pub async fn cancel_confirmation(&self, conversation_id: &str) -> DomainResult<TurnOutcome> {
        let shared = self.existing(conversation_id).await?;
        let mut ctx = shared.lock().await;
        if ctx.mode != ConversationMode::Confirming {
            return Err(DomainError::InvalidModeForOperation {
                operation: "cancel_confirmation",
                mode: ctx.mode,
            });
        }

        let failure = Failure::new(FailureCode::UserCancelled);
        let reply = format!("{} {}", failure.reason, failure.action);
        ctx.last_failure = Some(failure);
        ctx.next_step = None;
        self.transition(&mut ctx, ConversationMode::Idle, FailureCode::UserCancelled.as_str());
        Ok(TurnOutcome::from_context(&ctx, reply, None))
    }

    /// Make the next run fail on purpose. One-shot.
    ///
    /// # Errors
    /// Never fails today; the signature matches the other operations.
    #[instrument(skip(self), fields(conversation_id = %conversation_id))]
    pub async fn request_forced_failure(&self, conversation_id: &str, enabled: bool) -> DomainResult<TurnOutcome> {
        let shared = self.context_for(conversation_id).await;
        let mut ctx = shared.lock().await;
        ctx.force_failure = enabled;
        let reply = if enabled {
            "The next run will fail on purpose."
        } else {
            "Forced failure is off."
        };
        Ok(TurnOutcome::from_context(&ctx, reply.to_string(), None))
    }

    /// Answer the payment second-factor challenge.
    ///
    /// # Errors
    /// `RunInProgress` while a run executes
    #[instrument(skip(self), fields(conversation_id = %conversation_id))]
    pub async fn verify_second_factor(&self, conversation_id: &str, approved: bool) -> DomainResult<TurnOutcome> {
        let shared = self.existing(conversation_id).await?;
        let mut ctx = shared.lock().await;
        if ctx.is_executing() {
            return Err(DomainError::RunInProgress(conversation_id.to_string()));
        }

        ctx.second_factor = Some(approved);
        let awaiting = ctx.mode == ConversationMode::Failed
            && ctx.last_failure.as_ref().is_some_and(|f| f.code.is_second_factor());
        let reply = match (approved, awaiting) {
            (true, true) => {
                ctx.next_step = Some(NextStep::Retry);
                "Verified. Confirm again to complete the payment."
            }
            (true, false) => "Verified for the next payment.",
            (false, _) => "Verification declined. The payment will not go through.",
        };
        self.emit(&ctx.id, "second_factor", json!({ "approved": approved }));
        Ok(TurnOutcome::from_context(&ctx, reply.to_string(), None))
    }

    /// Ask for a human agent.
    ///
    /// # Errors
    /// `RunInProgress` while a run executes
    #[instrument(skip(self), fields(conversation_id = %conversation_id))]
    pub async fn request_handoff(&self, conversation_id: &str, reason: &str) -> DomainResult<TurnOutcome> {
        let shared = self.existing(conversation_id).await?;
        let mut ctx = shared.lock().await;
        if ctx.is_executing() {
            return Err(DomainError::RunInProgress(conversation_id.to_string()));
        }

        let reason = if reason.trim().is_empty() {
            "requested by user".to_string()
        } else {
            self.scrubber.scrub(reason.trim())
        };
        ctx.next_step = Some(NextStep::HumanHandoff);
        ctx.handoff_reason = Some(reason.clone());
        self.publish_handoff(&ctx.id, &reason);
        Ok(TurnOutcome::from_context(
            &ctx,
            format!("Handing you over to a human agent ({reason})."),
            None,
        ))
    }

    /// Copy of a conversation's full state.
    ///
    /// # Errors
    /// `ConversationNotFound` for unknown ids
    pub async fn snapshot(&self, conversation_id: &str) -> DomainResult<ConversationContext> {
        let shared = self.existing(conversation_id).await?;
        let ctx = shared.lock().await;
        Ok(ctx.clone())
    }

    /// Drop expired sessions from the store and from memory.
    ///
    /// # Errors
    /// Returns error if the store rejects the purge
    pub async fn purge_expired(&self, ttl: Duration) -> DomainResult<usize> {
        let purged = self.deps.store.purge_expired().await?;
        let cutoff = self.deps.clock.now()
            - chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(4));

        let mut conversations = self.conversations.write().await;
        let before = conversations.len();
        let mut expired = Vec::new();
        for (id, shared) in conversations.iter() {
            if let Ok(ctx) = shared.try_lock() {
                if ctx.updated_at < cutoff && !ctx.is_executing() {
                    expired.push(id.clone());
                }
            }
        }
        for id in &expired {
            conversations.remove(id);
        }
        debug!(purged, evicted = before - conversations.len(), "Purged expired conversations");
        Ok(purged)
    }

    /// Ask or plan from the current slots. When planning is superseded the
    /// assumed defaults are rolled back and the conversation returns to
    /// `previous_mode`.
    async fn clarify_and_plan(
        &self,
        ctx: &mut ConversationContext,
        previous_mode: ConversationMode,
    ) -> DomainResult<TurnOutcome> {
        let before = ctx.slots.clone();
        let decision = self
            .clarification
            .evaluate(&mut ctx.slots, &ctx.evidence, &mut ctx.ask_count);

        match decision {
            ClarificationDecision::Ask { missing, question } => {
                if ctx.plan.take().is_some() {
                    debug!(conversation_id = %ctx.id, "Dropped plan built from earlier slots");
                    ctx.pending_option = None;
                    ctx.next_step = None;
                }
                ctx.missing_slots = missing.clone();
                ctx.last_question = Some(question.clone());
                self.transition(ctx, ConversationMode::Asking, "missing_slots");
                self.deps.event_bus.publish(
                    &ctx.id,
                    OrchestratorEvent::ClarificationRequested {
                        missing,
                        question: question.clone(),
                    },
                );
                Ok(TurnOutcome::from_context(ctx, question, None))
            }
            ClarificationDecision::Proceed { assumed } => {
                if ctx.slots != before {
                    info!(conversation_id = %ctx.id, ?assumed, "Assumed defaults for missing slots");
                    self.publish_slots(ctx);
                }
                ctx.missing_slots.clear();
                ctx.last_question = None;
                self.transition(ctx, ConversationMode::Planning, "slots_ready");

                let plan = match self.plan_cancellable(&ctx.id, &ctx.slots).await {
                    Ok(plan) => plan,
                    Err(DomainError::PlanningCancelled) => {
                        ctx.slots = before;
                        self.transition(ctx, previous_mode, "planning_cancelled");
                        return Err(DomainError::PlanningCancelled);
                    }
                    Err(err) => return Err(err),
                };
                ctx.ask_count = 0;
                ctx.replan_count = 0;
                ctx.last_failure = None;
                ctx.next_step = None;
                ctx.pending_option = Some(OptionKey::Main);
                ctx.plan = Some(plan.clone());
                self.transition(ctx, ConversationMode::Confirming, "plan_ready");
                self.deps.event_bus.publish(
                    &ctx.id,
                    OrchestratorEvent::PlanReady {
                        main: plan.main.clone(),
                        backup: plan.backup.clone(),
                        summary: summarize_slots(&ctx.slots),
                    },
                );

                if ctx.slots.execution_permission && !plan.main.requires_confirmation {
                    info!(conversation_id = %ctx.id, "Execution permission granted, running main option");
                    let (reply, run) = self.execute_pending(ctx, "auto_execute").await?;
                    return Ok(TurnOutcome::from_context(ctx, reply, Some(run)));
                }

                Ok(TurnOutcome::from_context(ctx, plan_reply(&plan, OptionKey::Main), None))
            }
        }
    }

    /// Build a plan under a fresh cancellation token, cancelling any older
    /// planning request for the same conversation.
    async fn plan_cancellable(&self, conversation_id: &str, slots: &SlotRecord) -> DomainResult<Plan> {
        let token = CancellationToken::new();
        {
            let mut tokens = self.planning_tokens.lock().await;
            if let Some(previous) = tokens.insert(conversation_id.to_string(), token.clone()) {
                previous.cancel();
            }
        }

        let delay = Duration::from_millis(self.config.planning_delay_ms);
        let result = tokio::select! {
            () = token.cancelled() => Err(DomainError::PlanningCancelled),
            () = self.deps.clock.sleep(delay) => {
                if token.is_cancelled() {
                    Err(DomainError::PlanningCancelled)
                } else {
                    build_plan_from_slots(
                        self.deps.catalog.as_ref(),
                        PlanRequest {
                            conversation_id,
                            slots,
                        },
                    )
                }
            }
        };

        if !token.is_cancelled() {
            self.planning_tokens.lock().await.remove(conversation_id);
        }
        if matches!(result, Err(DomainError::PlanningCancelled)) {
            info!(conversation_id, "Planning superseded by a newer request");
        }
        result
    }

    async fn cancel_planning(&self, conversation_id: &str) {
        if let Some(token) = self.planning_tokens.lock().await.remove(conversation_id) {
            token.cancel();
        }
    }

    /// Run the pending option and react to the outcome.
    async fn execute_pending(&self, ctx: &mut ConversationContext, cause: &str) -> DomainResult<(String, Run)> {
        let Some(plan) = ctx.plan.clone() else {
            return Err(DomainError::NoPlan);
        };
        let key = ctx.pending_option.unwrap_or(OptionKey::Main);
        let option = plan.option(key).clone();

        let request = ExecutionRequest {
            conversation_id: ctx.id.clone(),
            run_id: ctx.next_run_id(),
            option,
            slots: ctx.slots.clone(),
            force_failure: std::mem::take(&mut ctx.force_failure),
            second_factor: ctx.second_factor,
        };

        self.transition(ctx, ConversationMode::Executing, cause);
        let run = self.engine.execute(&request).await;
        ctx.current_run = Some(run.clone());

        let reply = if run.status == RunStatus::Completed {
            self.finish_completed(ctx, &run)
        } else {
            let failure = run
                .failure
                .clone()
                .unwrap_or_else(|| Failure::new(FailureCode::ResourceUnavailable));
            self.finish_failed(ctx, &run, failure)
        };

        ctx.archive_current_run();
        Ok((reply, run))
    }

    fn finish_completed(&self, ctx: &mut ConversationContext, run: &Run) -> String {
        ctx.last_failure = None;
        ctx.next_step = None;
        ctx.second_factor = None;
        ctx.pending_option = None;
        self.transition(ctx, ConversationMode::Completed, "run_completed");

        let Some(result) = run.result.clone() else {
            return "Done.".to_string();
        };
        let reply = format!(
            "Done. Order {} at {}, ¥{}, about {} min away.",
            result.order_id, result.place, result.amount, result.eta_min
        );
        self.deps.event_bus.publish(
            &ctx.id,
            OrchestratorEvent::RunCompleted {
                run_id: run.id.clone(),
                result,
            },
        );
        reply
    }

    fn finish_failed(&self, ctx: &mut ConversationContext, run: &Run, failure: Failure) -> String {
        self.deps.event_bus.publish(
            &ctx.id,
            OrchestratorEvent::RunFailed {
                run_id: run.id.clone(),
                failure: failure.clone(),
            },
        );

        if !failure.code.is_recoverable() {
            ctx.last_failure = Some(failure.clone());
            ctx.next_step = Some(if failure.code.is_second_factor() {
                NextStep::VerifySecondFactor
            } else {
                NextStep::HumanHandoff
            });
            self.transition(ctx, ConversationMode::Failed, failure.code.as_str());
            return format!("{} {}", failure.reason, failure.action);
        }

        let catalog = self.deps.catalog.clone();
        let outcome = auto_replan_after_failure(
            ctx,
            &failure,
            self.config.max_auto_replans,
            self.deps.clock.now(),
            |c| {
                build_plan_from_slots(
                    catalog.as_ref(),
                    PlanRequest {
                        conversation_id: &c.id,
                        slots: &c.slots,
                    },
                )
            },
        );

        match outcome {
            Ok(outcome) => {
                for transition in outcome.transitions() {
                    self.announce(&ctx.id, transition);
                }
                match outcome {
                    ReplanOutcome::Replanned { code, .. } => {
                        self.publish_slots(ctx);
                        self.deps.event_bus.publish(
                            &ctx.id,
                            OrchestratorEvent::Replanned {
                                failure_code: code,
                                slots: ctx.slots.clone(),
                                replan_count: ctx.replan_count,
                            },
                        );
                        let backup = ctx
                            .plan
                            .as_ref()
                            .map(|plan| describe_option(&plan.backup))
                            .unwrap_or_default();
                        format!(
                            "{} {} New backup: {backup}. Confirm to continue.",
                            failure.reason, failure.action
                        )
                    }
                    ReplanOutcome::HandoffOffered { reason, .. } => {
                        self.publish_handoff(&ctx.id, &reason);
                        format!(
                            "{} I could not recover automatically. I can hand you over to a human agent.",
                            failure.reason
                        )
                    }
                }
            }
            Err(err) => {
                warn!(conversation_id = %ctx.id, error = %err, "Replan rejected");
                ctx.last_failure = Some(failure.clone());
                ctx.next_step = Some(NextStep::HumanHandoff);
                self.transition(ctx, ConversationMode::Failed, failure.code.as_str());
                format!("{} {}", failure.reason, failure.action)
            }
        }
    }

    fn transition(&self, ctx: &mut ConversationContext, target: ConversationMode, cause: &str) -> Transition {
        let transition = transition_to(ctx, target, cause, self.deps.clock.now());
        self.announce(&ctx.id, &transition);
        transition
    }

    fn announce(&self, conversation_id: &str, transition: &Transition) {
        self.emit(
            conversation_id,
            "mode_transition",
            json!({
                "from": transition.from.as_str(),
                "to": transition.to.as_str(),
                "cause": transition.cause,
                "loop_stage": transition.loop_stage.as_str(),
                "hooks": transition.hooks.iter().map(|h| h.as_str()).collect::<Vec<_>>(),
            }),
        );
        self.deps.event_bus.publish(
            conversation_id,
            OrchestratorEvent::ModeChanged {
                from: transition.from,
                to: transition.to,
                cause: transition.cause.clone(),
            },
        );
    }

    fn publish_slots(&self, ctx: &ConversationContext) {
        self.deps.event_bus.publish(
            &ctx.id,
            OrchestratorEvent::SlotsUpdated {
                slots: ctx.slots.clone(),
                evidence: ctx.evidence,
            },
        );
    }

    fn publish_handoff(&self, conversation_id: &str, reason: &str) {
        self.emit(conversation_id, "handoff_requested", json!({ "reason": reason }));
        self.deps.event_bus.publish(
            conversation_id,
            OrchestratorEvent::HandoffRequested {
                reason: reason.to_string(),
            },
        );
    }

    fn emit(&self, conversation_id: &str, event: &str, payload: serde_json::Value) {
        self.deps.telemetry.emit(TelemetryEvent {
            at: self.deps.clock.now(),
            conversation_id: conversation_id.to_string(),
            event: event.to_string(),
            payload,
        });
    }

    async fn save(&self, ctx: &ConversationContext) {
        let stored = StoredConversation::from_context(ctx, self.deps.clock.now());
        if let Err(err) = self.deps.store.save(stored).await {
            warn!(conversation_id = %ctx.id, error = %err, "Failed to save conversation");
        }
    }

    async fn existing(&self, conversation_id: &str) -> DomainResult<SharedContext> {
        self.conversations
            .read()
            .await
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| DomainError::ConversationNotFound(conversation_id.to_string()))
    }

    /// Context for `conversation_id`, restored from the store on first use.
    async fn context_for(&self, conversation_id: &str) -> SharedContext {
        if let Some(shared) = self.conversations.read().await.get(conversation_id) {
            return shared.clone();
        }

        let mut context = ConversationContext::with_limits(conversation_id, self.deps.clock.now(), self.limits);
        match self.deps.store.load(conversation_id).await {
            Ok(Some(stored)) => {
                info!(conversation_id, "Restored conversation from store");
                stored.restore_into(&mut context);
            }
            Ok(None) => {}
            Err(err) => warn!(conversation_id, error = %err, "Store unavailable, starting cold"),
        }

        self.conversations
            .write()
            .await
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(context)))
            .clone()
    }
}

fn idle_reply() -> &'static str {
    "Tell me what you need: a meal, a ride, a hotel, or a combination."
}

fn describe_option(option: &PlanOption) -> String {
    format!(
        "{} at {}, ¥{}, about {} min",
        option.title, option.place, option.amount, option.eta_min
    )
}

fn plan_reply(plan: &Plan, selected: OptionKey) -> String {
    let selected_option = plan.option(selected);
    let ask = if selected_option.requires_payment {
        "This one includes a payment. Confirm to go ahead."
    } else {
        "Confirm to go ahead, or pick the other option."
    };
    format!(
        "Main: {}. Backup: {}. Selected: {}. {}",
        describe_option(&plan.main),
        describe_option(&plan.backup),
        selected,
        ask
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::ManualClock;
    use crate::infrastructure::telemetry::RecordingTelemetrySink;

    fn orchestrator() -> (ConversationOrchestrator, Arc<RecordingTelemetrySink>) {
        let mut config = Config::default();
        config.orchestrator.step_delay_ms = 0;
        config.orchestrator.planning_delay_ms = 0;
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::default());
        let telemetry = Arc::new(RecordingTelemetrySink::new(500));
        let deps = OrchestratorDeps {
            catalog: Arc::new(StaticCatalog::new()),
            store: Arc::new(InMemoryConversationStore::new(Duration::from_secs(600), clock.clone())),
            telemetry: telemetry.clone(),
            clock,
            event_bus: Arc::new(EventBus::default()),
        };
        (ConversationOrchestrator::new(&config, deps).unwrap(), telemetry)
    }

    #[tokio::test]
    async fn test_greeting_stays_idle() {
        let (orchestrator, _) = orchestrator();
        let outcome = orchestrator.submit_utterance("c1", "hi").await.unwrap();
        assert_eq!(outcome.mode, ConversationMode::Idle);
        assert!(outcome.plan.is_none());
        assert_eq!(outcome.slots, SlotRecord::default());
    }

    #[tokio::test]
    async fn test_operations_on_unknown_conversation() {
        let (orchestrator, _) = orchestrator();
        assert!(matches!(
            orchestrator.confirm_execution("nope").await,
            Err(DomainError::ConversationNotFound(_))
        ));
        assert!(matches!(
            orchestrator.snapshot("nope").await,
            Err(DomainError::ConversationNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_confirm_requires_confirming_mode() {
        let (orchestrator, _) = orchestrator();
        orchestrator.submit_utterance("c1", "hi").await.unwrap();
        let result = orchestrator.confirm_execution("c1").await;
        assert!(matches!(
            result,
            Err(DomainError::InvalidModeForOperation {
                operation: "confirm_execution",
                mode: ConversationMode::Idle
            })
        ));
    }

    #[tokio::test]
    async fn test_select_option_validates_key() {
        let (orchestrator, _) = orchestrator();
        orchestrator
            .submit_utterance("c1", "dinner in Shanghai for 2, mid budget")
            .await
            .unwrap();
        assert!(matches!(
            orchestrator.select_option("c1", "sideways").await,
            Err(DomainError::ValidationFailed(_))
        ));
        let outcome = orchestrator.select_option("c1", "backup").await.unwrap();
        assert_eq!(outcome.pending_option, Some(OptionKey::Backup));
        assert_eq!(outcome.mode, ConversationMode::Confirming);
    }

    #[tokio::test]
    async fn test_transitions_reach_telemetry() {
        let (orchestrator, telemetry) = orchestrator();
        orchestrator
            .submit_utterance("c1", "dinner in Shanghai for 2, mid budget")
            .await
            .unwrap();
        let transitions = telemetry.events_named("mode_transition");
        let targets: Vec<_> = transitions
            .iter()
            .map(|e| e.payload["to"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(targets, vec!["parsing", "planning", "confirming"]);
    }

    #[tokio::test]
    async fn test_cancel_confirmation_idles_with_user_cancelled() {
        let (orchestrator, _) = orchestrator();
        orchestrator
            .submit_utterance("c1", "dinner in Shanghai for 2, mid budget")
            .await
            .unwrap();
        let outcome = orchestrator.cancel_confirmation("c1").await.unwrap();
        assert_eq!(outcome.mode, ConversationMode::Idle);
        assert_eq!(outcome.failure.map(|f| f.code), Some(FailureCode::UserCancelled));
        assert!(outcome.plan.is_some());
    }

    #[tokio::test]
    async fn test_messages_are_scrubbed() {
        let (orchestrator, _) = orchestrator();
        orchestrator
            .submit_utterance("c1", "call me on 13812345678 about dinner")
            .await
            .unwrap();
        let snapshot = orchestrator.snapshot("c1").await.unwrap();
        assert!(snapshot.messages.iter().all(|m| !m.contains("13812345678")));
    }
}
