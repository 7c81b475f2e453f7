//! Automatic replanning after a failed run.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Budget, BudgetTier, ConversationContext, ConversationMode, Failure, FailureCode, NextStep,
    OptionKey, Plan, SlotKey, SlotRecord, normalize_slots_in_place,
};
use crate::services::state_machine::{Transition, transition_to};

/// What a replan attempt did to the conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplanOutcome {
    /// Slots were tightened, a new plan built and the backup lane is pending.
    Replanned {
        code: FailureCode,
        mutated: Vec<SlotKey>,
        transitions: Vec<Transition>,
    },
    /// No further automatic attempt; the conversation is failed and offers a human.
    HandoffOffered {
        reason: String,
        transitions: Vec<Transition>,
    },
}

impl ReplanOutcome {
    pub fn transitions(&self) -> &[Transition] {
        match self {
            Self::Replanned { transitions, .. } | Self::HandoffOffered { transitions, .. } => transitions,
        }
    }
}

/// Tighten the slot record in response to `code`. Returns the keys changed.
pub fn apply_failure_adjustments(slots: &mut SlotRecord, code: FailureCode) -> Vec<SlotKey> {
    match code {
        FailureCode::BudgetOverflow => {
            slots.budget = Some(slots.budget.map_or(Budget::Tier(BudgetTier::Low), Budget::downgrade));
            vec![SlotKey::Budget]
        }
        FailureCode::QueueTooLong => {
            slots.add_preference("no_queue");
            slots.add_preference("queue_flexible_after_fail");
            vec![SlotKey::Preferences]
        }
        FailureCode::ResourceUnavailable => {
            slots.add_preference("walk_first");
            vec![SlotKey::Preferences]
        }
        FailureCode::SecondFactorRejected | FailureCode::SecondFactorFailed | FailureCode::UserCancelled => {
            Vec::new()
        }
    }
}

/// Replan after `failure`, rebuilding the plan with `rebuild`.
///
/// At most `max_auto_replans` automatic attempts are made per conversation.
/// Past the bound, or when no plan can be rebuilt, the conversation moves to
/// `failed` with a human handoff on offer.
///
/// # Errors
/// Returns `DomainError::NotReplannable` for codes that must not trigger an
/// automatic retry. The context is left untouched in that case.
pub fn auto_replan_after_failure<F>(
    context: &mut ConversationContext,
    failure: &Failure,
    max_auto_replans: u32,
    at: DateTime<Utc>,
    rebuild: F,
) -> DomainResult<ReplanOutcome>
where
    F: FnOnce(&ConversationContext) -> DomainResult<Plan>,
{
    if !failure.code.is_recoverable() {
        return Err(DomainError::NotReplannable(failure.code.as_str().to_string()));
    }

    context.last_failure = Some(failure.clone());
    let mut transitions = Vec::with_capacity(2);

    if context.replan_count >= max_auto_replans {
        let reason = format!(
            "{} automatic replans did not succeed ({})",
            context.replan_count, failure.code
        );
        warn!(conversation_id = %context.id, replan_count = context.replan_count, "Replan bound reached");
        transitions.push(transition_to(context, ConversationMode::Failed, "replan_limit_reached", at));
        offer_handoff(context, &reason);
        return Ok(ReplanOutcome::HandoffOffered { reason, transitions });
    }

    transitions.push(transition_to(context, ConversationMode::Replanning, failure.code.as_str(), at));

    let mutated = apply_failure_adjustments(&mut context.slots, failure.code);
    for key in &mutated {
        context.evidence.mark(*key);
    }
    normalize_slots_in_place(&mut context.slots);

    let plan = match rebuild(context) {
        Ok(plan) => plan,
        Err(err) => {
            let reason = format!("No alternative plan after {}: {err}", failure.code);
            warn!(conversation_id = %context.id, error = %err, "Replan could not rebuild a plan");
            transitions.push(transition_to(context, ConversationMode::Failed, "replan_without_plan", at));
            offer_handoff(context, &reason);
            return Ok(ReplanOutcome::HandoffOffered { reason, transitions });
        }
    };

    context.plan = Some(plan);
    context.pending_option = Some(OptionKey::Backup);
    context.replan_count += 1;
    context.next_step = Some(NextStep::SwitchToBackup);
    transitions.push(transition_to(context, ConversationMode::Confirming, "replanned", at));

    info!(
        conversation_id = %context.id,
        code = %failure.code,
        replan_count = context.replan_count,
        ?mutated,
        "Replanned onto backup"
    );

    Ok(ReplanOutcome::Replanned {
        code: failure.code,
        mutated,
        transitions,
    })
}

fn offer_handoff(context: &mut ConversationContext, reason: &str) {
    context.next_step = Some(NextStep::HumanHandoff);
    context.handoff_reason = Some(reason.to_string());
    context.pending_option = None;
}
