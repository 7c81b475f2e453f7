//! Conversation mode transitions.
//!
//! `request_transition` is total over the closed mode set: every known mode
//! is accepted, anything else is rejected and logged. Transitions never do
//! I/O; they return the hooks the orchestration layer should run next.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ConversationContext, ConversationMode, LoopStage, TransitionRecord};

/// Side effect the orchestration layer runs after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionHook {
    EvaluateClarification,
    BuildPlan,
    StartRun,
    Replan,
    OfferNextStep,
}

impl TransitionHook {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EvaluateClarification => "evaluate_clarification",
            Self::BuildPlan => "build_plan",
            Self::StartRun => "start_run",
            Self::Replan => "replan",
            Self::OfferNextStep => "offer_next_step",
        }
    }
}

/// Hooks attached to entering `mode`.
pub fn hooks_for(mode: ConversationMode) -> &'static [TransitionHook] {
    match mode {
        ConversationMode::Parsing => &[TransitionHook::EvaluateClarification],
        ConversationMode::Planning => &[TransitionHook::BuildPlan],
        ConversationMode::Executing => &[TransitionHook::StartRun],
        ConversationMode::Replanning => &[TransitionHook::Replan],
        ConversationMode::Failed => &[TransitionHook::OfferNextStep],
        ConversationMode::Idle
        | ConversationMode::Asking
        | ConversationMode::Confirming
        | ConversationMode::Completed => &[],
    }
}

/// An accepted transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: ConversationMode,
    pub to: ConversationMode,
    pub cause: String,
    pub loop_stage: LoopStage,
    pub hooks: &'static [TransitionHook],
}

/// Move `context` to `target`.
///
/// # Errors
/// Returns `DomainError::UnknownMode` when `target` is not a conversation
/// mode. The rejection is still recorded in the context's transition log.
pub fn request_transition(
    context: &mut ConversationContext,
    target: &str,
    cause: &str,
    at: DateTime<Utc>,
) -> DomainResult<Transition> {
    let from = context.mode;

    let Some(to) = ConversationMode::from_str(target) else {
        warn!(conversation_id = %context.id, %from, target, cause, "Rejected transition to unknown mode");
        context.telemetry.record(TransitionRecord {
            at,
            from,
            to: target.to_string(),
            cause: cause.to_string(),
            loop_stage: from.loop_stage(),
            accepted: false,
        });
        return Err(DomainError::UnknownMode(target.to_string()));
    };

    context.mode = to;
    context.updated_at = at;
    context.telemetry.record(TransitionRecord {
        at,
        from,
        to: to.as_str().to_string(),
        cause: cause.to_string(),
        loop_stage: to.loop_stage(),
        accepted: true,
    });
    debug!(conversation_id = %context.id, %from, %to, cause, "Mode transition");

    Ok(Transition {
        from,
        to,
        cause: cause.to_string(),
        loop_stage: to.loop_stage(),
        hooks: hooks_for(to),
    })
}

/// Typed convenience over [`request_transition`].
pub fn transition_to(
    context: &mut ConversationContext,
    target: ConversationMode,
    cause: &str,
    at: DateTime<Utc>,
) -> Transition {
    let from = context.mode;
    request_transition(context, target.as_str(), cause, at).unwrap_or_else(|_| Transition {
        from,
        to: target,
        cause: cause.to_string(),
        loop_stage: target.loop_stage(),
        hooks: hooks_for(target),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepted_transition_records_loop_stage() {
        let mut ctx = ConversationContext::new("c1", Utc::now());
        let transition = request_transition(&mut ctx, "planning", "slots_complete", Utc::now()).unwrap();

        assert_eq!(transition.from, ConversationMode::Idle);
        assert_eq!(transition.to, ConversationMode::Planning);
        assert_eq!(transition.loop_stage, LoopStage::Plan);
        assert_eq!(transition.hooks, &[TransitionHook::BuildPlan]);
        assert_eq!(ctx.mode, ConversationMode::Planning);

        let record = ctx.telemetry.latest().unwrap();
        assert!(record.accepted);
        assert_eq!(record.to, "planning");
        assert_eq!(record.cause, "slots_complete");
    }

    #[test]
    fn test_unknown_target_is_rejected_and_logged() {
        let mut ctx = ConversationContext::new("c1", Utc::now());
        let result = request_transition(&mut ctx, "dancing", "bad_action", Utc::now());

        assert!(matches!(result, Err(DomainError::UnknownMode(ref m)) if m == "dancing"));
        assert_eq!(ctx.mode, ConversationMode::Idle);
        let record = ctx.telemetry.latest().unwrap();
        assert!(!record.accepted);
        assert_eq!(record.to, "dancing");
    }

    #[test]
    fn test_every_mode_is_reachable() {
        let mut ctx = ConversationContext::new("c1", Utc::now());
        for mode in ConversationMode::ALL {
            let transition = transition_to(&mut ctx, mode, "walk", Utc::now());
            assert_eq!(transition.to, mode);
            assert_eq!(ctx.mode, mode);
        }
        assert_eq!(ctx.telemetry.len(), ConversationMode::ALL.len());
    }

    #[test]
    fn test_failed_offers_next_step() {
        assert_eq!(hooks_for(ConversationMode::Failed), &[TransitionHook::OfferNextStep]);
        assert!(hooks_for(ConversationMode::Completed).is_empty());
    }
}
