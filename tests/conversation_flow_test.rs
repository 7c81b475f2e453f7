//! End-to-end conversation flows through the orchestrator.

mod common;

use std::time::Duration;

use common::{STRESS_UTTERANCE, fast_config, harness, harness_sharing, harness_with, setup_test_logging};
use concierge::domain::errors::DomainError;
use concierge::domain::models::{
    Budget, BudgetTier, ConversationMode, FailureCode, Intent, NextStep, OptionKey, RunStatus,
    SlotKey, SlotRecord,
};

#[tokio::test]
async fn test_greeting_creates_no_plan() {
    let h = harness();
    let turn = h.orchestrator.submit_utterance("conv-b", "hi").await.unwrap();

    assert_eq!(turn.mode, ConversationMode::Idle);
    assert!(turn.plan.is_none());
    assert_eq!(turn.slots, SlotRecord::default());
    assert!(turn.run.is_none());
}

#[tokio::test]
async fn test_restaurant_request_asks_for_budget_and_party() {
    let h = harness();
    let turn = h.orchestrator.submit_utterance("conv-c", "帮我找餐厅").await.unwrap();

    assert_eq!(turn.mode, ConversationMode::Asking);
    assert_eq!(turn.slots.intent, Intent::Eat);
    assert!(turn.missing_slots.contains(&SlotKey::Budget));
    assert!(turn.missing_slots.contains(&SlotKey::PartySize));
    assert!(!turn.reply.is_empty());
    assert!(turn.plan.is_none());
}

#[tokio::test]
async fn test_two_unanswered_asks_then_assumes_defaults() {
    setup_test_logging();
    let h = harness();

    let first = h.orchestrator.submit_utterance("conv-d", "帮我找餐厅").await.unwrap();
    assert_eq!(first.mode, ConversationMode::Asking);
    let second = h.orchestrator.submit_utterance("conv-d", "hmm").await.unwrap();
    assert_eq!(second.mode, ConversationMode::Asking);

    let third = h.orchestrator.submit_utterance("conv-d", "hmm").await.unwrap();
    assert_eq!(third.mode, ConversationMode::Confirming);
    assert_eq!(third.slots.budget, Some(Budget::Tier(BudgetTier::Mid)));
    assert_eq!(third.slots.party_size, Some(2));
    assert_eq!(third.slots.city.as_deref(), Some("Shanghai"));
    assert!(third.plan.is_some());
    assert!(third.missing_slots.is_empty());

    let snapshot = h.orchestrator.snapshot("conv-d").await.unwrap();
    let asks = snapshot.telemetry.entries().filter(|e| e.to == "asking").count();
    let plans = snapshot.telemetry.entries().filter(|e| e.to == "planning").count();
    assert_eq!(asks, 2);
    assert_eq!(plans, 1);
    assert!(!snapshot.evidence.get(SlotKey::Budget));
    assert!(!snapshot.evidence.get(SlotKey::PartySize));
}

#[tokio::test]
async fn test_queue_stress_run_replans_onto_backup() {
    let h = harness();
    let planned = h.orchestrator.submit_utterance("conv-a", STRESS_UTTERANCE).await.unwrap();
    assert_eq!(planned.mode, ConversationMode::Confirming);
    assert_eq!(planned.pending_option, Some(OptionKey::Main));

    let turn = h.orchestrator.confirm_execution("conv-a").await.unwrap();
    let run = turn.run.as_ref().expect("run attached");
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.option_key, OptionKey::Main);
    assert_eq!(run.failure.as_ref().map(|f| f.code), Some(FailureCode::QueueTooLong));

    assert_eq!(turn.mode, ConversationMode::Confirming);
    assert_eq!(turn.pending_option, Some(OptionKey::Backup));
    assert_eq!(turn.next_step, Some(NextStep::SwitchToBackup));
    assert!(turn.slots.has_preference("no_queue"));
    assert!(turn.slots.has_preference("queue_flexible_after_fail"));
    assert_eq!(turn.failure.map(|f| f.code), Some(FailureCode::QueueTooLong));

    let snapshot = h.orchestrator.snapshot("conv-a").await.unwrap();
    assert_eq!(snapshot.replan_count, 1);
    assert!(snapshot.current_run.is_none());
    assert_eq!(snapshot.run_history.len(), 1);
}

#[tokio::test]
async fn test_backup_run_after_replan_is_not_queue_stressed() {
    let h = harness();
    h.orchestrator.submit_utterance("conv-a2", STRESS_UTTERANCE).await.unwrap();
    h.orchestrator.confirm_execution("conv-a2").await.unwrap();

    let turn = h.orchestrator.confirm_execution("conv-a2").await.unwrap();
    let run = turn.run.expect("run attached");
    assert_eq!(run.option_key, OptionKey::Backup);
    assert!(run.status.is_terminal());
    match run.status {
        RunStatus::Completed => {
            assert_eq!(turn.mode, ConversationMode::Completed);
            assert!(run.result.is_some());
            assert!(turn.failure.is_none());
        }
        _ => assert!(matches!(
            turn.mode,
            ConversationMode::Confirming | ConversationMode::Failed
        )),
    }
}

#[tokio::test]
async fn test_forced_failures_end_in_handoff_after_replan_bound() {
    let h = harness();
    h.orchestrator
        .submit_utterance("conv-h", "Dinner in Shanghai for 2 people, mid budget")
        .await
        .unwrap();

    for expected_replans in 1..=2 {
        h.orchestrator.request_forced_failure("conv-h", true).await.unwrap();
        let turn = h.orchestrator.confirm_execution("conv-h").await.unwrap();
        assert_eq!(
            turn.run.as_ref().and_then(|r| r.failure.as_ref()).map(|f| f.code),
            Some(FailureCode::ResourceUnavailable)
        );
        assert_eq!(turn.mode, ConversationMode::Confirming);
        assert_eq!(turn.pending_option, Some(OptionKey::Backup));
        assert!(turn.slots.has_preference("walk_first"));
        let snapshot = h.orchestrator.snapshot("conv-h").await.unwrap();
        assert_eq!(snapshot.replan_count, expected_replans);
        assert!(!snapshot.force_failure);
    }

    h.orchestrator.request_forced_failure("conv-h", true).await.unwrap();
    let turn = h.orchestrator.confirm_execution("conv-h").await.unwrap();
    assert_eq!(turn.mode, ConversationMode::Failed);
    assert_eq!(turn.next_step, Some(NextStep::HumanHandoff));
    assert!(turn.pending_option.is_none());

    let snapshot = h.orchestrator.snapshot("conv-h").await.unwrap();
    assert!(snapshot.handoff_reason.is_some());
    assert_eq!(h.telemetry.events_named("handoff_requested").len(), 1);
}

#[tokio::test]
async fn test_payment_second_factor_challenge_and_retry() {
    let mut config = fast_config();
    config.orchestrator.second_factor_threshold = 1;

    let mut challenged = None;
    for n in 0..30 {
        let h = harness_with(&config);
        let id = format!("conv-sf-{n}");
        h.orchestrator
            .submit_utterance(&id, "hotel in Shanghai for 2 people, high budget")
            .await
            .unwrap();
        let turn = h.orchestrator.confirm_execution(&id).await.unwrap();
        if turn.failure.as_ref().map(|f| f.code) == Some(FailureCode::SecondFactorFailed) {
            challenged = Some((h, id, turn));
            break;
        }
    }

    let (h, id, turn) = challenged.expect("a payment reaches the second-factor challenge");
    assert_eq!(turn.mode, ConversationMode::Failed);
    assert_eq!(turn.next_step, Some(NextStep::VerifySecondFactor));

    let verified = h.orchestrator.verify_second_factor(&id, true).await.unwrap();
    assert_eq!(verified.next_step, Some(NextStep::Retry));

    let retry = h.orchestrator.confirm_execution(&id).await.unwrap();
    let code = retry.run.as_ref().and_then(|r| r.failure.as_ref()).map(|f| f.code);
    assert!(!code.is_some_and(|c| c.is_second_factor()));
    if retry.mode == ConversationMode::Completed {
        let snapshot = h.orchestrator.snapshot(&id).await.unwrap();
        assert_eq!(snapshot.second_factor, None);
    }
}

#[tokio::test]
async fn test_rejected_second_factor_is_not_replanned() {
    let mut config = fast_config();
    config.orchestrator.second_factor_threshold = 1;

    for n in 0..30 {
        let h = harness_with(&config);
        let id = format!("conv-rej-{n}");
        h.orchestrator
            .submit_utterance(&id, "hotel in Shanghai for 2 people, high budget")
            .await
            .unwrap();
        h.orchestrator.verify_second_factor(&id, false).await.unwrap();
        let turn = h.orchestrator.confirm_execution(&id).await.unwrap();
        if turn.failure.as_ref().map(|f| f.code) == Some(FailureCode::SecondFactorRejected) {
            assert_eq!(turn.mode, ConversationMode::Failed);
            let snapshot = h.orchestrator.snapshot(&id).await.unwrap();
            assert_eq!(snapshot.replan_count, 0);
            return;
        }
    }
    panic!("no payment reached the rejected second factor");
}

#[tokio::test]
async fn test_new_utterance_after_completion_replans_from_scratch() {
    let h = harness();
    h.orchestrator.submit_utterance("conv-n", STRESS_UTTERANCE).await.unwrap();
    h.orchestrator.confirm_execution("conv-n").await.unwrap();

    let turn = h
        .orchestrator
        .submit_utterance("conv-n", "actually make it 4 people")
        .await
        .unwrap();
    assert_eq!(turn.slots.party_size, Some(4));
    assert_eq!(turn.mode, ConversationMode::Confirming);
    assert_eq!(turn.pending_option, Some(OptionKey::Main));
    let snapshot = h.orchestrator.snapshot("conv-n").await.unwrap();
    assert_eq!(snapshot.replan_count, 0);
    assert_eq!(snapshot.ask_count, 0);
}

#[tokio::test]
async fn test_execution_permission_runs_immediately() {
    let h = harness();
    let turn = h
        .orchestrator
        .submit_utterance("conv-p", "Dinner in Beijing for 2 people, mid budget, go ahead and book it")
        .await
        .unwrap();

    assert!(turn.slots.execution_permission);
    let plan = turn.plan.as_ref().expect("plan");
    if plan.main.requires_confirmation {
        assert_eq!(turn.mode, ConversationMode::Confirming);
        assert!(turn.run.is_none());
    } else {
        let run = turn.run.as_ref().expect("auto-executed run");
        assert_eq!(run.option_key, OptionKey::Main);
        assert_ne!(turn.mode, ConversationMode::Executing);
    }
}

#[tokio::test]
async fn test_handoff_request_is_scrubbed_and_published() {
    let h = harness();
    h.orchestrator.submit_utterance("conv-x", "帮我找餐厅").await.unwrap();
    let mut events = h.event_bus.subscribe();

    let turn = h
        .orchestrator
        .request_handoff("conv-x", "call me at 13812345678")
        .await
        .unwrap();
    assert_eq!(turn.next_step, Some(NextStep::HumanHandoff));
    assert!(!turn.reply.contains("13812345678"));

    let envelope = events.recv().await.unwrap();
    assert_eq!(envelope.payload.name(), "handoff_requested");
}

#[tokio::test]
async fn test_conversation_restores_from_store_after_restart() {
    let config = fast_config();
    let first = harness_with(&config);
    first.orchestrator.submit_utterance("conv-r", "帮我找餐厅").await.unwrap();
    assert_eq!(first.store.len().await, 1);

    let second = harness_sharing(&config, first.clock.clone(), first.store.clone());
    let turn = second
        .orchestrator
        .submit_utterance("conv-r", "for 2 people, mid budget")
        .await
        .unwrap();

    assert_eq!(turn.slots.intent, Intent::Eat);
    assert_eq!(turn.slots.party_size, Some(2));
    assert_eq!(turn.mode, ConversationMode::Asking);
    assert_eq!(turn.missing_slots, vec![SlotKey::City]);
    let snapshot = second.orchestrator.snapshot("conv-r").await.unwrap();
    assert_eq!(snapshot.messages.len(), 2);
    assert_eq!(snapshot.ask_count, 2);
}

#[tokio::test]
async fn test_purge_drops_idle_sessions() {
    let h = harness();
    h.orchestrator.submit_utterance("conv-t", "帮我找餐厅").await.unwrap();

    let ttl = Duration::from_secs(fast_config().session.ttl_secs);
    h.clock.advance(ttl + Duration::from_secs(1));

    let purged = h.orchestrator.purge_expired(ttl).await.unwrap();
    assert_eq!(purged, 1);
    assert!(matches!(
        h.orchestrator.snapshot("conv-t").await,
        Err(DomainError::ConversationNotFound(_))
    ));
}

#[tokio::test]
async fn test_cancel_outside_confirming_is_rejected() {
    let h = harness();
    h.orchestrator.submit_utterance("conv-k", "帮我找餐厅").await.unwrap();
    assert!(matches!(
        h.orchestrator.cancel_confirmation("conv-k").await,
        Err(DomainError::InvalidModeForOperation {
            operation: "cancel_confirmation",
            mode: ConversationMode::Asking
        })
    ));
}

#[tokio::test]
async fn test_changed_slots_invalidate_earlier_plan() {
    let h = harness();
    h.orchestrator.submit_utterance("conv-s", "帮我找餐厅").await.unwrap();
    h.orchestrator.submit_utterance("conv-s", "hmm").await.unwrap();
    let planned = h.orchestrator.submit_utterance("conv-s", "hmm").await.unwrap();
    assert_eq!(planned.plan.as_ref().map(|p| p.city.as_str()), Some("Shanghai"));

    let turn = h.orchestrator.submit_utterance("conv-s", "in Beijing").await.unwrap();
    assert_eq!(turn.mode, ConversationMode::Asking);
    assert_eq!(turn.slots.city.as_deref(), Some("Beijing"));
    assert!(turn.plan.is_none());
    assert!(turn.pending_option.is_none());

    assert!(matches!(
        h.orchestrator.select_option("conv-s", "main").await,
        Err(DomainError::InvalidModeForOperation {
            operation: "select_option",
            mode: ConversationMode::Asking
        })
    ));
    assert!(matches!(
        h.orchestrator.confirm_execution("conv-s").await,
        Err(DomainError::InvalidModeForOperation {
            operation: "confirm_execution",
            mode: ConversationMode::Asking
        })
    ));

    let snapshot = h.orchestrator.snapshot("conv-s").await.unwrap();
    assert!(snapshot.current_run.is_none());
    assert!(snapshot.last_failure.is_none());
    assert_eq!(snapshot.replan_count, 0);
}
