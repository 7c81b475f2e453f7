//! A newer utterance supersedes planning still in flight.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{STRESS_UTTERANCE, fast_config};
use concierge::domain::errors::DomainError;
use concierge::domain::models::ConversationMode;
use concierge::domain::ports::Clock;
use concierge::infrastructure::catalog::StaticCatalog;
use concierge::infrastructure::clock::SystemClock;
use concierge::infrastructure::store::InMemoryConversationStore;
use concierge::infrastructure::telemetry::NullTelemetrySink;
use concierge::services::{ConversationOrchestrator, EventBus, OrchestratorDeps};

fn slow_planner() -> Arc<ConversationOrchestrator> {
    let mut config = fast_config();
    config.orchestrator.planning_delay_ms = 300;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let deps = OrchestratorDeps {
        catalog: Arc::new(StaticCatalog::new()),
        store: Arc::new(InMemoryConversationStore::new(Duration::from_secs(600), clock.clone())),
        telemetry: Arc::new(NullTelemetrySink),
        clock,
        event_bus: Arc::new(EventBus::default()),
    };
    Arc::new(ConversationOrchestrator::new(&config, deps).unwrap())
}

#[tokio::test]
async fn test_newer_utterance_cancels_inflight_planning() {
    let orchestrator = slow_planner();

    let first = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            orchestrator
                .submit_utterance("conv-z", "Dinner in Shanghai for 2 people, mid budget")
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = orchestrator.submit_utterance("conv-z", STRESS_UTTERANCE).await.unwrap();

    let first = first.await.unwrap();
    assert!(matches!(first, Err(DomainError::PlanningCancelled)));

    assert_eq!(second.mode, ConversationMode::Confirming);
    let plan = second.plan.expect("plan from the newer utterance");
    assert_eq!(plan.city, "Shenzhen");
}

#[tokio::test]
async fn test_planning_completes_without_interruption() {
    let orchestrator = slow_planner();
    let turn = orchestrator
        .submit_utterance("conv-y", "Dinner in Shanghai for 2 people, mid budget")
        .await
        .unwrap();
    assert_eq!(turn.mode, ConversationMode::Confirming);
    assert!(turn.plan.is_some());
}

#[tokio::test]
async fn test_cancelled_planning_rolls_back_assumed_defaults() {
    let orchestrator = slow_planner();
    orchestrator.submit_utterance("conv-w", "帮我找餐厅").await.unwrap();
    orchestrator.submit_utterance("conv-w", "hmm").await.unwrap();

    let assuming = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.submit_utterance("conv-w", "hmm").await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = orchestrator.submit_utterance("conv-w", "in Beijing").await.unwrap();

    let assuming = assuming.await.unwrap();
    assert!(matches!(assuming, Err(DomainError::PlanningCancelled)));

    let snapshot = orchestrator.snapshot("conv-w").await.unwrap();
    let rollback = snapshot
        .telemetry
        .entries()
        .find(|e| e.cause == "planning_cancelled")
        .expect("rollback transition recorded");
    assert_eq!(rollback.to, "asking");
    assert!(rollback.accepted);

    assert_eq!(second.mode, ConversationMode::Confirming);
    let plan = second.plan.expect("plan from the newer utterance");
    assert_eq!(plan.city, "Beijing");
}
