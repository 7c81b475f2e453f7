//! Common test utilities for integration tests
//!
//! Provides shared fixtures and helpers used across multiple integration
//! test files.

use std::sync::Arc;
use std::time::Duration;

use concierge::domain::models::Config;
use concierge::domain::ports::Clock;
use concierge::infrastructure::catalog::StaticCatalog;
use concierge::infrastructure::clock::ManualClock;
use concierge::infrastructure::store::InMemoryConversationStore;
use concierge::infrastructure::telemetry::RecordingTelemetrySink;
use concierge::services::{ConversationOrchestrator, EventBus, OrchestratorDeps};

/// The queue stress request: food in a dense area, no queue, everything stated.
#[allow(dead_code)]
pub const STRESS_UTTERANCE: &str =
    "Dinner in Shenzhen Nanshan tonight for 2 people, mid budget, no queue please";

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
#[allow(dead_code)]
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Default configuration with every simulated delay removed.
#[allow(dead_code)]
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.orchestrator.step_delay_ms = 0;
    config.orchestrator.planning_delay_ms = 0;
    config
}

/// An orchestrator wired to in-memory adapters the test can inspect.
#[allow(dead_code)]
pub struct Harness {
    pub orchestrator: ConversationOrchestrator,
    pub telemetry: Arc<RecordingTelemetrySink>,
    pub store: Arc<InMemoryConversationStore>,
    pub clock: Arc<ManualClock>,
    pub event_bus: Arc<EventBus>,
}

#[allow(dead_code)]
pub fn harness() -> Harness {
    harness_with(&fast_config())
}

#[allow(dead_code)]
pub fn harness_with(config: &Config) -> Harness {
    let clock = Arc::new(ManualClock::default());
    let store = Arc::new(InMemoryConversationStore::new(
        Duration::from_secs(config.session.ttl_secs),
        clock.clone(),
    ));
    harness_sharing(config, clock, store)
}

/// A harness over an existing clock and store, e.g. to simulate a restart.
#[allow(dead_code)]
pub fn harness_sharing(
    config: &Config,
    clock: Arc<ManualClock>,
    store: Arc<InMemoryConversationStore>,
) -> Harness {
    let telemetry = Arc::new(RecordingTelemetrySink::new(1_000));
    let event_bus = Arc::new(EventBus::default());
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let deps = OrchestratorDeps {
        catalog: Arc::new(StaticCatalog::new()),
        store: store.clone(),
        telemetry: telemetry.clone(),
        clock: dyn_clock,
        event_bus: event_bus.clone(),
    };
    let orchestrator = ConversationOrchestrator::new(config, deps).expect("orchestrator builds");
    Harness {
        orchestrator,
        telemetry,
        store,
        clock,
        event_bus,
    }
}

/// Wait for a condition to be true with timeout
///
/// Polls the predicate every 10ms until it returns true or timeout is reached.
#[allow(dead_code)]
pub async fn wait_for<F>(mut predicate: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    while start.elapsed() < timeout {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    false
}
