//! EventBus service for outbound conversation events.
//!
//! Provides a broadcast-based event stream with sequence numbering so a
//! presentation layer can render mode changes, plans and run progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::models::{
    ConversationMode, Failure, FailureCode, PlanOption, RunResult, SlotEvidence, SlotKey,
    SlotRecord, StepKey,
};

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonically increasing sequence number assigned by EventBus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    pub fn zero() -> Self {
        Self(0)
    }
}

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Event severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for EventSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Everything the orchestrator tells the outside world.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    ModeChanged {
        from: ConversationMode,
        to: ConversationMode,
        cause: String,
    },
    SlotsUpdated {
        slots: SlotRecord,
        evidence: SlotEvidence,
    },
    ClarificationRequested {
        missing: Vec<SlotKey>,
        question: String,
    },
    PlanReady {
        main: PlanOption,
        backup: PlanOption,
        summary: String,
    },
    StepStarted {
        run_id: String,
        step: StepKey,
    },
    StepDone {
        run_id: String,
        step: StepKey,
    },
    StepFailed {
        run_id: String,
        step: StepKey,
        code: FailureCode,
    },
    RunCompleted {
        run_id: String,
        result: RunResult,
    },
    RunFailed {
        run_id: String,
        failure: Failure,
    },
    Replanned {
        failure_code: FailureCode,
        slots: SlotRecord,
        replan_count: u32,
    },
    HandoffRequested {
        reason: String,
    },
}

impl OrchestratorEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ModeChanged { .. } => "mode_changed",
            Self::SlotsUpdated { .. } => "slots_updated",
            Self::ClarificationRequested { .. } => "clarification_requested",
            Self::PlanReady { .. } => "plan_ready",
            Self::StepStarted { .. } => "step_started",
            Self::StepDone { .. } => "step_done",
            Self::StepFailed { .. } => "step_failed",
            Self::RunCompleted { .. } => "run_completed",
            Self::RunFailed { .. } => "run_failed",
            Self::Replanned { .. } => "replanned",
            Self::HandoffRequested { .. } => "handoff_requested",
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            Self::StepStarted { .. } | Self::StepDone { .. } | Self::SlotsUpdated { .. } => {
                EventSeverity::Debug
            }
            Self::StepFailed { .. } | Self::Replanned { .. } => EventSeverity::Warning,
            Self::RunFailed { .. } | Self::HandoffRequested { .. } => EventSeverity::Error,
            _ => EventSeverity::Info,
        }
    }
}

/// Event envelope containing all event metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    pub sequence: SequenceNumber,
    pub timestamp: DateTime<Utc>,
    pub severity: EventSeverity,
    pub conversation_id: String,
    pub payload: OrchestratorEvent,
}

/// Configuration for the EventBus.
#[derive(Debug, Clone)]
pub struct EventBusConfig {
    /// Channel capacity for the broadcast channel.
    pub channel_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

/// Central event bus for broadcasting events to multiple consumers.
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    sequence: AtomicU64,
}

impl EventBus {
    /// Create a new EventBus with the given configuration.
    pub fn new(config: EventBusConfig) -> Self {
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            sender,
            sequence: AtomicU64::new(0),
        }
    }

    /// Wrap and publish an event for a conversation.
    pub fn publish(&self, conversation_id: &str, payload: OrchestratorEvent) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            id: EventId::new(),
            sequence: SequenceNumber(seq),
            timestamp: Utc::now(),
            severity: payload.severity(),
            conversation_id: conversation_id.to_string(),
            payload,
        };

        // No subscribers is not an error
        let _ = self.sender.send(envelope);
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Get the current sequence number.
    pub fn current_sequence(&self) -> SequenceNumber {
        SequenceNumber(self.sequence.load(Ordering::SeqCst))
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EventBusConfig::default())
    }
}
