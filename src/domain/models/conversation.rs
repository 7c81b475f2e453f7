//! Per-conversation state: mode, slots, plan, runs and the transition log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use super::plan::{OptionKey, Plan};
use super::run::{Failure, Run};
use super::slots::{SlotEvidence, SlotKey, SlotRecord};

/// Conversation mode. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationMode {
    Idle,
    Parsing,
    Asking,
    Planning,
    Confirming,
    Executing,
    Completed,
    Failed,
    Replanning,
}

impl Default for ConversationMode {
    fn default() -> Self {
        Self::Idle
    }
}

impl ConversationMode {
    pub const ALL: [ConversationMode; 9] = [
        Self::Idle,
        Self::Parsing,
        Self::Asking,
        Self::Planning,
        Self::Confirming,
        Self::Executing,
        Self::Completed,
        Self::Failed,
        Self::Replanning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Parsing => "parsing",
            Self::Asking => "asking",
            Self::Planning => "planning",
            Self::Confirming => "confirming",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Replanning => "replanning",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        let needle = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|mode| mode.as_str() == needle)
    }

    /// Coarse progress label for this mode.
    pub fn loop_stage(&self) -> LoopStage {
        match self {
            Self::Idle | Self::Parsing | Self::Asking => LoopStage::Intent,
            Self::Planning | Self::Replanning => LoopStage::Plan,
            Self::Confirming => LoopStage::Confirm,
            Self::Executing => LoopStage::Execute,
            Self::Completed | Self::Failed => LoopStage::Proof,
        }
    }
}

impl fmt::Display for ConversationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopStage {
    Intent,
    Plan,
    Confirm,
    Execute,
    Proof,
}

impl LoopStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Intent => "intent",
            Self::Plan => "plan",
            Self::Confirm => "confirm",
            Self::Execute => "execute",
            Self::Proof => "proof",
        }
    }
}

/// One accepted (or rejected) mode transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub at: DateTime<Utc>,
    pub from: ConversationMode,
    /// Requested target, verbatim when it was rejected.
    pub to: String,
    pub cause: String,
    pub loop_stage: LoopStage,
    pub accepted: bool,
}

/// Append-only, newest-first, bounded log of transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryLog {
    entries: VecDeque<TransitionRecord>,
    capacity: usize,
}

impl TelemetryLog {
    pub const DEFAULT_CAPACITY: usize = 180;

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(Self::DEFAULT_CAPACITY)),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, entry: TransitionRecord) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    /// Entries, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &TransitionRecord> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&TransitionRecord> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TelemetryLog {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

/// What the user is offered after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextStep {
    SwitchToBackup,
    Retry,
    VerifySecondFactor,
    HumanHandoff,
}

impl NextStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SwitchToBackup => "switch_to_backup",
            Self::Retry => "retry",
            Self::VerifySecondFactor => "verify_second_factor",
            Self::HumanHandoff => "human_handoff",
        }
    }
}

/// Bounds applied to a context's history buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextLimits {
    pub max_messages: usize,
    pub run_history: usize,
    pub telemetry_entries: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            max_messages: 20,
            run_history: 10,
            telemetry_entries: TelemetryLog::DEFAULT_CAPACITY,
        }
    }
}

/// Everything the orchestrator knows about one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    pub id: String,
    pub mode: ConversationMode,
    pub slots: SlotRecord,
    pub evidence: SlotEvidence,
    pub ask_count: u32,
    pub replan_count: u32,
    pub messages: VecDeque<String>,
    pub missing_slots: Vec<SlotKey>,
    pub last_question: Option<String>,
    pub plan: Option<Plan>,
    pub pending_option: Option<OptionKey>,
    pub current_run: Option<Run>,
    /// Finished runs, most recent first.
    pub run_history: VecDeque<Run>,
    pub run_counter: u32,
    pub force_failure: bool,
    /// `None` until the user answers a second-factor challenge.
    pub second_factor: Option<bool>,
    pub last_failure: Option<Failure>,
    pub next_step: Option<NextStep>,
    pub handoff_reason: Option<String>,
    pub telemetry: TelemetryLog,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    limits: ContextLimits,
}

impl ConversationContext {
    pub fn new(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::with_limits(id, now, ContextLimits::default())
    }

    pub fn with_limits(id: impl Into<String>, now: DateTime<Utc>, limits: ContextLimits) -> Self {
        Self {
            id: id.into(),
            mode: ConversationMode::Idle,
            slots: SlotRecord::default(),
            evidence: SlotEvidence::default(),
            ask_count: 0,
            replan_count: 0,
            messages: VecDeque::new(),
            missing_slots: Vec::new(),
            last_question: None,
            plan: None,
            pending_option: None,
            current_run: None,
            run_history: VecDeque::new(),
            run_counter: 0,
            force_failure: false,
            second_factor: None,
            last_failure: None,
            next_step: None,
            handoff_reason: None,
            telemetry: TelemetryLog::with_capacity(limits.telemetry_entries),
            created_at: now,
            updated_at: now,
            limits,
        }
    }

    pub fn limits(&self) -> ContextLimits {
        self.limits
    }

    pub fn loop_stage(&self) -> LoopStage {
        self.mode.loop_stage()
    }

    /// Append an utterance, dropping the oldest beyond the bound.
    pub fn push_message(&mut self, text: String) {
        self.messages.push_back(text);
        while self.messages.len() > self.limits.max_messages {
            self.messages.pop_front();
        }
    }

    /// Move the current run into history once it has finished.
    pub fn archive_current_run(&mut self) {
        if let Some(run) = self.current_run.take() {
            self.run_history.push_front(run);
            self.run_history.truncate(self.limits.run_history);
        }
    }

    /// Deterministic id for the next run of this conversation.
    pub fn next_run_id(&mut self) -> String {
        self.run_counter += 1;
        format!("{}-run-{}", self.id, self.run_counter)
    }

    pub fn is_executing(&self) -> bool {
        self.mode == ConversationMode::Executing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::run::RunStatus;

    #[test]
    fn test_mode_parsing_is_closed() {
        assert_eq!(ConversationMode::from_str("Executing"), Some(ConversationMode::Executing));
        assert_eq!(ConversationMode::from_str("sleeping"), None);
        for mode in ConversationMode::ALL {
            assert_eq!(ConversationMode::from_str(mode.as_str()), Some(mode));
        }
    }

    #[test]
    fn test_loop_stage_mapping() {
        assert_eq!(ConversationMode::Asking.loop_stage(), LoopStage::Intent);
        assert_eq!(ConversationMode::Replanning.loop_stage(), LoopStage::Plan);
        assert_eq!(ConversationMode::Confirming.loop_stage(), LoopStage::Confirm);
        assert_eq!(ConversationMode::Executing.loop_stage(), LoopStage::Execute);
        assert_eq!(ConversationMode::Failed.loop_stage(), LoopStage::Proof);
    }

    #[test]
    fn test_telemetry_log_is_bounded_newest_first() {
        let mut log = TelemetryLog::with_capacity(3);
        for i in 0..5 {
            log.record(TransitionRecord {
                at: Utc::now(),
                from: ConversationMode::Idle,
                to: "parsing".to_string(),
                cause: format!("cause-{i}"),
                loop_stage: LoopStage::Intent,
                accepted: true,
            });
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.latest().unwrap().cause, "cause-4");
        let causes: Vec<_> = log.entries().map(|e| e.cause.as_str()).collect();
        assert_eq!(causes, vec!["cause-4", "cause-3", "cause-2"]);
    }

    #[test]
    fn test_message_history_is_bounded() {
        let limits = ContextLimits {
            max_messages: 2,
            ..Default::default()
        };
        let mut ctx = ConversationContext::with_limits("c1", Utc::now(), limits);
        ctx.push_message("a".to_string());
        ctx.push_message("b".to_string());
        ctx.push_message("c".to_string());
        assert_eq!(ctx.messages, VecDeque::from(vec!["b".to_string(), "c".to_string()]));
    }

    #[test]
    fn test_run_history_most_recent_first() {
        let limits = ContextLimits {
            run_history: 2,
            ..Default::default()
        };
        let mut ctx = ConversationContext::with_limits("c1", Utc::now(), limits);
        for _ in 0..3 {
            let id = ctx.next_run_id();
            let mut run = Run::new(id, OptionKey::Main, &[], Utc::now());
            run.status = RunStatus::Completed;
            ctx.current_run = Some(run);
            ctx.archive_current_run();
        }
        assert_eq!(ctx.run_history.len(), 2);
        assert_eq!(ctx.run_history[0].id, "c1-run-3");
        assert_eq!(ctx.run_history[1].id, "c1-run-2");
        assert!(ctx.current_run.is_none());
    }
}
