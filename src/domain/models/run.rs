//! Runs, steps and the failure taxonomy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::plan::OptionKey;
use super::slots::Intent;

/// Why a run (or a confirmation) failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    ResourceUnavailable,
    BudgetOverflow,
    QueueTooLong,
    SecondFactorRejected,
    SecondFactorFailed,
    UserCancelled,
}

impl FailureCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResourceUnavailable => "resource_unavailable",
            Self::BudgetOverflow => "budget_overflow",
            Self::QueueTooLong => "queue_too_long",
            Self::SecondFactorRejected => "second_factor_rejected",
            Self::SecondFactorFailed => "second_factor_failed",
            Self::UserCancelled => "user_cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "resource_unavailable" => Some(Self::ResourceUnavailable),
            "budget_overflow" => Some(Self::BudgetOverflow),
            "queue_too_long" => Some(Self::QueueTooLong),
            "second_factor_rejected" => Some(Self::SecondFactorRejected),
            "second_factor_failed" => Some(Self::SecondFactorFailed),
            "user_cancelled" | "user_canceled" => Some(Self::UserCancelled),
            _ => None,
        }
    }

    /// Recoverable codes trigger an automatic replan.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ResourceUnavailable | Self::BudgetOverflow | Self::QueueTooLong
        )
    }

    pub fn is_second_factor(&self) -> bool {
        matches!(self, Self::SecondFactorRejected | Self::SecondFactorFailed)
    }

    fn reason(&self) -> &'static str {
        match self {
            Self::ResourceUnavailable => "The selected place has no availability right now.",
            Self::BudgetOverflow => "The final price came in above your budget.",
            Self::QueueTooLong => "The wait is longer than you said you would accept.",
            Self::SecondFactorRejected => "The payment verification was rejected.",
            Self::SecondFactorFailed => {
                "This payment needs a second verification that was not completed."
            }
            Self::UserCancelled => "You cancelled before anything was booked.",
        }
    }

    fn action(&self) -> &'static str {
        match self {
            Self::ResourceUnavailable => "I will switch to the backup and prefer places within walking distance.",
            Self::BudgetOverflow => "I will lower the budget tier and switch to the backup.",
            Self::QueueTooLong => "I will relax the queue limit and switch to a lower-wait backup.",
            Self::SecondFactorRejected => "Verify the payment again, or ask for a human agent.",
            Self::SecondFactorFailed => "Complete the verification, then confirm again.",
            Self::UserCancelled => "Tell me what to change, or confirm again when ready.",
        }
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure with plain-language guidance.
///
/// Deserialization goes through [`Failure::from_code_str`], so a record
/// carrying an unknown code degrades instead of being rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FailureRecord")]
pub struct Failure {
    pub code: FailureCode,
    pub reason: String,
    pub action: String,
}

/// Wire shape of a failure with the code left as free text.
#[derive(Deserialize)]
struct FailureRecord {
    code: String,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    action: Option<String>,
}

impl From<FailureRecord> for Failure {
    fn from(record: FailureRecord) -> Self {
        let mut failure = Self::from_code_str(&record.code);
        if FailureCode::from_str(&record.code).is_some() {
            if let Some(reason) = record.reason.filter(|r| !r.trim().is_empty()) {
                failure.reason = reason;
            }
            if let Some(action) = record.action.filter(|a| !a.trim().is_empty()) {
                failure.action = action;
            }
        }
        failure
    }
}

impl Failure {
    pub const GENERIC_REASON: &'static str = "Something went wrong while carrying out the plan.";
    pub const GENERIC_ACTION: &'static str =
        "I will try the backup option, or you can ask for a human agent.";

    pub fn new(code: FailureCode) -> Self {
        Self {
            code,
            reason: code.reason().to_string(),
            action: code.action().to_string(),
        }
    }

    /// Build a failure from an arbitrary code string. Unknown codes degenerate
    /// to `resource_unavailable` with a generic message.
    pub fn from_code_str(code: &str) -> Self {
        FailureCode::from_str(code).map_or_else(
            || Self {
                code: FailureCode::ResourceUnavailable,
                reason: Self::GENERIC_REASON.to_string(),
                action: Self::GENERIC_ACTION.to_string(),
            },
            Self::new,
        )
    }
}

/// Step kinds, in the vocabulary shared by every skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKey {
    Query,
    Filter,
    Validate,
    Queue,
    Lock,
    Pay,
    Proof,
}

impl StepKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Filter => "filter",
            Self::Validate => "validate",
            Self::Queue => "queue",
            Self::Lock => "lock",
            Self::Pay => "pay",
            Self::Proof => "proof",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Query => "Check live availability",
            Self::Filter => "Apply your constraints",
            Self::Validate => "Validate price and route",
            Self::Queue => "Take a queue ticket",
            Self::Lock => "Hold the reservation",
            Self::Pay => "Pay",
            Self::Proof => "Issue confirmation",
        }
    }
}

impl fmt::Display for StepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered steps executed for an intent.
pub fn step_skeleton(intent: Intent) -> &'static [StepKey] {
    match intent {
        Intent::Eat | Intent::Unknown => &[StepKey::Query, StepKey::Filter, StepKey::Queue, StepKey::Proof],
        Intent::Travel => &[StepKey::Query, StepKey::Validate, StepKey::Lock, StepKey::Proof],
        Intent::Hotel | Intent::ComboEatTravel | Intent::ComboHotelTravel => &[
            StepKey::Query,
            StepKey::Validate,
            StepKey::Lock,
            StepKey::Pay,
            StepKey::Proof,
        ],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Queued,
    Running,
    Done,
    Failed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// Road conditions reported by the route tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficLevel {
    Light,
    Moderate,
    Heavy,
}

impl TrafficLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Moderate => "moderate",
            Self::Heavy => "heavy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteInfo {
    pub eta_min: u32,
    pub traffic: TrafficLevel,
    pub cost_low: u32,
    pub cost_high: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofRecord {
    pub proof_id: String,
    pub summary: String,
}

/// Raw output attached to a step by the tool that ran it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolOutput {
    Search {
        candidate_id: String,
        place: String,
        found: bool,
        considered: usize,
    },
    Constraint {
        passed: bool,
        code: Option<FailureCode>,
        amount: u32,
        cap: Option<u32>,
        queue_min: u32,
    },
    Validation {
        passed: bool,
        code: Option<FailureCode>,
        amount: u32,
        route: Option<RouteInfo>,
    },
    Queue {
        ticket: String,
        wait_min: u32,
    },
    Reservation {
        locked: bool,
        hold_id: Option<String>,
    },
    Payment {
        amount: u32,
        second_factor_required: bool,
        verified: bool,
    },
    Proof(ProofRecord),
    /// Fault injected before the tool ran.
    Fault { code: FailureCode },
}

/// One ordered unit of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub key: StepKey,
    pub label: String,
    pub status: StepStatus,
    pub output: Option<ToolOutput>,
}

impl Step {
    pub fn new(key: StepKey) -> Self {
        Self {
            key,
            label: key.label().to_string(),
            status: StepStatus::Queued,
            output: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub order_id: String,
    pub place: String,
    pub amount: u32,
    pub eta_min: u32,
    pub proof_id: Option<String>,
}

/// One execution attempt of a plan option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub option_key: OptionKey,
    pub steps: Vec<Step>,
    pub status: RunStatus,
    pub failure: Option<Failure>,
    pub result: Option<RunResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Run {
    pub fn new(id: String, option_key: OptionKey, skeleton: &[StepKey], now: DateTime<Utc>) -> Self {
        Self {
            id,
            option_key,
            steps: skeleton.iter().copied().map(Step::new).collect(),
            status: RunStatus::Queued,
            failure: None,
            result: None,
            started_at: now,
            finished_at: None,
        }
    }

    /// Index of the first failed step, if any.
    pub fn failed_step_index(&self) -> Option<usize> {
        self.steps.iter().position(|s| s.status == StepStatus::Failed)
    }

    pub fn completed_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.status == StepStatus::Done).count()
    }
}
