//! Command implementations.

pub mod chat;
pub mod config;
pub mod extract;
pub mod plan;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::display::{colorize_mode, colorize_risk, colorize_step_status, kv_table, list_table};
use crate::cli::output::{CommandOutput, truncate};
use crate::domain::models::{Config, PlanOption, Run, SlotEvidence, SlotKey, SlotRecord};
use crate::services::orchestrator::{ConversationOrchestrator, TurnOutcome};

/// Build an orchestrator over the built-in adapters.
pub(crate) fn build_orchestrator(config: &Config) -> Result<ConversationOrchestrator> {
    ConversationOrchestrator::with_defaults(config).context("Failed to initialize orchestrator")
}

/// Key/value rows for every slot, marking the explicitly stated ones.
pub(crate) fn slot_rows(slots: &SlotRecord, evidence: Option<&SlotEvidence>) -> Vec<(String, String)> {
    let mark = |key: SlotKey| -> &'static str {
        match evidence {
            Some(evidence) if evidence.get(key) => " *",
            _ => "",
        }
    };
    let or_dash = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());

    vec![
        (format!("intent{}", mark(SlotKey::Intent)), slots.intent.to_string()),
        (format!("city{}", mark(SlotKey::City)), or_dash(slots.city.clone())),
        (format!("area{}", mark(SlotKey::Area)), or_dash(slots.area.clone())),
        (
            format!("budget{}", mark(SlotKey::Budget)),
            or_dash(slots.budget.map(|b| b.to_string())),
        ),
        (
            format!("time{}", mark(SlotKey::TimeConstraint)),
            or_dash(slots.time_constraint.map(|t| t.to_string())),
        ),
        (
            format!("party{}", mark(SlotKey::PartySize)),
            or_dash(slots.party_size.map(|p| p.to_string())),
        ),
        (
            format!("preferences{}", mark(SlotKey::Preferences)),
            if slots.preferences.is_empty() {
                "-".to_string()
            } else {
                slots.preferences.iter().cloned().collect::<Vec<_>>().join(", ")
            },
        ),
        (
            format!("permission{}", mark(SlotKey::ExecutionPermission)),
            slots.execution_permission.to_string(),
        ),
    ]
}

pub(crate) fn render_options(options: &[&PlanOption]) -> String {
    let mut table = list_table(&["lane", "title", "place", "eta", "amount", "risk", "reason"]);
    for option in options {
        table.add_row(vec![
            option.key.to_string(),
            truncate(&option.title, 32),
            truncate(&option.place, 28),
            format!("{} min", option.eta_min),
            format!("¥{}", option.amount),
            colorize_risk(&option.risk).to_string(),
            truncate(&option.reason, 48),
        ]);
    }
    table.to_string()
}

pub(crate) fn render_run(run: &Run) -> String {
    let mut table = list_table(&["step", "status"]);
    for step in &run.steps {
        table.add_row(vec![step.label.clone(), colorize_step_status(step.status.as_str()).to_string()]);
    }
    format!("Run {} ({}):\n{table}", run.id, colorize_mode(run.status.as_str()))
}

/// Printable view of one orchestrator turn.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct TurnView(pub TurnOutcome);

impl CommandOutput for TurnView {
    fn to_human(&self) -> String {
        let turn = &self.0;
        let mut out = format!("[{}] {}", colorize_mode(turn.mode.as_str()), turn.reply);
        if let Some(run) = &turn.run {
            out.push('\n');
            out.push_str(&render_run(run));
        }
        if let Some(next) = turn.next_step {
            out.push_str(&format!("\nnext: {}", next.as_str()));
        }
        out
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.0).unwrap_or_default()
    }
}

pub(crate) fn render_slots(slots: &SlotRecord, evidence: Option<&SlotEvidence>) -> String {
    kv_table(&slot_rows(slots, evidence)).to_string()
}
