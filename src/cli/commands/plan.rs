//! One-shot planning command.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::commands::{render_options, render_slots};
use crate::cli::output::{CommandOutput, output};
use crate::domain::models::{Config, Plan, SlotKey, SlotRecord};
use crate::infrastructure::catalog::StaticCatalog;
use crate::services::clarification::{apply_assumptions_for_missing_slots, clarification_missing_slots};
use crate::services::plan_builder::{PlanRequest, build_plan_from_slots};
use crate::services::slot_extractor::SlotExtractor;

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// What the user said
    #[arg(required = true, num_args = 1..)]
    pub utterance: Vec<String>,

    /// Conversation id used to seed the simulated catalog
    #[arg(long, default_value = "cli")]
    pub conversation: String,
}

#[derive(Debug, Serialize)]
pub struct PlanOutput {
    pub slots: SlotRecord,
    /// Slots that were missing and filled with defaults.
    pub assumed: Vec<SlotKey>,
    pub plan: Plan,
}

impl CommandOutput for PlanOutput {
    fn to_human(&self) -> String {
        let mut out = render_slots(&self.slots, None);
        if !self.assumed.is_empty() {
            let assumed: Vec<_> = self.assumed.iter().map(SlotKey::as_str).collect();
            out.push_str(&format!("\nassumed: {}", assumed.join(", ")));
        }
        out.push_str(&format!(
            "\n\n{} candidates considered in {}:\n{}",
            self.plan.candidates_considered,
            self.plan.city,
            render_options(&[&self.plan.main, &self.plan.backup])
        ));
        out
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: PlanArgs, config: &Config, json_mode: bool) -> Result<()> {
    let text = args.utterance.join(" ");
    let extractor = SlotExtractor::new().context("Failed to compile extraction patterns")?;
    let extraction = extractor.extract_slots(&text, &SlotRecord::default());

    let mut slots = extraction.slots;
    let missing = clarification_missing_slots(&slots, &extraction.evidence);
    let assumed = apply_assumptions_for_missing_slots(&mut slots, &missing, &config.orchestrator.default_city);

    let plan = build_plan_from_slots(
        &StaticCatalog::new(),
        PlanRequest {
            conversation_id: &args.conversation,
            slots: &slots,
        },
    )
    .context("No plan could be built for this request")?;

    output(&PlanOutput { slots, assumed, plan }, json_mode);
    Ok(())
}
