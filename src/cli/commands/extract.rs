//! Slot extraction command.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use crate::cli::commands::render_slots;
use crate::cli::output::{CommandOutput, output};
use crate::domain::models::{SlotEvidence, SlotKey, SlotRecord};
use crate::services::clarification::{clarification_missing_slots, clarification_question};
use crate::services::slot_extractor::SlotExtractor;

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// What the user said
    #[arg(required = true, num_args = 1..)]
    pub utterance: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ExtractOutput {
    pub slots: SlotRecord,
    pub evidence: SlotEvidence,
    pub missing_slots: Vec<SlotKey>,
    pub question: Option<String>,
}

impl CommandOutput for ExtractOutput {
    fn to_human(&self) -> String {
        let mut out = render_slots(&self.slots, Some(&self.evidence));
        out.push_str("\n(* stated explicitly)");
        if let Some(question) = &self.question {
            let missing: Vec<_> = self.missing_slots.iter().map(SlotKey::as_str).collect();
            out.push_str(&format!("\nmissing: {}\nwould ask: {question}", missing.join(", ")));
        }
        out
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: ExtractArgs, json_mode: bool) -> Result<()> {
    let text = args.utterance.join(" ");
    let extractor = SlotExtractor::new().context("Failed to compile extraction patterns")?;
    let extraction = extractor.extract_slots(&text, &SlotRecord::default());

    let missing_slots = clarification_missing_slots(&extraction.slots, &extraction.evidence);
    let question =
        (!missing_slots.is_empty()).then(|| clarification_question(extraction.slots.intent, &missing_slots));

    output(
        &ExtractOutput {
            slots: extraction.slots,
            evidence: extraction.evidence,
            missing_slots,
            question,
        },
        json_mode,
    );
    Ok(())
}
