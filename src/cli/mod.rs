//! Command-line interface.

pub mod commands;
pub mod display;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::chat::ChatArgs;
use commands::config::ConfigArgs;
use commands::extract::ExtractArgs;
use commands::plan::PlanArgs;

#[derive(Parser, Debug)]
#[command(name = "concierge")]
#[command(about = "Concierge - conversational task orchestrator", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .concierge/config.yaml layering)
    #[arg(short, long, global = true, env = "CONCIERGE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Talk to the orchestrator interactively
    Chat(ChatArgs),
    /// Extract slots and build a plan for one utterance
    Plan(PlanArgs),
    /// Show the slots, evidence and missing slots for one utterance
    Extract(ExtractArgs),
    /// Print the effective configuration
    Config(ConfigArgs),
}

/// Print an error the way the selected output mode expects and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err:#}", console::style("error:").red().bold());
    }
    std::process::exit(1);
}
