//! Mode, step and risk color mapping for CLI output.
//!
//! `console` disables styling when stdout is not a terminal or `NO_COLOR` is set.

use console::{StyledObject, style};

/// Color scheme:
/// - Green:  completed, done
/// - Yellow: executing, running, replanning
/// - Blue:   planning, confirming
/// - Cyan:   asking, parsing
/// - Red:    failed
/// - Dim:    idle, queued
pub fn colorize_mode(mode: &str) -> StyledObject<&str> {
    match mode {
        "completed" | "done" => style(mode).green().bold(),
        "executing" | "running" | "replanning" => style(mode).yellow(),
        "planning" | "confirming" => style(mode).blue(),
        "asking" | "parsing" => style(mode).cyan(),
        "failed" => style(mode).red().bold(),
        "idle" | "queued" => style(mode).dim(),
        _ => style(mode),
    }
}

pub fn colorize_step_status(status: &str) -> StyledObject<&str> {
    colorize_mode(status)
}

pub fn colorize_risk(risk: &str) -> StyledObject<&str> {
    match risk {
        "low" => style(risk).green(),
        "medium" => style(risk).yellow(),
        "high" => style(risk).red(),
        _ => style(risk),
    }
}
