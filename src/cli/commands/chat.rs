//! Interactive conversation over stdin.

use anyhow::Result;
use clap::Args;
use console::style;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::cli::commands::{TurnView, build_orchestrator, render_options, render_slots};
use crate::cli::display::colorize_mode;
use crate::cli::output::{CommandOutput, output};
use crate::domain::errors::DomainResult;
use crate::domain::models::{Config, ConversationContext};
use crate::services::event_bus::OrchestratorEvent;
use crate::services::orchestrator::{ConversationOrchestrator, TurnOutcome};

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Conversation id
    #[arg(long, default_value = "cli")]
    pub conversation: String,

    /// Print step progress events while runs execute
    #[arg(long)]
    pub progress: bool,
}

/// Something to send to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatAction {
    Say(String),
    Confirm,
    Select(&'static str),
    Cancel,
    ForceFailure(bool),
    Verify(bool),
    Handoff(String),
}

/// A parsed line of chat input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Action(ChatAction),
    Status,
    Help,
    Quit,
    Unknown(String),
}

impl ChatInput {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Some(Self::Action(ChatAction::Say(line.to_string())));
        };

        let (name, rest) = command
            .split_once(char::is_whitespace)
            .map_or((command, ""), |(name, rest)| (name, rest.trim()));
        let negative = matches!(rest, "off" | "no" | "false" | "reject");

        let action = match name {
            "confirm" | "yes" => ChatAction::Confirm,
            "main" => ChatAction::Select("main"),
            "backup" => ChatAction::Select("backup"),
            "cancel" => ChatAction::Cancel,
            "fail" => ChatAction::ForceFailure(!negative),
            "verify" => ChatAction::Verify(!negative),
            "handoff" | "human" => ChatAction::Handoff(rest.to_string()),
            "status" => return Some(Self::Status),
            "help" | "?" => return Some(Self::Help),
            "quit" | "exit" | "q" => return Some(Self::Quit),
            other => return Some(Self::Unknown(other.to_string())),
        };
        Some(Self::Action(action))
    }
}

const HELP: &str = "\
/confirm          run the selected option
/main, /backup    select a lane
/cancel           withdraw before running
/fail [off]       make the next run fail on purpose
/verify [no]      answer the payment verification
/handoff [why]    ask for a human agent
/status           show slots, plan and mode
/quit             leave";

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct StatusView(pub ConversationContext);

impl CommandOutput for StatusView {
    fn to_human(&self) -> String {
        let ctx = &self.0;
        let mut out = format!(
            "{} {} (asks {}, replans {})\n{}",
            style(&ctx.id).bold(),
            colorize_mode(ctx.mode.as_str()),
            ctx.ask_count,
            ctx.replan_count,
            render_slots(&ctx.slots, Some(&ctx.evidence))
        );
        if let Some(plan) = &ctx.plan {
            out.push('\n');
            out.push_str(&render_options(&[&plan.main, &plan.backup]));
            if let Some(pending) = ctx.pending_option {
                out.push_str(&format!("\nselected: {pending}"));
            }
        }
        if let Some(next) = ctx.next_step {
            out.push_str(&format!("\nnext: {}", next.as_str()));
        }
        out
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.0).unwrap_or_default()
    }
}

pub async fn execute(args: ChatArgs, config: &Config, json_mode: bool) -> Result<()> {
    let orchestrator = build_orchestrator(config)?;
    let conversation = args.conversation;

    if args.progress {
        spawn_progress_printer(&orchestrator);
    }
    if !json_mode {
        println!(
            "{} Type a request, or /help for commands.",
            style("concierge").cyan().bold()
        );
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(input) = ChatInput::parse(&line) else {
            continue;
        };

        let result = match input {
            ChatInput::Quit => break,
            ChatInput::Help => {
                println!("{HELP}");
                continue;
            }
            ChatInput::Unknown(name) => {
                eprintln!("{} unknown command /{name}", style("error:").red().bold());
                continue;
            }
            ChatInput::Status => {
                match orchestrator.snapshot(&conversation).await {
                    Ok(context) => output(&StatusView(context), json_mode),
                    Err(err) => eprintln!("{} {err}", style("error:").red().bold()),
                }
                continue;
            }
            ChatInput::Action(action) => dispatch(&orchestrator, &conversation, action).await,
        };

        match result {
            Ok(turn) => output(&TurnView(turn), json_mode),
            Err(err) => eprintln!("{} {err}", style("error:").red().bold()),
        }
    }

    Ok(())
}

async fn dispatch(
    orchestrator: &ConversationOrchestrator,
    conversation: &str,
    action: ChatAction,
) -> DomainResult<TurnOutcome> {
    match action {
        ChatAction::Say(text) => orchestrator.submit_utterance(conversation, &text).await,
        ChatAction::Confirm => orchestrator.confirm_execution(conversation).await,
        ChatAction::Select(option) => orchestrator.select_option(conversation, option).await,
        ChatAction::Cancel => orchestrator.cancel_confirmation(conversation).await,
        ChatAction::ForceFailure(enabled) => orchestrator.request_forced_failure(conversation, enabled).await,
        ChatAction::Verify(approved) => orchestrator.verify_second_factor(conversation, approved).await,
        ChatAction::Handoff(reason) => orchestrator.request_handoff(conversation, &reason).await,
    }
}

fn spawn_progress_printer(orchestrator: &ConversationOrchestrator) {
    let mut events = orchestrator.event_bus().subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(envelope) => match envelope.payload {
                    OrchestratorEvent::StepStarted { step, .. } => {
                        eprintln!("  {} {}", style("…").dim(), step.label());
                    }
                    OrchestratorEvent::StepDone { step, .. } => {
                        eprintln!("  {} {}", style("✓").green(), step.label());
                    }
                    OrchestratorEvent::StepFailed { step, code, .. } => {
                        eprintln!("  {} {} ({code})", style("✗").red(), step.label());
                    }
                    _ => {}
                },
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_utterance() {
        assert_eq!(
            ChatInput::parse("  dinner for two "),
            Some(ChatInput::Action(ChatAction::Say("dinner for two".to_string())))
        );
        assert_eq!(ChatInput::parse("   "), None);
    }

    #[test]
    fn test_parse_slash_commands() {
        let action = |a| Some(ChatInput::Action(a));
        assert_eq!(ChatInput::parse("/confirm"), action(ChatAction::Confirm));
        assert_eq!(ChatInput::parse("/backup"), action(ChatAction::Select("backup")));
        assert_eq!(ChatInput::parse("/fail"), action(ChatAction::ForceFailure(true)));
        assert_eq!(ChatInput::parse("/fail off"), action(ChatAction::ForceFailure(false)));
        assert_eq!(ChatInput::parse("/verify no"), action(ChatAction::Verify(false)));
        assert_eq!(
            ChatInput::parse("/handoff queue is too long"),
            action(ChatAction::Handoff("queue is too long".to_string()))
        );
        assert_eq!(ChatInput::parse("/status"), Some(ChatInput::Status));
        assert_eq!(ChatInput::parse("/dance"), Some(ChatInput::Unknown("dance".to_string())));
    }
}
