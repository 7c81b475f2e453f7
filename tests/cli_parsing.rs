use clap::Parser;
use concierge::cli::{Cli, Commands};

#[test]
fn test_parse_plan_joins_utterance_words() {
    let cli = Cli::try_parse_from(["concierge", "plan", "dinner", "in", "Shanghai", "for", "2"]).unwrap();
    match cli.command {
        Commands::Plan(args) => {
            assert_eq!(args.utterance.join(" "), "dinner in Shanghai for 2");
            assert_eq!(args.conversation, "cli");
        }
        _ => panic!("Wrong command"),
    }
    assert!(!cli.json);
}

#[test]
fn test_parse_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from(["concierge", "extract", "帮我找餐厅", "--json", "--config", "alt.yaml"]).unwrap();
    assert!(cli.json);
    assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("alt.yaml")));
    assert!(matches!(cli.command, Commands::Extract(_)));
}

#[test]
fn test_parse_chat_options() {
    let cli = Cli::try_parse_from(["concierge", "chat", "--conversation", "demo", "--progress"]).unwrap();
    match cli.command {
        Commands::Chat(args) => {
            assert_eq!(args.conversation, "demo");
            assert!(args.progress);
        }
        _ => panic!("Wrong command"),
    }
}

#[test]
fn test_plan_requires_an_utterance() {
    assert!(Cli::try_parse_from(["concierge", "plan"]).is_err());
}

#[test]
fn test_config_command_parses() {
    let cli = Cli::try_parse_from(["concierge", "config"]).unwrap();
    assert!(matches!(cli.command, Commands::Config(_)));
}
