// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mnemos - long-term memory for conversations.
//!
//! This is the binary entry point. Every subcommand prints JSON on stdout;
//! logs go to stderr.

mod commands;
mod doctor;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mnemos_config::MnemosConfig;

use crate::commands::MemoryCommand;

/// Mnemos - long-term memory for conversations.
#[derive(Parser, Debug)]
#[command(name = "mnemos", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    #[command(flatten)]
    Memory(MemoryCommand),
    /// Check configuration, database and provider setup.
    Doctor,
}

fn load_config(path: Option<&PathBuf>) -> MnemosConfig {
    let loaded = match path {
        Some(path) => mnemos_config::load_and_validate_path(path),
        None => mnemos_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            mnemos_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mnemos={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());
    init_tracing(&config.agent.log_level);

    let result = match cli.command {
        Commands::Doctor => doctor::run_doctor(&config).await,
        Commands::Memory(command) => commands::run(command, &config).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_search_with_options() {
        let cli = Cli::try_parse_from([
            "mnemos", "search", "-c", "7", "what tea", "--limit", "3", "--no-connections",
        ])
        .unwrap();
        match cli.command {
            Commands::Memory(MemoryCommand::Search {
                conversation,
                query,
                limit,
                no_connections,
            }) => {
                assert_eq!(conversation, 7);
                assert_eq!(query, "what tea");
                assert_eq!(limit, Some(3));
                assert!(no_connections);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn input_conflicts_with_inline_turns() {
        let result = Cli::try_parse_from([
            "mnemos", "add", "-c", "1", "--user", "hi", "--input", "turns.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn doctor_is_its_own_command() {
        let cli = Cli::try_parse_from(["mnemos", "doctor"]).unwrap();
        assert!(matches!(cli.command, Commands::Doctor));
        let cli = Cli::try_parse_from(["mnemos", "summarize", "-c", "2"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Memory(MemoryCommand::Summarize { conversation: 2 })
        ));
    }

    #[test]
    fn global_config_flag_is_accepted_after_subcommand() {
        let cli = Cli::try_parse_from(["mnemos", "delete", "4", "--config", "/tmp/m.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/m.toml")));
    }
}
