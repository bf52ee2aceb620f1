// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Blockshop - a game server store that delivers purchases over the remote console.
//!
//! This is the binary entry point.

mod serve;
mod shutdown;

use std::path::PathBuf;

use blockshop_config::BlockshopConfig;
use clap::{Parser, Subcommand};

/// Blockshop - a game server store with guaranteed in-game delivery.
#[derive(Parser, Debug)]
#[command(name = "blockshop", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Run the console dispatcher, delivery queue and HTTP gateway (default).
    Serve,
    /// Load and validate the configuration, then exit.
    CheckConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => blockshop_config::load_and_validate_path(path),
        None => blockshop_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            blockshop_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Commands::CheckConfig => print_summary(&config),
    }
}

fn print_summary(config: &BlockshopConfig) {
    println!("blockshop: configuration is valid");
    println!("  rcon:     {}:{}", config.rcon.host, config.rcon.port);
    println!(
        "  delivery: {} (max_attempts={}, retry_delay={}s, offline_policy={:?})",
        if config.delivery.enabled { "enabled" } else { "disabled" },
        config.delivery.max_attempts,
        config.delivery.retry_delay_secs,
        config.delivery.offline_policy,
    );
    println!("  store:    {:?} delivery", config.store.delivery_mode);
    if config.gateway.enabled {
        println!("  gateway:  {}:{}", config.gateway.host, config.gateway.port);
    } else {
        println!("  gateway:  disabled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::parse_from(["blockshop"]);
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn parses_check_config_with_a_path() {
        let cli = Cli::parse_from(["blockshop", "check-config", "--config", "shop.toml"]);
        assert_eq!(cli.command, Some(Commands::CheckConfig));
        assert_eq!(cli.config, Some(PathBuf::from("shop.toml")));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn default_config_is_valid() {
        let config = blockshop_config::load_and_validate_str("").unwrap();
        assert_eq!(config.rcon.port, 25575);
    }
}
