//! CLI argument definitions using clap
//!
//! Commands:
//! - proxemo evaluate --state <path> [--config <path>] [--ignore-manual]
//! - proxemo expand --device <id> [--config <path>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// proxemo - decides which UI components each co-present device shows
#[derive(Parser, Debug)]
#[command(name = "proxemo")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the engine once over a session state file
    Evaluate {
        /// Path to the session state JSON
        #[arg(long)]
        state: PathBuf,

        /// Path to configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Recompute even if the local instance carries a manual distribution
        #[arg(long)]
        ignore_manual: bool,
    },

    /// Expand a capability descriptor read from stdin
    Expand {
        /// Device the descriptor belongs to
        #[arg(long)]
        device: String,

        /// Path to configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_evaluate() {
        let cli = Cli::parse_from(["proxemo", "evaluate", "--state", "session.json", "--ignore-manual"]);
        match cli.command {
            Command::Evaluate {
                state,
                config,
                ignore_manual,
            } => {
                assert_eq!(state, PathBuf::from("session.json"));
                assert!(config.is_none());
                assert!(ignore_manual);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_expand() {
        let cli = Cli::parse_from(["proxemo", "expand", "--device", "d-1", "--config", "proxemo.json"]);
        match cli.command {
            Command::Expand { device, config } => {
                assert_eq!(device, "d-1");
                assert_eq!(config, Some(PathBuf::from("proxemo.json")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
