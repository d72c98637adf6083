//! CLI argument definitions using clap
//!
//! Commands:
//! - wireform check --schema <path> --serializer <name> [--input <file>] [--drop-nulls] [--config <file>]
//! - wireform list --schema <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// wireform - validate and map JSON payloads against declarative schemas
#[derive(Parser, Debug)]
#[command(name = "wireform")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode a payload, then re-encode it
    Check {
        /// Schema document, or a directory of them
        #[arg(long)]
        schema: PathBuf,

        /// Serializer or dispatcher to convert with
        #[arg(long)]
        serializer: String,

        /// Payload file (stdin when omitted)
        #[arg(long)]
        input: Option<PathBuf>,

        /// Omit absent optional fields instead of emitting null
        #[arg(long)]
        drop_nulls: bool,

        /// Engine configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List the registered schemas
    List {
        /// Schema document, or a directory of them
        #[arg(long)]
        schema: PathBuf,
    },
}

impl Command {
    /// Subcommand name, as typed on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Command::Check { .. } => "check",
            Command::List { .. } => "list",
        }
    }
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
    fn test_parse_check() {
        let cli = Cli::try_parse_from([
            "wireform",
            "check",
            "--schema",
            "chat.json",
            "--serializer",
            "ChatSerializer",
            "--drop-nulls",
        ])
        .unwrap();

        match cli.command {
            Command::Check {
                schema,
                serializer,
                input,
                drop_nulls,
                config,
            } => {
                assert_eq!(schema, PathBuf::from("chat.json"));
                assert_eq!(serializer, "ChatSerializer");
                assert!(input.is_none());
                assert!(drop_nulls);
                assert!(config.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_command_names() {
        let cli = Cli::try_parse_from(["wireform", "list", "--schema", "schemas"]).unwrap();
        assert_eq!(cli.command.name(), "list");

        let cli = Cli::try_parse_from([
            "wireform",
            "check",
            "--schema",
            "schemas",
            "--serializer",
            "UserSerializer",
        ])
        .unwrap();
        assert_eq!(cli.command.name(), "check");
    }

    #[test]
    fn test_check_requires_serializer() {
        assert!(Cli::try_parse_from(["wireform", "check", "--schema", "chat.json"]).is_err());
    }
}
