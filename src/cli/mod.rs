//! CLI module for wireform
//!
//! Provides command-line interface for:
//! - check: decode a JSON payload with a registered schema and re-encode it
//! - list: print the schemas a document registers

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{check, check_payload, list, load_registry, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_payload, write_error, write_response};
