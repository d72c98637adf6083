//! JSON I/O handling for CLI
//!
//! - Input: one JSON payload, from a file or stdin
//! - Output: one JSON object on stdout
//! - UTF-8 only

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use serde_json::{json, Value};

use super::errors::{CliError, CliResult};

/// Read a JSON payload from `path`, or from stdin when absent
pub fn read_payload(path: Option<&Path>) -> CliResult<Value> {
    let content = match path {
        Some(path) => fs::read_to_string(path).map_err(|e| {
            CliError::io_error(format!("failed to read {}: {}", path.display(), e))
        })?,
        None => {
            let mut content = String::new();
            io::stdin().lock().read_to_string(&mut content)?;
            content
        }
    };
    parse_payload(&content)
}

pub(crate) fn parse_payload(content: &str) -> CliResult<Value> {
    if content.trim().is_empty() {
        return Err(CliError::invalid_input("empty input"));
    }
    Ok(serde_json::from_str(content)?)
}

pub(crate) fn ok_response(data: Value) -> Value {
    json!({
        "status": "ok",
        "data": data
    })
}

pub(crate) fn error_response(err: &CliError) -> Value {
    json!({
        "status": "error",
        "code": err.code_str(),
        "message": err.message()
    })
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_line(&ok_response(data))
}

/// Write an error response to stdout
pub fn write_error(err: &CliError) -> CliResult<()> {
    write_line(&error_response(err))
}

fn write_line(response: &Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, response)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}
