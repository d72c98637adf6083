//! CLI command implementations
//!
//! Commands compute a JSON result; [`run_command`] writes it as the
//! `{"status": "ok"}` response, or writes the error response and fails.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::config::EngineConfig;
use crate::loader::SchemaLoader;
use crate::observability::{log_event_with_fields, Event};
use crate::registry::Registry;
use crate::serializer::Serializable;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_payload, write_error, write_response};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    let command = cmd.name();
    let result = match cmd {
        Command::Check {
            schema,
            serializer,
            input,
            drop_nulls,
            config,
        } => check(
            &schema,
            &serializer,
            input.as_deref(),
            drop_nulls,
            config.as_deref(),
        ),
        Command::List { schema } => list(&schema),
    };

    match result {
        Ok(data) => write_response(data),
        Err(e) => {
            log_event_with_fields(
                Event::CliCommandFailed,
                &[
                    ("command", command),
                    ("code", e.code_str()),
                    ("message", e.message()),
                ],
            );
            write_error(&e)?;
            Err(e)
        }
    }
}

/// Decodes the payload with the named serializer or dispatcher, then
/// re-encodes the decoded records.
pub fn check(
    schema: &Path,
    serializer: &str,
    input: Option<&Path>,
    drop_nulls: bool,
    config_path: Option<&Path>,
) -> CliResult<Value> {
    let config = match config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    config.apply();

    let registry = load_registry(schema, &config)?;
    let payload = read_payload(input)?;
    check_payload(
        &registry,
        serializer,
        &payload,
        config.keep_none_fields && !drop_nulls,
    )
}

/// Converts a payload, an object or an array of objects, both ways
pub fn check_payload(
    registry: &Registry,
    serializer: &str,
    payload: &Value,
    keep_none_fields: bool,
) -> CliResult<Value> {
    let target = registry
        .serializable(serializer)
        .ok_or_else(|| CliError::unknown_schema(serializer))?;

    let (encoded, count) = if payload.is_array() {
        let records = target.to_object_many(payload)?;
        let encoded = target.to_representation_many(&records, keep_none_fields)?;
        (encoded, records.len())
    } else {
        let record = target.to_object(payload)?;
        (target.to_representation(&record, keep_none_fields)?, 1)
    };

    let count = count.to_string();
    log_event_with_fields(
        Event::CliCheckComplete,
        &[("serializer", target.name()), ("records", count.as_str())],
    );
    Ok(encoded)
}

/// Lists the schemas a document (or directory of documents) registers
pub fn list(schema: &Path) -> CliResult<Value> {
    let registry = load_registry(schema, &EngineConfig::default())?;
    Ok(json!({
        "enums": registry.enum_names(),
        "models": registry.model_names(),
        "serializers": registry.serializer_names(),
        "dispatchers": registry.dispatcher_names(),
    }))
}

/// Builds a registry from one schema file or a directory of them
pub fn load_registry(schema: &Path, config: &EngineConfig) -> CliResult<Arc<Registry>> {
    let loader = if schema.is_dir() {
        let mut loader = SchemaLoader::new(schema);
        loader.load_all()?;
        loader
    } else {
        let mut loader = SchemaLoader::in_memory();
        loader.load_file(schema)?;
        loader
    };
    Ok(loader.build(config)?)
}
