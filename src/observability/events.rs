//! Observable events
//!
//! Events are explicit and typed. Decoding and encoding never emit events;
//! only schema building, loading and the CLI do.

use std::fmt;

use super::logger::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Engine configuration loaded
    ConfigLoaded,
    /// One schema document parsed
    SchemaFileLoaded,
    /// Registry built from schema documents
    SchemasLoaded,
    /// Derivation skipped a model field with no serializer mapping
    SchemaFieldSkipped,
    /// CLI payload check passed
    CliCheckComplete,
    /// A CLI command failed
    CliCommandFailed,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::SchemaFileLoaded => "SCHEMA_FILE_LOADED",
            Event::SchemasLoaded => "SCHEMAS_LOADED",
            Event::SchemaFieldSkipped => "SCHEMA_FIELD_SKIPPED",
            Event::CliCheckComplete => "CLI_CHECK_COMPLETE",
            Event::CliCommandFailed => "CLI_COMMAND_FAILED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::SchemaFieldSkipped => Severity::Warn,
            Event::CliCommandFailed => Severity::Error,
            Event::ConfigLoaded
            | Event::SchemaFileLoaded
            | Event::SchemasLoaded
            | Event::CliCheckComplete => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(Event::SchemaFieldSkipped.as_str(), "SCHEMA_FIELD_SKIPPED");
        assert_eq!(Event::SchemasLoaded.to_string(), "SCHEMAS_LOADED");
        assert_eq!(Event::CliCommandFailed.as_str(), "CLI_COMMAND_FAILED");
    }

    #[test]
    fn test_event_severity() {
        assert_eq!(Event::SchemaFieldSkipped.severity(), Severity::Warn);
        assert_eq!(Event::CliCommandFailed.severity(), Severity::Error);
        assert_eq!(Event::SchemasLoaded.severity(), Severity::Info);
    }
}
