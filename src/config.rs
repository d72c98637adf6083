//! Engine configuration
//!
//! Loaded from a JSON file. Every field is optional:
//!
//! ```json
//! {
//!   "unmapped_field_policy": "warn",
//!   "keep_none_fields": true,
//!   "log_level": "warn"
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::errors::{SchemaError, SchemaResult};
use crate::observability::{log_event_with_fields, Event, Logger, Severity};
use crate::serializer::UnmappedFieldPolicy;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// What derivation does with unmapped field kinds (default: warn)
    #[serde(default)]
    pub unmapped_field_policy: UnmappedFieldPolicy,

    /// Emit `null` for absent optional fields when encoding (default: true)
    #[serde(default = "default_keep_none_fields")]
    pub keep_none_fields: bool,

    /// Minimum severity written to the log (default: warn)
    #[serde(default = "default_log_level")]
    pub log_level: Severity,
}

fn default_keep_none_fields() -> bool {
    true
}

fn default_log_level() -> Severity {
    Severity::Warn
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            unmapped_field_policy: UnmappedFieldPolicy::default(),
            keep_none_fields: default_keep_none_fields(),
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> SchemaResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            SchemaError::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> SchemaResult<Self> {
        let config: EngineConfig = serde_json::from_str(content)
            .map_err(|e| SchemaError::InvalidConfig(format!("invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> SchemaResult<()> {
        if self.log_level > Severity::Error {
            return Err(SchemaError::InvalidConfig(
                "log_level must be one of trace, info, warn, error".into(),
            ));
        }
        Ok(())
    }

    /// Installs the log threshold
    pub fn apply(&self) {
        Logger::set_threshold(self.log_level);
        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("keep_none_fields", if self.keep_none_fields { "true" } else { "false" }),
                ("log_level", self.log_level.as_str()),
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.keep_none_fields);
        assert_eq!(config.log_level, Severity::Warn);
        assert_eq!(config.unmapped_field_policy, UnmappedFieldPolicy::Warn);
    }

    #[test]
    fn test_explicit_values() {
        let config = EngineConfig::from_json_str(
            r#"{"unmapped_field_policy": "error", "keep_none_fields": false, "log_level": "info"}"#,
        )
        .unwrap();
        assert_eq!(config.unmapped_field_policy, UnmappedFieldPolicy::Error);
        assert!(!config.keep_none_fields);
        assert_eq!(config.log_level, Severity::Info);
    }

    #[test]
    fn test_rejects_unknown_keys_and_bad_values() {
        let err = EngineConfig::from_json_str(r#"{"keep_nulls": true}"#).unwrap_err();
        assert_eq!(err.code(), "WIRE_INVALID_CONFIG");

        assert!(EngineConfig::from_json_str(r#"{"log_level": "fatal"}"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{"unmapped_field_policy": "ignore"}"#).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"log_level": "error"}}"#).unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.log_level, Severity::Error);

        let missing = EngineConfig::load(Path::new("/nonexistent/wireform.json"));
        assert!(missing.is_err());
    }
}
