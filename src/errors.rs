//! Error types for the schema engine
//!
//! Error codes:
//! - WIRE_MISSING_REQUIRED_VALUE
//! - WIRE_TYPE_MISMATCH
//! - WIRE_OUT_OF_RANGE
//! - WIRE_LENGTH_OUT_OF_RANGE
//! - WIRE_NOT_IN_SELECTION
//! - WIRE_UNKNOWN_VARIANT
//! - WIRE_FORWARD_REFERENCE_UNRESOLVED
//! - WIRE_EXTRA_CHECK_FAILED
//!
//! Definition-time codes (raised while building schemas, never while converting):
//! - WIRE_INVALID_DEFINITION
//! - WIRE_UNKNOWN_FIELD
//! - WIRE_UNMAPPED_FIELD_KIND
//! - WIRE_CONSTANT_FIELD
//! - WIRE_DUPLICATE_NAME
//! - WIRE_MALFORMED_SCHEMA
//! - WIRE_INVALID_CONFIG
//!
//! Errors raised inside nested records or list elements are wrapped with
//! positional context as they propagate. [`SchemaError::kind`] always reports
//! the innermost kind, and [`SchemaError::path`] renders the location.

use std::fmt;

use thiserror::Error;

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Kind of a schema error, independent of the context it was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Required value absent with no default
    MissingRequiredValue,
    /// Runtime kind disagrees with the declared type
    TypeMismatch,
    /// Numeric bound violated
    OutOfRange,
    /// Length bound violated
    LengthOutOfRange,
    /// Value outside the allowed set
    NotInSelection,
    /// No variant registered for a discriminator or tag
    UnknownVariant,
    /// Lazily bound schema could not be found
    ForwardReferenceUnresolved,
    /// Caller-supplied predicate rejected the value
    ExtraCheckFailed,
    /// Schema definition is inconsistent
    InvalidDefinition,
    /// Attribute not declared by the model
    UnknownField,
    /// Derivation table has no entry for a field kind
    UnmappedFieldKind,
    /// Write to a constant field that rejects writes
    ConstantField,
    /// Name registered twice
    DuplicateName,
    /// Schema document could not be read or parsed
    MalformedSchema,
    /// Engine configuration is invalid
    InvalidConfig,
}

impl ErrorKind {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::MissingRequiredValue => "WIRE_MISSING_REQUIRED_VALUE",
            ErrorKind::TypeMismatch => "WIRE_TYPE_MISMATCH",
            ErrorKind::OutOfRange => "WIRE_OUT_OF_RANGE",
            ErrorKind::LengthOutOfRange => "WIRE_LENGTH_OUT_OF_RANGE",
            ErrorKind::NotInSelection => "WIRE_NOT_IN_SELECTION",
            ErrorKind::UnknownVariant => "WIRE_UNKNOWN_VARIANT",
            ErrorKind::ForwardReferenceUnresolved => "WIRE_FORWARD_REFERENCE_UNRESOLVED",
            ErrorKind::ExtraCheckFailed => "WIRE_EXTRA_CHECK_FAILED",
            ErrorKind::InvalidDefinition => "WIRE_INVALID_DEFINITION",
            ErrorKind::UnknownField => "WIRE_UNKNOWN_FIELD",
            ErrorKind::UnmappedFieldKind => "WIRE_UNMAPPED_FIELD_KIND",
            ErrorKind::ConstantField => "WIRE_CONSTANT_FIELD",
            ErrorKind::DuplicateName => "WIRE_DUPLICATE_NAME",
            ErrorKind::MalformedSchema => "WIRE_MALFORMED_SCHEMA",
            ErrorKind::InvalidConfig => "WIRE_INVALID_CONFIG",
        }
    }

    /// Returns whether this kind is raised while building schemas rather
    /// than while converting values
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidDefinition
                | ErrorKind::UnmappedFieldKind
                | ErrorKind::DuplicateName
                | ErrorKind::MalformedSchema
                | ErrorKind::InvalidConfig
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Schema error with full context
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("required value is missing")]
    MissingRequiredValue,

    #[error("expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("value {value} must be {bounds}")]
    OutOfRange { value: String, bounds: String },

    #[error("length {length} must be {bounds}")]
    LengthOutOfRange { length: usize, bounds: String },

    #[error("value {value} is not one of {allowed}")]
    NotInSelection { value: String, allowed: String },

    #[error("unknown variant '{0}'")]
    UnknownVariant(String),

    #[error("reference to '{0}' could not be resolved")]
    ForwardReferenceUnresolved(String),

    #[error("extra check failed: {0}")]
    ExtraCheckFailed(String),

    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("'{owner}' has no field '{field}'")]
    UnknownField { owner: String, field: String },

    #[error("field '{field}' of kind '{kind}' has no serializer mapping")]
    UnmappedFieldKind { field: String, kind: String },

    #[error("constant field '{0}' can not be set")]
    ConstantField(String),

    #[error("'{0}' is already registered")]
    DuplicateName(String),

    #[error("malformed schema '{origin}': {reason}")]
    MalformedSchema { origin: String, reason: String },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("field '{field}': {source}")]
    InField {
        field: String,
        source: Box<SchemaError>,
    },

    #[error("index {index}: {source}")]
    AtIndex {
        index: usize,
        source: Box<SchemaError>,
    },

    #[error("in {type_name}: {source}")]
    InType {
        type_name: String,
        source: Box<SchemaError>,
    },
}

impl SchemaError {
    /// Create a type mismatch error
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        SchemaError::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an unknown field error
    pub fn unknown_field(owner: impl Into<String>, field: impl Into<String>) -> Self {
        SchemaError::UnknownField {
            owner: owner.into(),
            field: field.into(),
        }
    }

    /// Create a malformed schema error
    pub fn malformed_schema(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::MalformedSchema {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    /// Wrap with the attribute name of the field that raised it
    pub fn in_field(self, field: impl Into<String>) -> Self {
        SchemaError::InField {
            field: field.into(),
            source: Box::new(self),
        }
    }

    /// Wrap with the list index of the element that raised it
    pub fn at_index(self, index: usize) -> Self {
        SchemaError::AtIndex {
            index,
            source: Box::new(self),
        }
    }

    /// Wrap with the name of the nested schema that raised it
    pub fn in_type(self, type_name: impl Into<String>) -> Self {
        SchemaError::InType {
            type_name: type_name.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping context wrappers
    pub fn root(&self) -> &SchemaError {
        match self {
            SchemaError::InField { source, .. }
            | SchemaError::AtIndex { source, .. }
            | SchemaError::InType { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns the kind of the innermost error
    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            SchemaError::MissingRequiredValue => ErrorKind::MissingRequiredValue,
            SchemaError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            SchemaError::OutOfRange { .. } => ErrorKind::OutOfRange,
            SchemaError::LengthOutOfRange { .. } => ErrorKind::LengthOutOfRange,
            SchemaError::NotInSelection { .. } => ErrorKind::NotInSelection,
            SchemaError::UnknownVariant(_) => ErrorKind::UnknownVariant,
            SchemaError::ForwardReferenceUnresolved(_) => ErrorKind::ForwardReferenceUnresolved,
            SchemaError::ExtraCheckFailed(_) => ErrorKind::ExtraCheckFailed,
            SchemaError::InvalidDefinition(_) => ErrorKind::InvalidDefinition,
            SchemaError::UnknownField { .. } => ErrorKind::UnknownField,
            SchemaError::UnmappedFieldKind { .. } => ErrorKind::UnmappedFieldKind,
            SchemaError::ConstantField(_) => ErrorKind::ConstantField,
            SchemaError::DuplicateName(_) => ErrorKind::DuplicateName,
            SchemaError::MalformedSchema { .. } => ErrorKind::MalformedSchema,
            SchemaError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            // root() never returns a wrapper
            SchemaError::InField { .. }
            | SchemaError::AtIndex { .. }
            | SchemaError::InType { .. } => ErrorKind::InvalidDefinition,
        }
    }

    /// Returns the stable code of the innermost error
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// Renders the field path of the error, e.g. `chat.members[2].id`.
    ///
    /// Returns an empty string for errors raised at the top level.
    pub fn path(&self) -> String {
        let mut path = String::new();
        let mut current = self;

        loop {
            match current {
                SchemaError::InField { field, source } => {
                    if !path.is_empty() {
                        path.push('.');
                    }
                    path.push_str(field);
                    current = source;
                }
                SchemaError::AtIndex { index, source } => {
                    path.push_str(&format!("[{}]", index));
                    current = source;
                }
                SchemaError::InType { source, .. } => current = source,
                _ => return path,
            }
        }
    }
}

/// Describes inclusive bounds for error messages
pub(crate) fn describe_bounds<T: fmt::Display>(min: Option<T>, max: Option<T>) -> String {
    match (min, max) {
        (Some(min), Some(max)) => format!("between {} and {}", min, max),
        (Some(min), None) => format!("at least {}", min),
        (None, Some(max)) => format!("at most {}", max),
        (None, None) => "unbounded".to_string(),
    }
}
