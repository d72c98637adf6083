//! Model field definitions

use std::fmt;
use std::sync::{Arc, Weak};

use crate::errors::{SchemaError, SchemaResult};
use crate::model::Model;
use crate::registry::Registry;
use crate::validation::{
    Check, RangeValidator, SelectionValidator, SizeValidator, TypeRef, Validator,
};
use crate::value::{EnumDef, Value, ValueKind};

/// Declared kind of a model field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Boolean,
    Integer,
    Float,
    String,
    UnixTimestamp,
    /// Record of the named model
    Related(String),
    List(Box<FieldKind>),
    /// Scalar restricted to a fixed set of values
    Selection {
        base: Box<FieldKind>,
        choices: Vec<Value>,
    },
    Enum(Arc<EnumDef>),
    /// Always holds the given value
    Constant(Value),
    /// Any value, unchecked
    Any,
}

/// Discriminant of [`FieldKind`], used as the derivation table key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldKindTag {
    Boolean,
    Integer,
    Float,
    String,
    UnixTimestamp,
    Related,
    List,
    Selection,
    Enum,
    Constant,
    Any,
}

impl FieldKindTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKindTag::Boolean => "boolean",
            FieldKindTag::Integer => "integer",
            FieldKindTag::Float => "float",
            FieldKindTag::String => "string",
            FieldKindTag::UnixTimestamp => "unix_timestamp",
            FieldKindTag::Related => "related",
            FieldKindTag::List => "list",
            FieldKindTag::Selection => "selection",
            FieldKindTag::Enum => "enum",
            FieldKindTag::Constant => "constant",
            FieldKindTag::Any => "any",
        }
    }
}

impl fmt::Display for FieldKindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FieldKind {
    pub fn tag(&self) -> FieldKindTag {
        match self {
            FieldKind::Boolean => FieldKindTag::Boolean,
            FieldKind::Integer => FieldKindTag::Integer,
            FieldKind::Float => FieldKindTag::Float,
            FieldKind::String => FieldKindTag::String,
            FieldKind::UnixTimestamp => FieldKindTag::UnixTimestamp,
            FieldKind::Related(_) => FieldKindTag::Related,
            FieldKind::List(_) => FieldKindTag::List,
            FieldKind::Selection { .. } => FieldKindTag::Selection,
            FieldKind::Enum(_) => FieldKindTag::Enum,
            FieldKind::Constant(_) => FieldKindTag::Constant,
            FieldKind::Any => FieldKindTag::Any,
        }
    }

    /// Builds the validator implied by the kind alone
    pub fn validator(&self) -> SchemaResult<Validator> {
        Ok(match self {
            FieldKind::Boolean => Validator::boolean(),
            FieldKind::Integer => Validator::integer(),
            FieldKind::Float => Validator::float(),
            FieldKind::String => Validator::string(),
            FieldKind::UnixTimestamp => Validator::timestamp(),
            FieldKind::Related(model) => Validator::typed(TypeRef::model(model.as_str())),
            FieldKind::List(element) => Validator::list(element.validator()?),
            FieldKind::Selection { base, choices } => base
                .validator()?
                .with_selection(SelectionValidator::new(choices.iter().cloned())?),
            FieldKind::Enum(def) => Validator::typed(TypeRef::Enum(def.name().to_string())),
            FieldKind::Constant(value) => Validator::new()
                .optional()
                .with_selection(SelectionValidator::new([value.clone()])?),
            FieldKind::Any => Validator::new(),
        })
    }

    fn value_kind(&self) -> Option<ValueKind> {
        match self {
            FieldKind::Boolean => Some(ValueKind::Bool),
            FieldKind::Integer => Some(ValueKind::Int),
            FieldKind::Float => Some(ValueKind::Float),
            FieldKind::String => Some(ValueKind::Str),
            FieldKind::UnixTimestamp => Some(ValueKind::Timestamp),
            _ => None,
        }
    }
}

/// A named, validated attribute of a model.
///
/// The owner is assigned when the owning model is built. Fields inherited
/// from a base model keep the base as owner.
#[derive(Debug, Clone)]
pub struct ModelField {
    name: String,
    owner: String,
    kind: FieldKind,
    validator: Validator,
    reject_writes: bool,
    definition_error: Option<SchemaError>,
}

impl ModelField {
    /// Creates a required field whose validator follows from its kind
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let (validator, definition_error) = match kind.validator() {
            Ok(validator) => (validator, None),
            Err(e) => (Validator::new(), Some(e)),
        };
        Self {
            name: name.into(),
            owner: String::new(),
            kind,
            validator,
            reject_writes: false,
            definition_error,
        }
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Float)
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::UnixTimestamp)
    }

    /// Record of the model named `model`, resolved through the registry
    pub fn related(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Related(model.into()))
    }

    /// Record of `model`, held directly so no registry is needed
    pub fn related_to(name: impl Into<String>, model: &Arc<Model>) -> Self {
        let mut field = Self::new(name, FieldKind::Related(model.name().to_string()));
        field.validator = Validator::typed(TypeRef::record_of(model));
        field
    }

    pub fn list(name: impl Into<String>, element: FieldKind) -> Self {
        Self::new(name, FieldKind::List(Box::new(element)))
    }

    pub fn selection<V: Into<Value>>(
        name: impl Into<String>,
        base: FieldKind,
        choices: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::new(
            name,
            FieldKind::Selection {
                base: Box::new(base),
                choices: choices.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn enumeration(name: impl Into<String>, def: Arc<EnumDef>) -> Self {
        Self::new(name, FieldKind::Enum(def))
    }

    pub fn constant(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(name, FieldKind::Constant(value.into()))
    }

    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Any)
    }

    pub fn optional(mut self) -> Self {
        self.validator = self.validator.optional();
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.validator = self.validator.required(required);
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.validator = self.validator.with_default(default);
        self
    }

    pub fn range(self, range: RangeValidator) -> Self {
        self.check(range)
    }

    pub fn length(self, size: SizeValidator) -> Self {
        self.check(size)
    }

    pub fn one_of<V: Into<Value>>(mut self, allowed: impl IntoIterator<Item = V>) -> Self {
        match SelectionValidator::new(allowed) {
            Ok(selection) => self.check(selection),
            Err(e) => {
                self.definition_error.get_or_insert(e);
                self
            }
        }
    }

    pub fn check(mut self, check: impl Into<Check>) -> Self {
        self.validator = self.validator.with_check(check);
        self
    }

    pub fn extra_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validator = self.validator.with_extra_check(check);
        self
    }

    /// Makes writes to a constant field fail instead of being ignored
    pub fn reject_writes(mut self) -> Self {
        self.reject_writes = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the model that declared the field
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn is_required(&self) -> bool {
        self.validator.is_required()
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.validator.default_value()
    }

    pub fn constant_value(&self) -> Option<&Value> {
        match &self.kind {
            FieldKind::Constant(value) => Some(value),
            _ => None,
        }
    }

    pub fn rejects_writes(&self) -> bool {
        self.reject_writes
    }

    /// Validates a value for this field, wrapping errors with the field name
    pub fn validate(&self, value: Option<Value>) -> SchemaResult<Option<Value>> {
        self.validator
            .validate(value)
            .map_err(|e| e.in_field(self.name.as_str()))
    }

    pub(crate) fn assign_owner(&mut self, owner: &str) {
        if self.owner.is_empty() {
            self.owner = owner.to_string();
        }
    }

    pub(crate) fn definition_check(&self) -> SchemaResult<()> {
        if self.name.is_empty() {
            return Err(SchemaError::InvalidDefinition("field name is empty".into()));
        }
        if let Some(err) = &self.definition_error {
            return Err(err.clone().in_field(self.name.as_str()));
        }
        if let (Some(default), Some(kind)) = (self.default_value(), self.kind.value_kind()) {
            if !kind.accepts(default.kind()) {
                return Err(SchemaError::InvalidDefinition(format!(
                    "default of field '{}' is {}, expected {}",
                    self.name,
                    default.type_description(),
                    kind
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn bind(&self, registry: &Weak<Registry>, owner: &str) {
        self.validator.bind(registry, owner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_kind_tags() {
        assert_eq!(FieldKind::Integer.tag(), FieldKindTag::Integer);
        assert_eq!(
            FieldKind::List(Box::new(FieldKind::String)).tag().as_str(),
            "list"
        );
        assert_eq!(FieldKind::Constant(Value::from("x")).tag(), FieldKindTag::Constant);
    }

    #[test]
    fn test_field_validation_is_wrapped() {
        let field = ModelField::integer("age").range(RangeValidator::at_least(0).unwrap());
        let err = field.validate(Some(Value::Int(-1))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
        assert_eq!(err.path(), "age");
    }

    #[test]
    fn test_selection_kind_validator() {
        let field = ModelField::selection("type", FieldKind::String, ["private", "group"]);
        assert!(field.validate(Some(Value::from("group"))).is_ok());
        assert_eq!(
            field.validate(Some(Value::from("x"))).unwrap_err().kind(),
            ErrorKind::NotInSelection
        );
    }

    #[test]
    fn test_empty_selection_is_definition_error() {
        let field = ModelField::string("type").one_of(Vec::<Value>::new());
        assert_eq!(
            field.definition_check().unwrap_err().kind(),
            ErrorKind::InvalidDefinition
        );
    }

    #[test]
    fn test_float_field_stores_floats() {
        let field = ModelField::float("lat");
        assert_eq!(field.validate(Some(Value::Int(3))).unwrap(), Some(Value::Float(3.0)));
    }

    #[test]
    fn test_related_to_checks_the_model() {
        let user = Model::builder("User")
            .field(ModelField::integer("id"))
            .build()
            .unwrap();
        let field = ModelField::related_to("from", &user);
        assert_eq!(field.kind(), &FieldKind::Related("User".into()));

        let record = user.construct([("id", Value::Int(1))]).unwrap();
        assert!(field.validate(Some(Value::Record(record))).is_ok());
        let err = field.validate(Some(Value::Int(1))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(err.path(), "from");
    }

    #[test]
    fn test_default_type_is_checked_at_definition() {
        let field = ModelField::integer("count").with_default("three");
        assert!(field.definition_check().is_err());
        assert!(ModelField::float("ratio").with_default(1).definition_check().is_ok());
    }
}
