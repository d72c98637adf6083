//! Serializer fields
//!
//! A serializer field maps one record attribute to one wire key. Its
//! validator runs against the wire value; `from_wire` and `to_wire` convert
//! between wire and record representations.
//!
//! Conversions by kind:
//!
//! | kind            | wire           | record            |
//! |-----------------|----------------|-------------------|
//! | boolean         | bool           | bool              |
//! | integer         | int            | int               |
//! | float           | int or float   | float             |
//! | string          | string         | string            |
//! | unix_timestamp  | int seconds    | timestamp (UTC)   |
//! | void            | null           | absent            |
//! | constant        | ignored        | constant          |
//! | related         | object         | record            |
//! | list            | array          | list              |
//! | enum            | member wire    | enum member       |

use std::sync::{Arc, Weak};

use chrono::{TimeZone, Utc};
use serde_json::Value as Json;

use crate::errors::{SchemaError, SchemaResult};
use crate::registry::{Registry, SchemaRef};
use crate::validation::{
    Check, RangeValidator, SelectionValidator, SizeValidator, Validator,
};
use crate::value::{float_to_json, EnumDef, Value, ValueKind};

use super::Serializable;
use super::Serializer;

#[derive(Debug, Clone)]
pub enum SerializerFieldKind {
    Boolean,
    Integer,
    Float,
    String,
    UnixTimestamp,
    Void,
    Constant(Value),
    /// Nested serializer or dispatcher
    Related(SchemaRef<dyn Serializable>),
    List(Box<SerializerField>),
    Enum(Arc<EnumDef>),
}

impl SerializerFieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SerializerFieldKind::Boolean => "boolean",
            SerializerFieldKind::Integer => "integer",
            SerializerFieldKind::Float => "float",
            SerializerFieldKind::String => "string",
            SerializerFieldKind::UnixTimestamp => "unix_timestamp",
            SerializerFieldKind::Void => "void",
            SerializerFieldKind::Constant(_) => "constant",
            SerializerFieldKind::Related(_) => "related",
            SerializerFieldKind::List(_) => "list",
            SerializerFieldKind::Enum(_) => "enum",
        }
    }

    fn wire_validator(&self) -> SchemaResult<Validator> {
        Ok(match self {
            SerializerFieldKind::Boolean => Validator::boolean(),
            SerializerFieldKind::Integer | SerializerFieldKind::UnixTimestamp => {
                Validator::integer()
            }
            SerializerFieldKind::Float => Validator::float(),
            SerializerFieldKind::String => Validator::string(),
            SerializerFieldKind::Void | SerializerFieldKind::Constant(_) => {
                Validator::new().optional()
            }
            SerializerFieldKind::Related(_) => Validator::typed(ValueKind::Map),
            SerializerFieldKind::List(element) => Validator::list(element.validator.clone()),
            SerializerFieldKind::Enum(def) => {
                Validator::new().with_selection(SelectionValidator::new(def.wire_values())?)
            }
        })
    }
}

#[derive(Debug, Clone)]
pub struct SerializerField {
    attribute: String,
    wire_key: Option<String>,
    kind: SerializerFieldKind,
    validator: Validator,
    read_only: bool,
    write_only: bool,
    definition_error: Option<SchemaError>,
}

impl SerializerField {
    pub fn new(attribute: impl Into<String>, kind: SerializerFieldKind) -> Self {
        let (validator, definition_error) = match kind.wire_validator() {
            Ok(validator) => (validator, None),
            Err(e) => (Validator::new(), Some(e)),
        };
        Self {
            attribute: attribute.into(),
            wire_key: None,
            kind,
            validator,
            read_only: false,
            write_only: false,
            definition_error,
        }
    }

    pub fn boolean(attribute: impl Into<String>) -> Self {
        Self::new(attribute, SerializerFieldKind::Boolean)
    }

    pub fn integer(attribute: impl Into<String>) -> Self {
        Self::new(attribute, SerializerFieldKind::Integer)
    }

    pub fn float(attribute: impl Into<String>) -> Self {
        Self::new(attribute, SerializerFieldKind::Float)
    }

    pub fn string(attribute: impl Into<String>) -> Self {
        Self::new(attribute, SerializerFieldKind::String)
    }

    pub fn timestamp(attribute: impl Into<String>) -> Self {
        Self::new(attribute, SerializerFieldKind::UnixTimestamp)
    }

    pub fn void(attribute: impl Into<String>) -> Self {
        Self::new(attribute, SerializerFieldKind::Void)
    }

    pub fn constant(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(attribute, SerializerFieldKind::Constant(value.into()))
    }

    pub fn related(attribute: impl Into<String>, target: SchemaRef<dyn Serializable>) -> Self {
        Self::new(attribute, SerializerFieldKind::Related(target))
    }

    /// Related field resolved by name through the registry on first use
    pub fn related_named(attribute: impl Into<String>, name: impl Into<String>) -> Self {
        Self::related(attribute, SchemaRef::named(name))
    }

    /// Related field holding a direct handle to a serializer
    pub fn nested(attribute: impl Into<String>, serializer: &Arc<Serializer>) -> Self {
        let target: Arc<dyn Serializable> = Arc::clone(serializer) as Arc<dyn Serializable>;
        Self::related(attribute, SchemaRef::Direct(target))
    }

    /// List field applying `element` to every item. The element's attribute
    /// and wire key are ignored.
    pub fn list(attribute: impl Into<String>, element: SerializerField) -> Self {
        Self::new(attribute, SerializerFieldKind::List(Box::new(element)))
    }

    pub fn enumeration(attribute: impl Into<String>, def: Arc<EnumDef>) -> Self {
        Self::new(attribute, SerializerFieldKind::Enum(def))
    }

    /// Sets the wire key. Defaults to the attribute name.
    pub fn wire_key(mut self, key: impl Into<String>) -> Self {
        self.wire_key = Some(key.into());
        self
    }

    pub fn optional(self) -> Self {
        self.required(false)
    }

    /// Void fields are never required
    pub fn required(mut self, required: bool) -> Self {
        let required = required && !matches!(self.kind, SerializerFieldKind::Void);
        self.validator = self.validator.required(required);
        self
    }

    /// Sets the default, given in wire form
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.validator = self.validator.with_default(default);
        self
    }

    /// Decoded but never encoded
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Encoded but never decoded
    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    pub fn range(self, range: RangeValidator) -> Self {
        self.check(range)
    }

    pub fn length(self, size: SizeValidator) -> Self {
        self.check(size)
    }

    /// Restricts the wire value to a fixed set
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

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn key(&self) -> &str {
        self.wire_key.as_deref().unwrap_or(&self.attribute)
    }

    pub fn kind(&self) -> &SerializerFieldKind {
        &self.kind
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn is_required(&self) -> bool {
        self.validator.is_required()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_write_only(&self) -> bool {
        self.write_only
    }

    pub(crate) fn is_constant(&self) -> bool {
        matches!(self.kind, SerializerFieldKind::Constant(_))
    }

    pub(crate) fn is_void(&self) -> bool {
        matches!(self.kind, SerializerFieldKind::Void)
    }

    /// Fields that may appear without a model attribute of the same name
    pub(crate) fn is_detached(&self) -> bool {
        self.is_constant() || self.is_void()
    }

    pub(crate) fn definition_check(&self) -> SchemaResult<()> {
        if self.attribute.is_empty() {
            return Err(SchemaError::InvalidDefinition("field attribute is empty".into()));
        }
        self.kind_check()
            .map_err(|e| e.in_field(self.attribute.as_str()))
    }

    /// Definition errors of the field and of list elements, whose attribute is unused
    fn kind_check(&self) -> SchemaResult<()> {
        if let Some(err) = &self.definition_error {
            return Err(err.clone());
        }
        if let SerializerFieldKind::List(element) = &self.kind {
            element.kind_check()?;
        }
        Ok(())
    }

    /// Validates a possibly absent wire value and converts it for the record
    pub fn decode(&self, value: Option<Value>) -> SchemaResult<Option<Value>> {
        match self.validator.validate(value)? {
            Some(value) => self.from_wire(value).map(|v| Value::present(Some(v))),
            None => Ok(None),
        }
    }

    /// Converts a validated wire value into its record representation
    pub fn from_wire(&self, value: Value) -> SchemaResult<Value> {
        match &self.kind {
            SerializerFieldKind::Boolean
            | SerializerFieldKind::Integer
            | SerializerFieldKind::String => Ok(value),
            SerializerFieldKind::Float => match value {
                Value::Int(i) => Ok(Value::Float(i as f64)),
                other => Ok(other),
            },
            SerializerFieldKind::UnixTimestamp => {
                let seconds = value
                    .as_i64()
                    .ok_or_else(|| SchemaError::type_mismatch("int", value.type_description()))?;
                Utc.timestamp_opt(seconds, 0)
                    .single()
                    .map(Value::Timestamp)
                    .ok_or_else(|| SchemaError::OutOfRange {
                        value: seconds.to_string(),
                        bounds: "a representable unix timestamp".to_string(),
                    })
            }
            SerializerFieldKind::Void => Ok(Value::Null),
            SerializerFieldKind::Constant(constant) => Ok(constant.clone()),
            SerializerFieldKind::Related(target) => {
                let target = target.resolve()?;
                target
                    .decode_value(value)
                    .map(Value::Record)
                    .map_err(|e| e.in_type(target.name()))
            }
            SerializerFieldKind::List(element) => match value {
                Value::List(items) => items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| match item {
                        Value::Null => Ok(Value::Null),
                        item => element.from_wire(item).map_err(|e| e.at_index(i)),
                    })
                    .collect::<SchemaResult<Vec<_>>>()
                    .map(Value::List),
                other => Err(SchemaError::type_mismatch("list", other.type_description())),
            },
            SerializerFieldKind::Enum(def) => def
                .by_wire(&value)
                .map(Value::Enum)
                .ok_or_else(|| SchemaError::NotInSelection {
                    value: value.to_string(),
                    allowed: Value::List(def.wire_values()).to_string(),
                }),
        }
    }

    /// Converts a record value into wire JSON
    pub fn to_wire(&self, value: &Value, keep_none_fields: bool) -> SchemaResult<Json> {
        match (&self.kind, value) {
            (SerializerFieldKind::Void, _) => Ok(Json::Null),
            (SerializerFieldKind::Constant(constant), Value::Null) => constant.to_plain_json(),
            (SerializerFieldKind::Constant(_), value) => value.to_plain_json(),
            (_, Value::Null) => Ok(Json::Null),
            (SerializerFieldKind::Boolean, Value::Bool(b)) => Ok(Json::Bool(*b)),
            (SerializerFieldKind::Integer, Value::Int(i)) => Ok(Json::from(*i)),
            (SerializerFieldKind::Float, Value::Int(i)) => float_to_json(*i as f64),
            (SerializerFieldKind::Float, Value::Float(f)) => float_to_json(*f),
            (SerializerFieldKind::String, Value::Str(s)) => Ok(Json::String(s.clone())),
            (SerializerFieldKind::UnixTimestamp, Value::Timestamp(ts)) => {
                Ok(Json::from(ts.timestamp()))
            }
            (SerializerFieldKind::UnixTimestamp, Value::Int(i)) => Ok(Json::from(*i)),
            (SerializerFieldKind::Related(target), Value::Record(record)) => {
                let target = target.resolve()?;
                target
                    .to_representation(record, keep_none_fields)
                    .map_err(|e| e.in_type(target.name()))
            }
            (SerializerFieldKind::List(element), Value::List(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    element
                        .to_wire(item, keep_none_fields)
                        .map_err(|e| e.at_index(i))
                })
                .collect::<SchemaResult<Vec<_>>>()
                .map(Json::Array),
            (SerializerFieldKind::Enum(def), Value::Enum(member)) => {
                if member.enum_name() != def.name() {
                    return Err(SchemaError::type_mismatch(
                        format!("enum {}", def.name()),
                        value.type_description(),
                    ));
                }
                member.wire().to_plain_json()
            }
            (SerializerFieldKind::Enum(def), wire) if def.by_wire(wire).is_some() => {
                wire.to_plain_json()
            }
            (kind, other) => Err(SchemaError::type_mismatch(
                kind.as_str(),
                other.type_description(),
            )),
        }
    }

    pub(crate) fn bind(&self, registry: &Weak<Registry>, owner: &str) {
        match &self.kind {
            SerializerFieldKind::Related(target) => target.bind(registry, owner),
            SerializerFieldKind::List(element) => element.bind(registry, owner),
            _ => {}
        }
    }
}
