//! In-memory value tree
//!
//! A [`Value`] is what validators inspect, what records store and what
//! serializer fields convert to and from the wire. Wire JSON enters through
//! [`Value::from_json`]; plain values leave through [`Value::to_plain_json`].
//!
//! Supported kinds:
//! - null: absent value (never stored in a record)
//! - bool, int (64-bit signed), float (64-bit)
//! - string: UTF-8 string
//! - timestamp: UTC date-time
//! - list: ordered values
//! - map: raw JSON object, before it is converted to a record
//! - record: validated instance of a model
//! - enum: member of a named enum definition

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::{Number, Value as Json};

use crate::errors::{SchemaError, SchemaResult};
use crate::model::Record;

/// A value held by a record or passed through a validator
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Timestamp(DateTime<Utc>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Record(Record),
    Enum(EnumValue),
}

/// The runtime kind of a [`Value`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Float,
    Str,
    Timestamp,
    List,
    Map,
    Record,
    Enum,
}

impl ValueKind {
    /// Returns the kind name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Str => "string",
            ValueKind::Timestamp => "timestamp",
            ValueKind::List => "list",
            ValueKind::Map => "object",
            ValueKind::Record => "record",
            ValueKind::Enum => "enum",
        }
    }

    /// Returns whether a value of kind `other` may stand where `self` is declared
    pub fn accepts(&self, other: ValueKind) -> bool {
        *self == other || (*self == ValueKind::Float && other == ValueKind::Int)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

impl Value {
    /// Returns the runtime kind
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
            Value::Timestamp(_) => ValueKind::Timestamp,
            Value::List(_) => ValueKind::List,
            Value::Map(_) => ValueKind::Map,
            Value::Record(_) => ValueKind::Record,
            Value::Enum(_) => ValueKind::Enum,
        }
    }

    /// Returns a short description of the value's type for error messages.
    ///
    /// Records and enums report their schema name.
    pub fn type_description(&self) -> String {
        match self {
            Value::Record(record) => format!("record {}", record.model_name()),
            Value::Enum(member) => format!("enum {}", member.enum_name()),
            other => other.kind().type_name().to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Converts `Some(Null)` to `None`
    pub fn present(value: Option<Value>) -> Option<Value> {
        match value {
            Some(Value::Null) | None => None,
            some => some,
        }
    }

    /// Converts wire JSON into a value tree.
    ///
    /// Numbers that fit `i64` become `Int`; every other number becomes `Float`.
    pub fn from_json(json: &Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::Str(s.clone()),
            Json::Array(items) => Value::List(items.iter().map(Value::from_json).collect()),
            Json::Object(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts a plain value back to JSON.
    ///
    /// Timestamps become unix seconds and enum members their wire value.
    /// Records need a serializer and are rejected here.
    pub fn to_plain_json(&self) -> SchemaResult<Json> {
        match self {
            Value::Null => Ok(Json::Null),
            Value::Bool(b) => Ok(Json::Bool(*b)),
            Value::Int(i) => Ok(Json::from(*i)),
            Value::Float(f) => float_to_json(*f),
            Value::Str(s) => Ok(Json::String(s.clone())),
            Value::Timestamp(ts) => Ok(Json::from(ts.timestamp())),
            Value::List(items) => items
                .iter()
                .map(Value::to_plain_json)
                .collect::<SchemaResult<Vec<_>>>()
                .map(Json::Array),
            Value::Map(map) => {
                let mut out = serde_json::Map::new();
                for (key, value) in map {
                    out.insert(key.clone(), value.to_plain_json()?);
                }
                Ok(Json::Object(out))
            }
            Value::Enum(member) => member.wire().to_plain_json(),
            Value::Record(record) => Err(SchemaError::type_mismatch(
                "plain value",
                format!("record {}", record.model_name()),
            )),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a float; integers widen
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumValue> {
        match self {
            Value::Enum(member) => Some(member),
            _ => None,
        }
    }
}

/// Converts a float to a JSON number, rejecting NaN and infinities
pub(crate) fn float_to_json(f: f64) -> SchemaResult<Json> {
    Number::from_f64(f)
        .map(Json::Number)
        .ok_or_else(|| SchemaError::type_mismatch("finite float", f.to_string()))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Record(record) => write!(f, "<{}>", record.model_name()),
            Value::Enum(member) => write!(f, "{}.{}", member.enum_name(), member.member()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(ts: DateTime<Utc>) -> Self {
        Value::Timestamp(ts)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(record)
    }
}

impl From<EnumValue> for Value {
    fn from(member: EnumValue) -> Self {
        Value::Enum(member)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// A named enum with members mapped to wire values
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDef {
    name: String,
    members: Vec<(String, Value)>,
}

impl EnumDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    /// Adds a member. The wire value must be a string or an integer.
    pub fn member(mut self, name: impl Into<String>, wire: impl Into<Value>) -> SchemaResult<Self> {
        let name = name.into();
        let wire = wire.into();

        if !matches!(wire, Value::Str(_) | Value::Int(_)) {
            return Err(SchemaError::InvalidDefinition(format!(
                "enum '{}' member '{}' must map to a string or int, got {}",
                self.name,
                name,
                wire.kind()
            )));
        }
        if self.members.iter().any(|(n, w)| *n == name || *w == wire) {
            return Err(SchemaError::DuplicateName(format!("{}.{}", self.name, name)));
        }

        self.members.push((name, wire));
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Looks up a member by name
    pub fn value(&self, member: &str) -> Option<EnumValue> {
        self.members
            .iter()
            .find(|(name, _)| name == member)
            .map(|(name, wire)| self.make(name, wire))
    }

    /// Looks up a member by its wire value
    pub fn by_wire(&self, wire: &Value) -> Option<EnumValue> {
        self.members
            .iter()
            .find(|(_, w)| w == wire)
            .map(|(name, w)| self.make(name, w))
    }

    /// All wire values, in member order
    pub fn wire_values(&self) -> Vec<Value> {
        self.members.iter().map(|(_, wire)| wire.clone()).collect()
    }

    /// All members, in declaration order
    pub fn values(&self) -> Vec<EnumValue> {
        self.members
            .iter()
            .map(|(name, wire)| self.make(name, wire))
            .collect()
    }

    fn make(&self, member: &str, wire: &Value) -> EnumValue {
        EnumValue {
            enum_name: self.name.clone(),
            member: member.to_string(),
            wire: Box::new(wire.clone()),
        }
    }
}

/// A member of an [`EnumDef`]
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    enum_name: String,
    member: String,
    wire: Box<Value>,
}

impl EnumValue {
    pub fn enum_name(&self) -> &str {
        &self.enum_name
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    pub fn wire(&self) -> &Value {
        &self.wire
    }
}
