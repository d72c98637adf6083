//! Validated record instances

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::errors::{SchemaError, SchemaResult};
use crate::value::{EnumValue, Value};

use super::definition::Model;

/// An instance of a [`Model`] holding validated values.
///
/// Values are stored in model field order. A record is only mutated through
/// [`Record::set_field`], which validates before storing.
#[derive(Clone)]
pub struct Record {
    model: Arc<Model>,
    values: Vec<Option<Value>>,
}

impl Record {
    pub(crate) fn new(model: Arc<Model>, values: Vec<Option<Value>>) -> Self {
        Self { model, values }
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// True when the record's model is `name` or was composed from it
    pub fn is_a(&self, name: &str) -> bool {
        self.model.is_a(name)
    }

    /// Returns the value of an attribute, `None` when absent or undeclared
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.model
            .position(name)
            .and_then(|i| self.values[i].as_ref())
    }

    /// Returns the value of an attribute that must be present
    pub fn require(&self, name: &str) -> SchemaResult<&Value> {
        let position = self
            .model
            .position(name)
            .ok_or_else(|| SchemaError::unknown_field(self.model.name(), name))?;
        self.values[position]
            .as_ref()
            .ok_or_else(|| SchemaError::MissingRequiredValue.in_field(name))
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_timestamp(&self, name: &str) -> Option<&DateTime<Utc>> {
        self.get(name).and_then(Value::as_timestamp)
    }

    pub fn get_list(&self, name: &str) -> Option<&[Value]> {
        self.get(name).and_then(Value::as_list)
    }

    pub fn get_record(&self, name: &str) -> Option<&Record> {
        self.get(name).and_then(Value::as_record)
    }

    pub fn get_enum(&self, name: &str) -> Option<&EnumValue> {
        self.get(name).and_then(Value::as_enum)
    }

    /// Iterates attributes in model order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.model
            .fields()
            .iter()
            .zip(self.values.iter())
            .map(|(field, value)| (field.name(), value.as_ref()))
    }

    /// Validates and stores a value. On failure the record is unchanged.
    ///
    /// Writing `Value::Null` clears an optional attribute. Writes to a
    /// constant field are ignored, or rejected with `ConstantField` when the
    /// field was declared with `reject_writes`.
    pub fn set_field(&mut self, name: &str, value: impl Into<Value>) -> SchemaResult<()> {
        let position = self
            .model
            .position(name)
            .ok_or_else(|| SchemaError::unknown_field(self.model.name(), name))?;
        let field = &self.model.fields()[position];

        if field.constant_value().is_some() {
            if field.rejects_writes() {
                return Err(SchemaError::ConstantField(name.to_string()));
            }
            return Ok(());
        }

        let validated = field.validate(Some(value.into()))?;
        self.values[position] = validated;
        Ok(())
    }

    /// Re-runs every field's validator against the current values
    pub fn self_validate(&self) -> SchemaResult<()> {
        for (field, value) in self.model.fields().iter().zip(self.values.iter()) {
            field.validate(value.clone())?;
        }
        Ok(())
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        (Arc::ptr_eq(&self.model, &other.model) || self.model.name() == other.model.name())
            && self.values == other.values
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.model.name());
        for (name, value) in self.iter() {
            s.field(name, &value);
        }
        s.finish()
    }
}

/// Conversion from a record into an application type
pub trait FromRecord: Sized {
    fn from_record(record: &Record) -> SchemaResult<Self>;
}

/// Conversion from an application type into a record of the given model
pub trait IntoRecord {
    fn into_record(&self, model: &Arc<Model>) -> SchemaResult<Record>;
}

impl FromRecord for Record {
    fn from_record(record: &Record) -> SchemaResult<Self> {
        Ok(record.clone())
    }
}

impl IntoRecord for Record {
    fn into_record(&self, model: &Arc<Model>) -> SchemaResult<Record> {
        if !self.is_a(model.name()) {
            return Err(SchemaError::type_mismatch(
                format!("record {}", model.name()),
                format!("record {}", self.model_name()),
            ));
        }
        Ok(self.clone())
    }
}
