//! Bidirectional mapping between records and wire JSON
//!
//! - [`SerializerField`]: one wire key, its validator and conversions
//! - [`Serializer`]: ordered fields bound to one model
//! - [`DerivationTable`]: builds serializer fields from model field kinds
//! - [`Dispatcher`]: routes tagged unions to concrete serializers
//!
//! Serializers and dispatchers share the [`Serializable`] interface, so a
//! related field can nest either.

mod derive;
mod dispatch;
mod field;
mod schema;

pub use derive::{DerivationTable, FieldFactory, UnmappedFieldPolicy};
pub use dispatch::{Dispatcher, DispatcherBuilder};
pub use field::{SerializerField, SerializerFieldKind};
pub use schema::{Serializer, SerializerBuilder};

use std::fmt;
use std::sync::Weak;

use serde_json::Value as Json;

use crate::errors::{SchemaError, SchemaResult};
use crate::model::Record;
use crate::registry::Registry;
use crate::value::Value;

/// A schema that converts between wire JSON and records
pub trait Serializable: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Decodes a wire object, already converted to a value tree
    fn decode_value(&self, value: Value) -> SchemaResult<Record>;

    /// Encodes a record into a wire object
    fn to_representation(&self, record: &Record, keep_none_fields: bool) -> SchemaResult<Json>;

    /// Attaches the registry that lazy references inside resolve through
    fn bind(&self, registry: &Weak<Registry>);

    /// Decodes wire JSON into a record
    fn to_object(&self, json: &Json) -> SchemaResult<Record> {
        self.decode_value(Value::from_json(json))
    }

    /// Decodes a wire array, preserving order
    fn to_object_many(&self, json: &Json) -> SchemaResult<Vec<Record>> {
        let items = json
            .as_array()
            .ok_or_else(|| SchemaError::type_mismatch("list", json_type(json)))?;
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.to_object(item).map_err(|e| e.at_index(i)))
            .collect()
    }

    /// Encodes records into a wire array, preserving order
    fn to_representation_many(
        &self,
        records: &[Record],
        keep_none_fields: bool,
    ) -> SchemaResult<Json> {
        records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                self.to_representation(record, keep_none_fields)
                    .map_err(|e| e.at_index(i))
            })
            .collect::<SchemaResult<Vec<_>>>()
            .map(Json::Array)
    }
}

/// Type name of a wire value, for error messages
pub(crate) fn json_type(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(n) if n.is_i64() => "int",
        Json::Number(_) => "float",
        Json::String(_) => "string",
        Json::Array(_) => "list",
        Json::Object(_) => "object",
    }
}
