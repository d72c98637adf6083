//! Polymorphic dispatch
//!
//! A [`Dispatcher`] decodes a tagged union: it reads the discriminator from
//! the wire object and hands the whole object to the serializer registered
//! for that tag. Encoding reads the tag from the record, falling back to the
//! record's model when the record carries no tag.
//!
//! The variant set is closed once built.

use std::sync::{Arc, Weak};

use serde_json::Value as Json;

use crate::errors::{SchemaError, SchemaResult};
use crate::model::Record;
use crate::registry::Registry;
use crate::value::{Value, ValueKind};

use super::schema::Serializer;
use super::Serializable;

#[derive(Debug)]
pub struct Dispatcher {
    name: String,
    discriminator: String,
    attribute: String,
    variants: Vec<(Value, Arc<Serializer>)>,
}

impl Dispatcher {
    /// `discriminator` is the wire key carrying the tag
    pub fn builder(name: impl Into<String>, discriminator: impl Into<String>) -> DispatcherBuilder {
        DispatcherBuilder::new(name, discriminator)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn discriminator(&self) -> &str {
        &self.discriminator
    }

    /// Record attribute holding the tag
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn tags(&self) -> impl Iterator<Item = &Value> {
        self.variants.iter().map(|(tag, _)| tag)
    }

    /// Serializer registered for a tag
    pub fn variant(&self, tag: &Value) -> Option<&Arc<Serializer>> {
        let tag = normalize(tag);
        self.variants
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, serializer)| serializer)
    }

    pub fn decode(&self, json: &Json) -> SchemaResult<Record> {
        self.to_object(json)
    }

    pub fn encode(&self, record: &Record, keep_none_fields: bool) -> SchemaResult<Json> {
        self.to_representation(record, keep_none_fields)
    }

    /// Chooses the variant for a record: by its tag attribute when present,
    /// otherwise by its model
    fn variant_for(&self, record: &Record) -> SchemaResult<&Arc<Serializer>> {
        if let Some(tag) = record.get(&self.attribute) {
            return self
                .variant(tag)
                .ok_or_else(|| SchemaError::UnknownVariant(tag_label(tag)));
        }

        let name = record.model_name();
        self.variants
            .iter()
            .map(|(_, serializer)| serializer)
            .find(|serializer| serializer.model().name() == name)
            .or_else(|| {
                self.variants
                    .iter()
                    .map(|(_, serializer)| serializer)
                    .find(|serializer| record.is_a(serializer.model().name()))
            })
            .ok_or_else(|| SchemaError::UnknownVariant(name.to_string()))
    }
}

impl Serializable for Dispatcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn decode_value(&self, value: Value) -> SchemaResult<Record> {
        let tag = match &value {
            Value::Map(map) => match map.get(&self.discriminator) {
                None | Some(Value::Null) => {
                    return Err(SchemaError::MissingRequiredValue.in_field(self.discriminator.as_str()))
                }
                Some(tag @ (Value::Str(_) | Value::Int(_))) => tag.clone(),
                Some(other) if matches!(other, Value::List(_) | Value::Map(_)) => {
                    return Err(SchemaError::type_mismatch("string or int", other.type_description())
                        .in_field(self.discriminator.as_str()))
                }
                Some(other) => return Err(SchemaError::UnknownVariant(tag_label(other))),
            },
            other => {
                return Err(SchemaError::type_mismatch(
                    ValueKind::Map.type_name(),
                    other.type_description(),
                ))
            }
        };

        let serializer = self
            .variant(&tag)
            .ok_or_else(|| SchemaError::UnknownVariant(tag_label(&tag)))?;
        serializer.decode_value(value)
    }

    fn to_representation(&self, record: &Record, keep_none_fields: bool) -> SchemaResult<Json> {
        self.variant_for(record)?
            .to_representation(record, keep_none_fields)
    }

    fn bind(&self, registry: &Weak<Registry>) {
        for (_, serializer) in &self.variants {
            serializer.bind(registry);
        }
    }
}

/// Builder for [`Dispatcher`]
#[derive(Debug)]
pub struct DispatcherBuilder {
    name: String,
    discriminator: String,
    attribute: Option<String>,
    variants: Vec<(Value, Arc<Serializer>)>,
}

impl DispatcherBuilder {
    pub fn new(name: impl Into<String>, discriminator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            discriminator: discriminator.into(),
            attribute: None,
            variants: Vec::new(),
        }
    }

    /// Record attribute holding the tag. Defaults to the discriminator key.
    pub fn attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn variant(mut self, tag: impl Into<Value>, serializer: &Arc<Serializer>) -> Self {
        self.variants.push((tag.into(), Arc::clone(serializer)));
        self
    }

    pub fn build(self) -> SchemaResult<Arc<Dispatcher>> {
        if self.name.is_empty() || self.discriminator.is_empty() {
            return Err(SchemaError::InvalidDefinition(
                "dispatcher needs a name and a discriminator".into(),
            ));
        }
        if self.variants.is_empty() {
            return Err(SchemaError::InvalidDefinition(format!(
                "dispatcher '{}' has no variants",
                self.name
            )));
        }

        let mut variants: Vec<(Value, Arc<Serializer>)> = Vec::with_capacity(self.variants.len());
        for (tag, serializer) in self.variants {
            let tag = normalize(&tag);
            if !matches!(tag, Value::Str(_) | Value::Int(_)) {
                return Err(SchemaError::InvalidDefinition(format!(
                    "dispatcher '{}' tag {} must be a string or int",
                    self.name, tag
                )));
            }
            if variants.iter().any(|(t, _)| *t == tag) {
                return Err(SchemaError::DuplicateName(format!(
                    "{}[{}]",
                    self.name,
                    tag_label(&tag)
                )));
            }
            variants.push((tag, serializer));
        }

        let attribute = self.attribute.unwrap_or_else(|| self.discriminator.clone());
        Ok(Arc::new(Dispatcher {
            name: self.name,
            discriminator: self.discriminator,
            attribute,
            variants,
        }))
    }
}

/// Enum members dispatch on their wire value
fn normalize(tag: &Value) -> Value {
    match tag {
        Value::Enum(member) => member.wire().clone(),
        other => other.clone(),
    }
}

fn tag_label(tag: &Value) -> String {
    match normalize(tag) {
        Value::Str(s) => s,
        other => other.to_string(),
    }
}
