//! Serializer derivation from model fields
//!
//! A [`DerivationTable`] maps model field kinds to serializer field
//! factories. The standard table covers the scalar kinds, constants and
//! selections. Related, list and enum fields need a manual declaration or a
//! caller-registered factory.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{SchemaError, SchemaResult};
use crate::model::{FieldKind, FieldKindTag, ModelField};
use crate::value::Value;

use super::field::SerializerField;

/// Builds a serializer field for a model field
pub type FieldFactory = Arc<dyn Fn(&ModelField) -> SchemaResult<SerializerField> + Send + Sync>;

/// What derivation does with a model field whose kind has no factory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnmappedFieldPolicy {
    /// Skip the field and log a warning
    #[default]
    Warn,
    /// Fail with `UnmappedFieldKind`
    Error,
}

#[derive(Clone)]
pub struct DerivationTable {
    factories: HashMap<FieldKindTag, FieldFactory>,
}

impl Default for DerivationTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl DerivationTable {
    /// A table with no mappings
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// The standard table: boolean, integer, float, string, unix timestamp,
    /// constant and selection
    pub fn standard() -> Self {
        let mut table = Self::empty();
        for tag in [
            FieldKindTag::Boolean,
            FieldKindTag::Integer,
            FieldKindTag::Float,
            FieldKindTag::String,
            FieldKindTag::UnixTimestamp,
        ] {
            table.register(tag, |field: &ModelField| scalar(field.name(), field.kind()));
        }
        table.register(FieldKindTag::Constant, |field: &ModelField| match field.kind() {
            FieldKind::Constant(value) => Ok(SerializerField::constant(field.name(), value.clone())),
            other => Err(unmapped(field, other)),
        });
        table.register(FieldKindTag::Selection, |field: &ModelField| match field.kind() {
            FieldKind::Selection { base, choices } => {
                let base_field = scalar(field.name(), base)?;
                let wire_choices = choices
                    .iter()
                    .map(|choice| base_field.to_wire(choice, true).map(|j| Value::from_json(&j)))
                    .collect::<SchemaResult<Vec<_>>>()?;
                Ok(base_field.one_of(wire_choices))
            }
            other => Err(unmapped(field, other)),
        });
        table
    }

    /// Registers or replaces the factory for a kind
    pub fn register<F>(&mut self, tag: FieldKindTag, factory: F) -> &mut Self
    where
        F: Fn(&ModelField) -> SchemaResult<SerializerField> + Send + Sync + 'static,
    {
        self.factories.insert(tag, Arc::new(factory));
        self
    }

    /// Builder-style [`register`](Self::register)
    pub fn with<F>(mut self, tag: FieldKindTag, factory: F) -> Self
    where
        F: Fn(&ModelField) -> SchemaResult<SerializerField> + Send + Sync + 'static,
    {
        self.register(tag, factory);
        self
    }

    pub fn supports(&self, tag: FieldKindTag) -> bool {
        self.factories.contains_key(&tag)
    }

    /// Derives the serializer field for a model field.
    ///
    /// Returns `None` when the kind has no factory. Required-ness and the
    /// default are copied from the model field; the default is converted to
    /// its wire form.
    pub(crate) fn derive_field(&self, field: &ModelField) -> SchemaResult<Option<SerializerField>> {
        let factory = match self.factories.get(&field.kind().tag()) {
            Some(factory) => factory,
            None => return Ok(None),
        };

        let mut derived = factory(field)?.required(field.is_required());
        if let Some(default) = field.default_value() {
            let wire = derived
                .to_wire(default, true)
                .map_err(|e| e.in_field(field.name()))?;
            derived = derived.with_default(Value::from_json(&wire));
        }
        Ok(Some(derived))
    }
}

impl fmt::Debug for DerivationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.factories.keys().map(FieldKindTag::as_str).collect();
        tags.sort_unstable();
        f.debug_struct("DerivationTable").field("kinds", &tags).finish()
    }
}

fn scalar(name: &str, kind: &FieldKind) -> SchemaResult<SerializerField> {
    match kind {
        FieldKind::Boolean => Ok(SerializerField::boolean(name)),
        FieldKind::Integer => Ok(SerializerField::integer(name)),
        FieldKind::Float => Ok(SerializerField::float(name)),
        FieldKind::String => Ok(SerializerField::string(name)),
        FieldKind::UnixTimestamp => Ok(SerializerField::timestamp(name)),
        other => Err(SchemaError::UnmappedFieldKind {
            field: name.to_string(),
            kind: other.tag().to_string(),
        }),
    }
}

fn unmapped(field: &ModelField, kind: &FieldKind) -> SchemaError {
    SchemaError::UnmappedFieldKind {
        field: field.name().to_string(),
        kind: kind.tag().to_string(),
    }
}
