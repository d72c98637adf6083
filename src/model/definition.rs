//! Record schemas
//!
//! A [`Model`] is an ordered, named collection of fields. Models are built
//! once through [`ModelBuilder`] and shared behind `Arc`.
//!
//! Composition: a model may extend base models. Base fields come first, in
//! the order the bases were listed, each base contributing its own flattened
//! order. The model's own fields follow. Redeclaring a field replaces the
//! earlier declaration in place.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};

use crate::errors::{SchemaError, SchemaResult};
use crate::registry::Registry;
use crate::value::Value;

use super::field::ModelField;
use super::record::Record;

#[derive(Debug)]
pub struct Model {
    name: String,
    ancestors: Vec<String>,
    fields: Vec<ModelField>,
    index: HashMap<String, usize>,
}

impl Model {
    pub fn builder(name: impl Into<String>) -> ModelBuilder {
        ModelBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of every model this one was composed from, nearest first
    pub fn ancestors(&self) -> &[String] {
        &self.ancestors
    }

    /// True when this model is `name` or was composed from it
    pub fn is_a(&self, name: &str) -> bool {
        self.name == name || self.ancestors.iter().any(|a| a == name)
    }

    pub fn fields(&self) -> &[ModelField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&ModelField> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(ModelField::name)
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Constructs a validated record.
    ///
    /// Every declared field is validated in model order; missing input keys
    /// are absent and unknown input keys are ignored. Constant fields always
    /// hold their constant. The first failure aborts construction.
    pub fn construct<K, I>(self: &Arc<Self>, input: I) -> SchemaResult<Record>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        let mut input: BTreeMap<String, Value> =
            input.into_iter().map(|(k, v)| (k.into(), v)).collect();

        let mut values = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let value = match field.constant_value() {
                Some(constant) => Some(constant.clone()),
                None => field.validate(input.remove(field.name()))?,
            };
            values.push(value);
        }

        Ok(Record::new(Arc::clone(self), values))
    }

    pub(crate) fn bind(&self, registry: &Weak<Registry>) {
        for field in &self.fields {
            field.bind(registry, &self.name);
        }
    }
}

/// Builder for [`Model`]
#[derive(Debug)]
pub struct ModelBuilder {
    name: String,
    bases: Vec<Arc<Model>>,
    fields: Vec<ModelField>,
}

impl ModelBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bases: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Composes the model from `base`
    pub fn extends(mut self, base: &Arc<Model>) -> Self {
        self.bases.push(Arc::clone(base));
        self
    }

    pub fn field(mut self, field: ModelField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = ModelField>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn build(self) -> SchemaResult<Arc<Model>> {
        if self.name.is_empty() {
            return Err(SchemaError::InvalidDefinition("model name is empty".into()));
        }

        let mut ancestors: Vec<String> = Vec::new();
        let mut fields: Vec<ModelField> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for base in &self.bases {
            for name in std::iter::once(&base.name).chain(base.ancestors.iter()) {
                if *name == self.name {
                    return Err(SchemaError::InvalidDefinition(format!(
                        "model '{}' can not extend itself",
                        self.name
                    )));
                }
                if !ancestors.contains(name) {
                    ancestors.push(name.clone());
                }
            }
            for field in &base.fields {
                place(&mut fields, &mut index, field.clone());
            }
        }

        let mut own = std::collections::HashSet::new();
        for mut field in self.fields {
            field.definition_check().map_err(|e| e.in_type(self.name.as_str()))?;
            if !own.insert(field.name().to_string()) {
                return Err(SchemaError::DuplicateName(format!(
                    "{}.{}",
                    self.name,
                    field.name()
                )));
            }
            field.assign_owner(&self.name);
            place(&mut fields, &mut index, field);
        }

        Ok(Arc::new(Model {
            name: self.name,
            ancestors,
            fields,
            index,
        }))
    }
}

/// Appends a field, or replaces an earlier one of the same name in place
fn place(fields: &mut Vec<ModelField>, index: &mut HashMap<String, usize>, field: ModelField) {
    match index.get(field.name()) {
        Some(&i) => fields[i] = field,
        None => {
            index.insert(field.name().to_string(), fields.len());
            fields.push(field);
        }
    }
}
