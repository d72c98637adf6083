//! Schema loader
//!
//! Reads schema documents from a directory of `*.json` files (sorted by file
//! name) or from strings, then builds one [`Registry`] out of all of them.
//!
//! Build order: enums, models (bases before the models extending them),
//! serializers (extended serializers first), dispatchers. Names are global
//! across documents; a second definition of a name is `DuplicateName`.
//! Related references are resolved lazily, so serializers may refer to
//! themselves or to serializers defined later. Every such reference is
//! checked once the registry is built.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::Value as Json;

use crate::config::EngineConfig;
use crate::errors::{SchemaError, SchemaResult};
use crate::model::{FieldKind, Model, ModelField};
use crate::observability::{log_event_with_fields, Event};
use crate::registry::{Registry, RegistryBuilder};
use crate::serializer::{
    DerivationTable, Dispatcher, Serializer, SerializerField, SerializerFieldKind,
};
use crate::validation::{Number, RangeValidator, SizeValidator};
use crate::value::{EnumDef, Value};

use super::types::{
    ConstraintDoc, DispatcherDoc, EnumDoc, ModelDoc, ModelFieldDoc, ModelKindDoc, SchemaDocument,
    SerializerDoc, SerializerFieldDoc, WireKindDoc,
};

const IN_MEMORY: &str = "<in-memory>";

/// Loads schema documents and builds registries from them
#[derive(Debug, Default)]
pub struct SchemaLoader {
    schema_dir: Option<PathBuf>,
    documents: Vec<(String, SchemaDocument)>,
}

impl SchemaLoader {
    /// Creates a loader reading `*.json` files from `schema_dir`
    pub fn new(schema_dir: &Path) -> Self {
        Self {
            schema_dir: Some(schema_dir.to_path_buf()),
            documents: Vec::new(),
        }
    }

    /// Creates a loader fed only through [`add_document_str`](Self::add_document_str)
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn schema_dir(&self) -> Option<&Path> {
        self.schema_dir.as_deref()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Loads every `*.json` file of the schema directory, in file name order.
    ///
    /// Returns the number of files loaded.
    pub fn load_all(&mut self) -> SchemaResult<usize> {
        let dir = match &self.schema_dir {
            Some(dir) => dir.clone(),
            None => return Ok(0),
        };

        let entries = fs::read_dir(&dir).map_err(|e| {
            SchemaError::malformed_schema(
                dir.display().to_string(),
                format!("failed to read schema directory: {}", e),
            )
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                SchemaError::malformed_schema(
                    dir.display().to_string(),
                    format!("failed to read directory entry: {}", e),
                )
            })?;
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in &paths {
            self.load_file(path)?;
        }
        Ok(paths.len())
    }

    /// Loads a single schema file
    pub fn load_file(&mut self, path: &Path) -> SchemaResult<()> {
        let origin = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| {
            SchemaError::malformed_schema(origin.as_str(), format!("failed to read file: {}", e))
        })?;
        self.add_document_str(&origin, &content)?;

        let (models, serializers) = self
            .documents
            .last()
            .map_or((0, 0), |(_, doc)| (doc.models.len(), doc.serializers.len()));
        let models = models.to_string();
        let serializers = serializers.to_string();
        log_event_with_fields(
            Event::SchemaFileLoaded,
            &[
                ("path", origin.as_str()),
                ("models", models.as_str()),
                ("serializers", serializers.as_str()),
            ],
        );
        Ok(())
    }

    /// Parses a schema document. `origin` names it in errors.
    pub fn add_document_str(&mut self, origin: &str, content: &str) -> SchemaResult<()> {
        let doc: SchemaDocument = serde_json::from_str(content)
            .map_err(|e| SchemaError::malformed_schema(origin, format!("invalid JSON: {}", e)))?;
        self.add_document(origin, doc);
        Ok(())
    }

    /// Adds an already parsed document
    pub fn add_document(&mut self, origin: &str, doc: SchemaDocument) {
        let origin = if origin.is_empty() { IN_MEMORY } else { origin };
        self.documents.push((origin.to_string(), doc));
    }

    /// Builds a registry from every document added so far
    pub fn build(&self, config: &EngineConfig) -> SchemaResult<Arc<Registry>> {
        self.build_with(config, &DerivationTable::standard())
    }

    /// Builds a registry, deriving serializer fields through `table`
    pub fn build_with(
        &self,
        config: &EngineConfig,
        table: &DerivationTable,
    ) -> SchemaResult<Arc<Registry>> {
        let mut builder = Registry::builder();
        let mut references: Vec<Reference> = Vec::new();

        for (origin, doc) in &self.documents {
            for enum_doc in &doc.enums {
                let def = build_enum(enum_doc).map_err(|e| locate(e, origin))?;
                builder.register_enum(Arc::new(def))?;
            }
        }

        let models = gather(&self.documents, |doc| &doc.models, |m| &m.name)?;
        for name in order(&models, |m| m.extends.iter().map(String::as_str).collect())? {
            let (origin, doc) = models[name.as_str()];
            let model = build_model(doc, &builder, &mut references, origin)
                .map_err(|e| locate(e, origin))?;
            builder.register_model(model)?;
        }

        let serializers = gather(&self.documents, |doc| &doc.serializers, |s| &s.name)?;
        for name in order(&serializers, |s| s.extends.iter().map(String::as_str).collect())? {
            let (origin, doc) = serializers[name.as_str()];
            let serializer = build_serializer(doc, &builder, config, table, &mut references, origin)
                .map_err(|e| locate(e, origin))?;
            builder.register_serializer(serializer)?;
        }

        for (origin, doc) in &self.documents {
            for dispatcher_doc in &doc.dispatchers {
                let dispatcher =
                    build_dispatcher(dispatcher_doc, &builder).map_err(|e| locate(e, origin))?;
                builder.register_dispatcher(dispatcher)?;
            }
        }

        let registry = builder.build();

        for reference in &references {
            let found = match reference.target {
                Target::Model => registry.model(&reference.name).is_some(),
                Target::Serializable => registry.serializable(&reference.name).is_some(),
            };
            if !found {
                return Err(SchemaError::malformed_schema(
                    reference.origin.as_str(),
                    format!(
                        "'{}' refers to unknown '{}'",
                        reference.owner, reference.name
                    ),
                ));
            }
        }

        let documents = self.documents.len().to_string();
        let models = registry.model_names().len().to_string();
        let serializers = registry.serializer_names().len().to_string();
        let dispatchers = registry.dispatcher_names().len().to_string();
        log_event_with_fields(
            Event::SchemasLoaded,
            &[
                ("documents", documents.as_str()),
                ("models", models.as_str()),
                ("serializers", serializers.as_str()),
                ("dispatchers", dispatchers.as_str()),
            ],
        );

        Ok(registry)
    }
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Model,
    Serializable,
}

/// A by-name reference checked after the registry is built
#[derive(Debug)]
struct Reference {
    origin: String,
    owner: String,
    name: String,
    target: Target,
}

/// Definition errors become malformed-schema errors naming the document
fn locate(err: SchemaError, origin: &str) -> SchemaError {
    match err {
        SchemaError::MalformedSchema { .. } | SchemaError::DuplicateName(_) => err,
        other => SchemaError::malformed_schema(origin, other.to_string()),
    }
}

/// Gathers named definitions across documents, rejecting duplicates
fn gather<'a, T>(
    documents: &'a [(String, SchemaDocument)],
    section: impl Fn(&'a SchemaDocument) -> &'a Vec<T>,
    name: impl Fn(&'a T) -> &'a String,
) -> SchemaResult<HashMap<&'a str, (&'a str, &'a T)>> {
    let mut out = HashMap::new();
    for (origin, doc) in documents {
        for item in section(doc) {
            let key = name(item).as_str();
            if out.insert(key, (origin.as_str(), item)).is_some() {
                return Err(SchemaError::DuplicateName(key.to_string()));
            }
        }
    }
    Ok(out)
}

/// Orders definitions so every dependency comes before its dependents.
///
/// Ties are broken by name for a stable build order.
fn order<'a, T>(
    items: &HashMap<&'a str, (&'a str, &'a T)>,
    deps: impl Fn(&'a T) -> Vec<&'a str>,
) -> SchemaResult<Vec<String>> {
    let mut names: Vec<&str> = items.keys().copied().collect();
    names.sort_unstable();

    let mut done: HashSet<&str> = HashSet::new();
    let mut out = Vec::with_capacity(names.len());

    fn visit<'a, T>(
        name: &'a str,
        items: &HashMap<&'a str, (&'a str, &'a T)>,
        deps: &dyn Fn(&'a T) -> Vec<&'a str>,
        done: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
        out: &mut Vec<String>,
    ) -> SchemaResult<()> {
        if done.contains(name) {
            return Ok(());
        }
        let (origin, item) = match items.get(name) {
            Some(entry) => *entry,
            None => return Ok(()),
        };
        if path.contains(&name) {
            return Err(SchemaError::malformed_schema(
                origin,
                format!("'{}' extends itself through {}", name, path.join(" -> ")),
            ));
        }

        path.push(name);
        for dep in deps(item) {
            if !items.contains_key(dep) {
                return Err(SchemaError::malformed_schema(
                    origin,
                    format!("'{}' extends unknown '{}'", name, dep),
                ));
            }
            visit(dep, items, deps, done, path, out)?;
        }
        path.pop();

        done.insert(name);
        out.push(name.to_string());
        Ok(())
    }

    for name in names {
        visit(name, items, &deps, &mut done, &mut Vec::new(), &mut out)?;
    }
    Ok(out)
}

fn build_enum(doc: &EnumDoc) -> SchemaResult<EnumDef> {
    let mut def = EnumDef::new(doc.name.as_str());
    for member in &doc.members {
        def = def.member(member.name.as_str(), Value::from_json(&member.value))?;
    }
    if def.is_empty() {
        return Err(SchemaError::InvalidDefinition(format!(
            "enum '{}' has no members",
            doc.name
        )));
    }
    Ok(def)
}

fn build_model(
    doc: &ModelDoc,
    builder: &RegistryBuilder,
    references: &mut Vec<Reference>,
    origin: &str,
) -> SchemaResult<Arc<Model>> {
    let mut model = Model::builder(doc.name.as_str());
    for base in &doc.extends {
        let base = builder
            .model(base)
            .ok_or_else(|| SchemaError::malformed_schema(origin, format!("unknown base '{}'", base)))?;
        model = model.extends(&base);
    }
    for field_doc in &doc.fields {
        let field = build_model_field(field_doc, builder, references, origin, &doc.name)
            .map_err(|e| e.in_type(doc.name.as_str()))?;
        model = model.field(field);
    }
    model.build()
}

fn model_kind(
    doc: &ModelKindDoc,
    builder: &RegistryBuilder,
    references: &mut Vec<Reference>,
    origin: &str,
    owner: &str,
) -> SchemaResult<FieldKind> {
    Ok(match doc {
        ModelKindDoc::Boolean => FieldKind::Boolean,
        ModelKindDoc::Integer => FieldKind::Integer,
        ModelKindDoc::Float => FieldKind::Float,
        ModelKindDoc::String => FieldKind::String,
        ModelKindDoc::UnixTimestamp => FieldKind::UnixTimestamp,
        ModelKindDoc::Related { model } => {
            references.push(Reference {
                origin: origin.to_string(),
                owner: owner.to_string(),
                name: model.clone(),
                target: Target::Model,
            });
            FieldKind::Related(model.clone())
        }
        ModelKindDoc::List { element } => FieldKind::List(Box::new(model_kind(
            element, builder, references, origin, owner,
        )?)),
        ModelKindDoc::Enum { name } => FieldKind::Enum(lookup_enum(builder, name)?),
        ModelKindDoc::Constant { value } => FieldKind::Constant(Value::from_json(value)),
        ModelKindDoc::Any => FieldKind::Any,
    })
}

fn build_model_field(
    doc: &ModelFieldDoc,
    builder: &RegistryBuilder,
    references: &mut Vec<Reference>,
    origin: &str,
    owner: &str,
) -> SchemaResult<ModelField> {
    let mut kind = model_kind(&doc.kind, builder, references, origin, owner)?;
    if let Some(choices) = &doc.constraints.choices {
        let choices = choices
            .iter()
            .map(|choice| record_value(&kind, choice))
            .collect::<SchemaResult<Vec<_>>>()?;
        kind = FieldKind::Selection {
            base: Box::new(kind),
            choices,
        };
    }

    let default = doc
        .default
        .as_ref()
        .map(|default| record_value(&kind, default))
        .transpose()?;

    let mut field = ModelField::new(doc.name.as_str(), kind).required(doc.required);
    if let Some(default) = default {
        field = field.with_default(default);
    }
    if doc.reject_writes {
        field = field.reject_writes();
    }
    if doc.constraints.has_range() {
        field = field.range(range(&doc.constraints)?);
    }
    if doc.constraints.has_size() {
        field = field.length(size(&doc.constraints)?);
    }
    Ok(field)
}

/// Converts a document value into its record representation for a kind
fn record_value(kind: &FieldKind, json: &Json) -> SchemaResult<Value> {
    match (kind, json) {
        (FieldKind::UnixTimestamp, Json::Number(n)) => n
            .as_i64()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .map(Value::Timestamp)
            .ok_or_else(|| {
                SchemaError::InvalidDefinition(format!("{} is not a unix timestamp", n))
            }),
        (FieldKind::Enum(def), wire) => def
            .by_wire(&Value::from_json(wire))
            .map(Value::Enum)
            .ok_or_else(|| {
                SchemaError::InvalidDefinition(format!("{} is not a member of {}", wire, def.name()))
            }),
        (FieldKind::Selection { base, .. }, json) => record_value(base, json),
        (_, json) => Ok(Value::from_json(json)),
    }
}

fn build_serializer(
    doc: &SerializerDoc,
    builder: &RegistryBuilder,
    config: &EngineConfig,
    table: &DerivationTable,
    references: &mut Vec<Reference>,
    origin: &str,
) -> SchemaResult<Arc<Serializer>> {
    let model = builder.model(&doc.model).ok_or_else(|| {
        SchemaError::malformed_schema(
            origin,
            format!("serializer '{}' uses unknown model '{}'", doc.name, doc.model),
        )
    })?;

    let mut serializer = Serializer::builder(doc.name.as_str(), &model)
        .unmapped(config.unmapped_field_policy);
    if let Some(base) = &doc.extends {
        let base = builder.serializer(base).ok_or_else(|| {
            SchemaError::malformed_schema(origin, format!("unknown base '{}'", base))
        })?;
        serializer = serializer.extends(&base);
    }
    if let Some(only) = &doc.only {
        serializer = serializer.only(only.iter().cloned());
    }
    serializer = serializer.exclude(doc.exclude.iter().cloned());

    for field_doc in &doc.fields {
        let field = build_serializer_field(field_doc, builder, references, origin, &doc.name)?;
        serializer = serializer.field(field);
    }

    if doc.derive {
        serializer.derive(table)
    } else {
        serializer.build()
    }
}

fn wire_kind(
    doc: &WireKindDoc,
    builder: &RegistryBuilder,
    references: &mut Vec<Reference>,
    origin: &str,
    owner: &str,
) -> SchemaResult<SerializerField> {
    let kind = match doc {
        WireKindDoc::Boolean => SerializerFieldKind::Boolean,
        WireKindDoc::Integer => SerializerFieldKind::Integer,
        WireKindDoc::Float => SerializerFieldKind::Float,
        WireKindDoc::String => SerializerFieldKind::String,
        WireKindDoc::UnixTimestamp => SerializerFieldKind::UnixTimestamp,
        WireKindDoc::Void => SerializerFieldKind::Void,
        WireKindDoc::Constant { value } => SerializerFieldKind::Constant(Value::from_json(value)),
        WireKindDoc::Related { target } => {
            references.push(Reference {
                origin: origin.to_string(),
                owner: owner.to_string(),
                name: target.clone(),
                target: Target::Serializable,
            });
            return Ok(SerializerField::related_named("", target.as_str()));
        }
        WireKindDoc::List { element } => {
            let element = wire_kind(element, builder, references, origin, owner)?;
            SerializerFieldKind::List(Box::new(element))
        }
        WireKindDoc::Enum { name } => SerializerFieldKind::Enum(lookup_enum(builder, name)?),
    };
    Ok(SerializerField::new("", kind))
}

fn build_serializer_field(
    doc: &SerializerFieldDoc,
    builder: &RegistryBuilder,
    references: &mut Vec<Reference>,
    origin: &str,
    owner: &str,
) -> SchemaResult<SerializerField> {
    let shape = wire_kind(&doc.kind, builder, references, origin, owner)?;
    let mut field = SerializerField::new(doc.attribute.as_str(), shape.kind().clone())
        .required(doc.required);

    if let Some(key) = &doc.key {
        field = field.wire_key(key.as_str());
    }
    if let Some(default) = &doc.default {
        field = field.with_default(Value::from_json(default));
    }
    if doc.read_only {
        field = field.read_only();
    }
    if doc.write_only {
        field = field.write_only();
    }
    if doc.constraints.has_range() {
        field = field.range(range(&doc.constraints)?);
    }
    if doc.constraints.has_size() {
        field = field.length(size(&doc.constraints)?);
    }
    if let Some(choices) = &doc.constraints.choices {
        field = field.one_of(choices.iter().map(Value::from_json));
    }
    Ok(field)
}

fn build_dispatcher(doc: &DispatcherDoc, builder: &RegistryBuilder) -> SchemaResult<Arc<Dispatcher>> {
    let mut dispatcher = Dispatcher::builder(doc.name.as_str(), doc.discriminator.as_str());
    if let Some(attribute) = &doc.attribute {
        dispatcher = dispatcher.attribute(attribute.as_str());
    }
    for variant in &doc.variants {
        let serializer = builder.serializer(&variant.serializer).ok_or_else(|| {
            SchemaError::InvalidDefinition(format!(
                "dispatcher '{}' uses unknown serializer '{}'",
                doc.name, variant.serializer
            ))
        })?;
        dispatcher = dispatcher.variant(Value::from_json(&variant.tag), &serializer);
    }
    dispatcher.build()
}

fn lookup_enum(builder: &RegistryBuilder, name: &str) -> SchemaResult<Arc<EnumDef>> {
    builder
        .enumeration(name)
        .ok_or_else(|| SchemaError::InvalidDefinition(format!("unknown enum '{}'", name)))
}

fn range(doc: &ConstraintDoc) -> SchemaResult<RangeValidator> {
    RangeValidator::new(
        doc.min.as_ref().map(number),
        doc.max.as_ref().map(number),
    )
}

fn size(doc: &ConstraintDoc) -> SchemaResult<SizeValidator> {
    SizeValidator::new(doc.min_length, doc.max_length)
}

fn number(n: &serde_json::Number) -> Number {
    match n.as_i64() {
        Some(i) => Number::Int(i),
        None => Number::Float(n.as_f64().unwrap_or(f64::NAN)),
    }
}
