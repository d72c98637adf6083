//! Record serializers

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Weak};

use serde_json::{Map, Value as Json};

use crate::errors::{SchemaError, SchemaResult};
use crate::model::{FromRecord, IntoRecord, Model, Record};
use crate::observability::{log_event_with_fields, Event};
use crate::registry::Registry;
use crate::value::{Value, ValueKind};

use super::derive::{DerivationTable, UnmappedFieldPolicy};
use super::field::SerializerField;
use super::Serializable;

/// Ordered serializer fields bound to one model
#[derive(Debug)]
pub struct Serializer {
    name: String,
    model: Arc<Model>,
    fields: Vec<SerializerField>,
}

impl Serializer {
    pub fn builder(name: impl Into<String>, model: &Arc<Model>) -> SerializerBuilder {
        SerializerBuilder::new(name, model)
    }

    /// Builder named `<Model>Serializer`
    pub fn for_model(model: &Arc<Model>) -> SerializerBuilder {
        SerializerBuilder::for_model(model)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn fields(&self) -> &[SerializerField] {
        &self.fields
    }

    pub fn field(&self, attribute: &str) -> Option<&SerializerField> {
        self.fields.iter().find(|f| f.attribute() == attribute)
    }

    /// Decodes wire JSON into a record
    pub fn decode(&self, json: &Json) -> SchemaResult<Record> {
        self.to_object(json)
    }

    /// Decodes wire JSON straight into an application type
    pub fn decode_as<T: FromRecord>(&self, json: &Json) -> SchemaResult<T> {
        T::from_record(&self.decode(json)?)
    }

    /// Encodes an application type through a record of this serializer's model
    pub fn encode_from<T: IntoRecord>(
        &self,
        value: &T,
        keep_none_fields: bool,
    ) -> SchemaResult<Json> {
        let record = value.into_record(&self.model)?;
        self.encode(&record, keep_none_fields)
    }

    pub fn decode_many(&self, json: &Json) -> SchemaResult<Vec<Record>> {
        self.to_object_many(json)
    }

    /// Encodes a record. With `keep_none_fields` false, absent and null
    /// values are omitted instead of emitted as `null`.
    pub fn encode(&self, record: &Record, keep_none_fields: bool) -> SchemaResult<Json> {
        self.to_representation(record, keep_none_fields)
    }

    pub fn encode_many(&self, records: &[Record], keep_none_fields: bool) -> SchemaResult<Json> {
        self.to_representation_many(records, keep_none_fields)
    }

    /// Validates and converts every decodable field of a wire object.
    ///
    /// Returns attribute name to record value; absent fields are left out.
    pub fn decode_fields(&self, value: Value) -> SchemaResult<BTreeMap<String, Value>> {
        let mut wire = match value {
            Value::Map(map) => map,
            other => {
                return Err(SchemaError::type_mismatch(
                    ValueKind::Map.type_name(),
                    other.type_description(),
                ))
            }
        };

        let mut decoded = BTreeMap::new();
        for field in &self.fields {
            if field.is_write_only() || field.is_constant() {
                continue;
            }
            let raw = wire.remove(field.key());
            if let Some(value) = field
                .decode(raw)
                .map_err(|e| e.in_field(field.attribute()))?
            {
                decoded.insert(field.attribute().to_string(), value);
            }
        }
        Ok(decoded)
    }

    /// Encodes every encodable field of a record into a wire object
    pub fn encode_fields(&self, record: &Record, keep_none_fields: bool) -> SchemaResult<Map<String, Json>> {
        let mut out = Map::new();
        for field in &self.fields {
            if field.is_read_only() {
                continue;
            }

            let value = if field.is_constant() {
                record
                    .get(field.attribute())
                    .cloned()
                    .unwrap_or(Value::Null)
            } else if field.is_void() {
                Value::Null
            } else {
                match record.get(field.attribute()) {
                    Some(value) => value.clone(),
                    None if !keep_none_fields => continue,
                    None if !field.is_required() => {
                        out.insert(field.key().to_string(), Json::Null);
                        continue;
                    }
                    None => {
                        return Err(SchemaError::MissingRequiredValue.in_field(field.attribute()))
                    }
                }
            };

            let json = field
                .to_wire(&value, keep_none_fields)
                .map_err(|e| e.in_field(field.attribute()))?;

            if json.is_null() && !keep_none_fields {
                continue;
            }
            out.insert(field.key().to_string(), json);
        }
        Ok(out)
    }
}

impl Serializable for Serializer {
    fn name(&self) -> &str {
        &self.name
    }

    fn decode_value(&self, value: Value) -> SchemaResult<Record> {
        let decoded = self.decode_fields(value)?;
        self.model.construct(decoded)
    }

    fn to_representation(&self, record: &Record, keep_none_fields: bool) -> SchemaResult<Json> {
        if !record.is_a(self.model.name()) {
            return Err(SchemaError::type_mismatch(
                format!("record {}", self.model.name()),
                format!("record {}", record.model_name()),
            ));
        }
        self.encode_fields(record, keep_none_fields).map(Json::Object)
    }

    fn bind(&self, registry: &Weak<Registry>) {
        self.model.bind(registry);
        for field in &self.fields {
            field.bind(registry, &self.name);
        }
    }
}

/// Builder for [`Serializer`]
#[derive(Debug)]
pub struct SerializerBuilder {
    name: String,
    model: Arc<Model>,
    fields: Vec<SerializerField>,
    only: Option<Vec<String>>,
    exclude: Vec<String>,
    unmapped: UnmappedFieldPolicy,
}

impl SerializerBuilder {
    pub fn new(name: impl Into<String>, model: &Arc<Model>) -> Self {
        Self {
            name: name.into(),
            model: Arc::clone(model),
            fields: Vec::new(),
            only: None,
            exclude: Vec::new(),
            unmapped: UnmappedFieldPolicy::default(),
        }
    }

    pub fn for_model(model: &Arc<Model>) -> Self {
        Self::new(format!("{}Serializer", model.name()), model)
    }

    /// Copies the fields of another serializer. Later declarations of the
    /// same attribute replace them in place.
    pub fn extends(mut self, base: &Serializer) -> Self {
        for field in base.fields() {
            place(&mut self.fields, field.clone());
        }
        self
    }

    /// Declares a field, replacing an earlier one of the same attribute in place
    pub fn field(mut self, field: SerializerField) -> Self {
        place(&mut self.fields, field);
        self
    }

    /// Derives only the named model fields
    pub fn only<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.only = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Derives every model field except the named ones
    pub fn exclude<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.exclude.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn unmapped(mut self, policy: UnmappedFieldPolicy) -> Self {
        self.unmapped = policy;
        self
    }

    /// Builds from the declared fields only
    pub fn build(self) -> SchemaResult<Arc<Serializer>> {
        finish(self.name, self.model, self.fields)
    }

    /// Builds with every selected model field the declarations do not
    /// cover derived through `table`.
    ///
    /// Field order is model order, with declared fields taking the position
    /// of the model field they override, then declared fields with no model
    /// counterpart in declaration order.
    pub fn derive(self, table: &DerivationTable) -> SchemaResult<Arc<Serializer>> {
        let SerializerBuilder {
            name,
            model,
            fields: declared,
            only,
            exclude,
            unmapped,
        } = self;

        for listed in only.iter().flatten().chain(exclude.iter()) {
            if model.field(listed).is_none() {
                return Err(SchemaError::unknown_field(model.name(), listed.as_str()));
            }
        }
        let selected = |field: &str| {
            only.as_ref().map_or(true, |only| only.iter().any(|n| n == field))
                && !exclude.iter().any(|n| n == field)
        };

        let mut declared: Vec<Option<SerializerField>> = declared.into_iter().map(Some).collect();
        let mut fields = Vec::with_capacity(model.fields().len());

        for model_field in model.fields() {
            let manual = declared
                .iter_mut()
                .find(|slot| slot.as_ref().map_or(false, |f| f.attribute() == model_field.name()))
                .and_then(Option::take);
            if let Some(manual) = manual {
                fields.push(manual);
                continue;
            }
            if !selected(model_field.name()) {
                continue;
            }

            match table
                .derive_field(model_field)
                .map_err(|e| e.in_type(name.as_str()))?
            {
                Some(derived) => fields.push(derived),
                None => {
                    let kind = model_field.kind().tag();
                    match unmapped {
                        UnmappedFieldPolicy::Warn => log_event_with_fields(
                            Event::SchemaFieldSkipped,
                            &[
                                ("serializer", name.as_str()),
                                ("model", model.name()),
                                ("field", model_field.name()),
                                ("kind", kind.as_str()),
                            ],
                        ),
                        UnmappedFieldPolicy::Error => {
                            return Err(SchemaError::UnmappedFieldKind {
                                field: model_field.name().to_string(),
                                kind: kind.to_string(),
                            })
                        }
                    }
                }
            }
        }

        fields.extend(declared.into_iter().flatten());
        finish(name, model, fields)
    }
}

fn place(fields: &mut Vec<SerializerField>, field: SerializerField) {
    match fields.iter().position(|f| f.attribute() == field.attribute()) {
        Some(i) => fields[i] = field,
        None => fields.push(field),
    }
}

fn finish(
    name: String,
    model: Arc<Model>,
    fields: Vec<SerializerField>,
) -> SchemaResult<Arc<Serializer>> {
    if name.is_empty() {
        return Err(SchemaError::InvalidDefinition("serializer name is empty".into()));
    }

    let mut keys = HashSet::new();
    for field in &fields {
        field.definition_check().map_err(|e| e.in_type(name.as_str()))?;
        if !field.is_detached() && model.field(field.attribute()).is_none() {
            return Err(SchemaError::unknown_field(model.name(), field.attribute()));
        }
        if !keys.insert(field.key()) {
            return Err(SchemaError::DuplicateName(format!("{}.{}", name, field.key())));
        }
    }

    Ok(Arc::new(Serializer {
        name,
        model,
        fields,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::model::ModelField;
    use serde_json::json;

    fn point_model() -> Arc<Model> {
        Model::builder("Point")
            .field(ModelField::integer("x"))
            .field(ModelField::integer("y"))
            .build()
            .unwrap()
    }

    fn point_serializer() -> Arc<Serializer> {
        Serializer::for_model(&point_model())
            .derive(&DerivationTable::standard())
            .unwrap()
    }

    // =========================================================================
    // Decode / encode
    // =========================================================================

    #[test]
    fn test_point_round_trip() {
        let serializer = point_serializer();
        assert_eq!(serializer.name(), "PointSerializer");

        let record = serializer.decode(&json!({"x": 1, "y": 2})).unwrap();
        assert_eq!(record.get_i64("x"), Some(1));
        assert_eq!(record.get_i64("y"), Some(2));
        assert_eq!(serializer.encode(&record, true).unwrap(), json!({"x": 1, "y": 2}));
    }

    #[test]
    fn test_decode_requires_object() {
        let err = point_serializer().decode(&json!([1, 2])).unwrap_err();
        assert_eq!(err, SchemaError::type_mismatch("object", "list"));

        let err = point_serializer().decode_many(&json!({"x": 1})).unwrap_err();
        assert_eq!(err, SchemaError::type_mismatch("list", "object"));
    }

    #[test]
    fn test_empty_object_missing_required() {
        let err = point_serializer().decode(&json!({})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredValue);
        assert_eq!(err.path(), "x");
    }

    #[test]
    fn test_wire_key_independent_of_attribute() {
        let model = Model::builder("Message")
            .field(ModelField::string("sender"))
            .build()
            .unwrap();
        let serializer = Serializer::builder("MessageSerializer", &model)
            .field(SerializerField::string("sender").wire_key("from"))
            .build()
            .unwrap();

        let record = serializer.decode(&json!({"from": "ada"})).unwrap();
        assert_eq!(record.get_str("sender"), Some("ada"));
        assert_eq!(serializer.encode(&record, true).unwrap(), json!({"from": "ada"}));
    }

    #[test]
    fn test_keep_none_fields() {
        let model = Model::builder("User")
            .field(ModelField::integer("id"))
            .field(ModelField::string("username").optional())
            .build()
            .unwrap();
        let serializer = Serializer::for_model(&model)
            .derive(&DerivationTable::standard())
            .unwrap();
        let record = serializer.decode(&json!({"id": 7, "username": null})).unwrap();

        assert_eq!(
            serializer.encode(&record, true).unwrap(),
            json!({"id": 7, "username": null})
        );
        assert_eq!(serializer.encode(&record, false).unwrap(), json!({"id": 7}));
    }

    #[test]
    fn test_read_only_and_write_only() {
        let model = Model::builder("Account")
            .field(ModelField::string("login"))
            .field(ModelField::string("password").optional())
            .field(ModelField::integer("id").optional())
            .build()
            .unwrap();
        let serializer = Serializer::builder("AccountSerializer", &model)
            .field(SerializerField::string("login"))
            .field(SerializerField::string("password").optional().read_only())
            .field(SerializerField::integer("id").optional().write_only())
            .build()
            .unwrap();

        let record = serializer
            .decode(&json!({"login": "ada", "password": "secret", "id": 3}))
            .unwrap();
        assert_eq!(record.get_str("password"), Some("secret"));
        assert_eq!(record.get_i64("id"), None);

        let mut with_id = record.clone();
        with_id.set_field("id", 3).unwrap();
        assert_eq!(
            serializer.encode(&with_id, false).unwrap(),
            json!({"login": "ada", "id": 3})
        );
    }

    #[test]
    fn test_encode_rejects_foreign_record() {
        let other = Model::builder("Other")
            .field(ModelField::integer("x"))
            .build()
            .unwrap();
        let record = other.construct([("x", Value::Int(1))]).unwrap();
        let err = point_serializer().encode(&record, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_many_preserves_order_and_index() {
        let serializer = point_serializer();
        let records = serializer
            .decode_many(&json!([{"x": 1, "y": 1}, {"x": 2, "y": 2}]))
            .unwrap();
        assert_eq!(records[1].get_i64("x"), Some(2));
        assert_eq!(
            serializer.encode_many(&records, true).unwrap(),
            json!([{"x": 1, "y": 1}, {"x": 2, "y": 2}])
        );

        let err = serializer
            .decode_many(&json!([{"x": 1, "y": 1}, {"x": 2}]))
            .unwrap_err();
        assert_eq!(err.path(), "[1].y");

        let err = serializer.decode_many(&json!({"x": 1})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    // =========================================================================
    // Constant and void
    // =========================================================================

    #[test]
    fn test_constant_emitted_and_ignored_on_decode() {
        let model = Model::builder("Admin")
            .field(ModelField::constant("status", "administrator"))
            .field(ModelField::integer("user_id"))
            .build()
            .unwrap();
        let serializer = Serializer::for_model(&model)
            .derive(&DerivationTable::standard())
            .unwrap();

        let record = serializer
            .decode(&json!({"status": "whatever", "user_id": 1}))
            .unwrap();
        assert_eq!(record.get_str("status"), Some("administrator"));
        assert_eq!(
            serializer.encode(&record, true).unwrap(),
            json!({"status": "administrator", "user_id": 1})
        );
    }

    #[test]
    fn test_void_field() {
        let model = point_model();
        let serializer = Serializer::builder("PointSerializer", &model)
            .extends(&point_serializer())
            .field(SerializerField::void("reserved"))
            .build()
            .unwrap();

        let record = serializer.decode(&json!({"x": 1, "y": 2, "reserved": 5})).unwrap();
        assert_eq!(
            serializer.encode(&record, true).unwrap(),
            json!({"x": 1, "y": 2, "reserved": null})
        );
        assert_eq!(serializer.encode(&record, false).unwrap(), json!({"x": 1, "y": 2}));
    }

    // =========================================================================
    // Composition and derivation
    // =========================================================================

    #[test]
    fn test_extends_overrides_in_place() {
        let base = point_serializer();
        let serializer = Serializer::builder("WirePoint", base.model())
            .extends(&base)
            .field(SerializerField::integer("x").wire_key("left"))
            .build()
            .unwrap();

        let keys: Vec<&str> = serializer.fields().iter().map(SerializerField::key).collect();
        assert_eq!(keys, vec!["left", "y"]);
    }

    #[test]
    fn test_derive_only_and_exclude() {
        let model = Model::builder("User")
            .field(ModelField::integer("id"))
            .field(ModelField::string("name").optional())
            .field(ModelField::string("email").optional())
            .build()
            .unwrap();

        let only = Serializer::for_model(&model)
            .only(["id", "email"])
            .derive(&DerivationTable::standard())
            .unwrap();
        let attrs: Vec<&str> = only.fields().iter().map(SerializerField::attribute).collect();
        assert_eq!(attrs, vec!["id", "email"]);

        let excluded = Serializer::for_model(&model)
            .exclude(["email"])
            .derive(&DerivationTable::standard())
            .unwrap();
        let attrs: Vec<&str> = excluded.fields().iter().map(SerializerField::attribute).collect();
        assert_eq!(attrs, vec!["id", "name"]);

        let err = Serializer::for_model(&model)
            .only(["id", "phone"])
            .derive(&DerivationTable::standard())
            .unwrap_err();
        assert_eq!(err, SchemaError::unknown_field("User", "phone"));
    }

    #[test]
    fn test_derive_manual_override_keeps_model_position() {
        let model = Model::builder("Message")
            .field(ModelField::integer("id"))
            .field(ModelField::string("sender"))
            .field(ModelField::string("text").optional())
            .build()
            .unwrap();
        let serializer = Serializer::for_model(&model)
            .field(SerializerField::void("extra"))
            .field(SerializerField::string("sender").wire_key("from"))
            .derive(&DerivationTable::standard())
            .unwrap();

        let keys: Vec<&str> = serializer.fields().iter().map(SerializerField::key).collect();
        assert_eq!(keys, vec!["id", "from", "text", "extra"]);
    }

    #[test]
    fn test_unmapped_policy() {
        let model = Model::builder("Message")
            .field(ModelField::integer("id"))
            .field(ModelField::related("chat", "Chat"))
            .build()
            .unwrap();

        let warned = Serializer::for_model(&model)
            .derive(&DerivationTable::standard())
            .unwrap();
        assert!(warned.field("chat").is_none());

        let err = Serializer::for_model(&model)
            .unmapped(UnmappedFieldPolicy::Error)
            .derive(&DerivationTable::standard())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnmappedFieldKind);
    }

    #[test]
    fn test_build_rejects_unknown_attribute_and_duplicate_keys() {
        let model = point_model();
        let err = Serializer::builder("S", &model)
            .field(SerializerField::integer("z"))
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownField);

        let err = Serializer::builder("S", &model)
            .field(SerializerField::integer("x").wire_key("v"))
            .field(SerializerField::integer("y").wire_key("v"))
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateName);
    }
}
