//! Serializer Invariant Tests
//!
//! Conversion properties that hold for every serializer:
//! - decode(encode(record)) reproduces the record
//! - required values are enforced, defaults substituted
//! - constraint failures carry the path of the offending value
//! - tagged unions route to exactly one variant
//! - lazily named serializers resolve through the registry, themselves included
//! - resolved serializers keep working once the registry is gone

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::json;
use wireform::errors::{ErrorKind, SchemaError, SchemaResult};
use wireform::model::{FieldKind, FromRecord, IntoRecord, Model, ModelField, Record};
use wireform::registry::Registry;
use wireform::serializer::{DerivationTable, Dispatcher, Serializer, SerializerField};
use wireform::validation::{RangeValidator, SizeValidator, Validator};
use wireform::value::{EnumDef, Value};
use wireform::{decode, decode_many, decode_polymorphic, encode, encode_polymorphic};

// =============================================================================
// Helper Functions
// =============================================================================

fn point_serializer() -> Arc<Serializer> {
    let model = Model::builder("Point")
        .field(ModelField::integer("x"))
        .field(ModelField::integer("y"))
        .build()
        .unwrap();
    Serializer::for_model(&model)
        .derive(&DerivationTable::standard())
        .unwrap()
}

fn user_model() -> Arc<Model> {
    Model::builder("User")
        .field(ModelField::integer("id"))
        .field(ModelField::string("first_name").length(SizeValidator::at_least(1)))
        .field(ModelField::string("username").optional())
        .field(ModelField::boolean("is_bot").optional().with_default(false))
        .build()
        .unwrap()
}

fn user_serializer() -> Arc<Serializer> {
    Serializer::for_model(&user_model())
        .derive(&DerivationTable::standard())
        .unwrap()
}

/// Message model with a self-referential reply and a list of users
fn message_registry() -> Arc<Registry> {
    let users = user_serializer();
    let message = Model::builder("Message")
        .field(ModelField::integer("message_id"))
        .field(ModelField::string("text").optional())
        .field(ModelField::related("reply_to_message", "Message").optional())
        .field(
            ModelField::list("new_chat_members", FieldKind::Related("User".into())).optional(),
        )
        .build()
        .unwrap();

    let serializer = Serializer::for_model(&message)
        .field(SerializerField::related_named("reply_to_message", "MessageSerializer").optional())
        .field(
            SerializerField::list("new_chat_members", SerializerField::nested("", &users))
                .optional(),
        )
        .derive(&DerivationTable::standard())
        .unwrap();

    let mut builder = Registry::builder();
    builder.register_model(users.model().clone()).unwrap();
    builder.register_model(message).unwrap();
    builder.register_serializer(users).unwrap();
    builder.register_serializer(serializer).unwrap();
    builder.build()
}

fn chat_member_dispatcher() -> Arc<Dispatcher> {
    let member = Model::builder("ChatMember")
        .field(ModelField::string("status"))
        .field(ModelField::integer("user_id"))
        .build()
        .unwrap();
    let admin = Model::builder("ChatMemberAdministrator")
        .extends(&member)
        .field(ModelField::boolean("can_ban").optional().with_default(false))
        .build()
        .unwrap();

    let table = DerivationTable::standard();
    Dispatcher::builder("ChatMemberDispatcher", "status")
        .variant("member", &Serializer::for_model(&member).derive(&table).unwrap())
        .variant("admin", &Serializer::for_model(&admin).derive(&table).unwrap())
        .build()
        .unwrap()
}

#[derive(Debug, PartialEq)]
struct Point {
    x: i64,
    y: i64,
}

impl FromRecord for Point {
    fn from_record(record: &Record) -> SchemaResult<Self> {
        let coordinate = |name: &str| -> SchemaResult<i64> {
            let value = record.require(name)?;
            value.as_i64().ok_or_else(|| {
                SchemaError::type_mismatch("int", value.type_description()).in_field(name)
            })
        };
        Ok(Point {
            x: coordinate("x")?,
            y: coordinate("y")?,
        })
    }
}

impl IntoRecord for Point {
    fn into_record(&self, model: &Arc<Model>) -> SchemaResult<Record> {
        model.construct([("x", Value::Int(self.x)), ("y", Value::Int(self.y))])
    }
}

// =============================================================================
// Round Trip Tests
// =============================================================================

/// The two-field point maps both ways.
#[test]
fn test_point_example() {
    let serializer = point_serializer();

    let point = decode(&*serializer, &json!({"x": 1, "y": 2})).unwrap();
    assert_eq!(point.model_name(), "Point");
    assert_eq!(point.get_i64("x"), Some(1));
    assert_eq!(point.get_i64("y"), Some(2));

    assert_eq!(encode(&*serializer, &point, true).unwrap(), json!({"x": 1, "y": 2}));
}

/// Encoding then decoding reproduces the record.
#[test]
fn test_round_trip_reproduces_record() {
    let serializer = user_serializer();
    let record = decode(
        &*serializer,
        &json!({"id": 9, "first_name": "Grace", "username": "grace"}),
    )
    .unwrap();

    let wire = encode(&*serializer, &record, true).unwrap();
    assert_eq!(decode(&*serializer, &wire).unwrap(), record);

    let sparse = decode(&*serializer, &json!({"id": 10, "first_name": "Ken"})).unwrap();
    let wire = encode(&*serializer, &sparse, false).unwrap();
    assert_eq!(decode(&*serializer, &wire).unwrap(), sparse);
}

/// Records built in code survive encode then decode for every field kind.
#[test]
fn test_every_field_kind_round_trips() {
    let chat_type = Arc::new(
        EnumDef::new("ChatType")
            .member("Private", "private")
            .unwrap()
            .member("Group", "group")
            .unwrap(),
    );
    let users = user_serializer();
    let venue = Model::builder("Venue")
        .field(ModelField::boolean("open"))
        .field(ModelField::integer("id"))
        .field(ModelField::float("lat"))
        .field(ModelField::string("title"))
        .field(ModelField::timestamp("updated"))
        .field(ModelField::selection("rating", FieldKind::Float, [1.5, 2.5]))
        .field(ModelField::enumeration("chat_type", chat_type.clone()))
        .field(ModelField::constant("kind", "venue"))
        .field(ModelField::list("tags", FieldKind::String))
        .field(ModelField::related_to("owner", users.model()))
        .build()
        .unwrap();
    let serializer = Serializer::for_model(&venue)
        .field(SerializerField::enumeration("chat_type", chat_type.clone()))
        .field(SerializerField::list("tags", SerializerField::string("")))
        .field(SerializerField::nested("owner", &users))
        .derive(&DerivationTable::standard())
        .unwrap();

    let owner = users
        .model()
        .construct([("id", Value::Int(7)), ("first_name", Value::from("Ada"))])
        .unwrap();
    let record = venue
        .construct([
            ("open", Value::Bool(true)),
            ("id", Value::Int(1)),
            ("lat", Value::Int(3)),
            ("title", Value::from("Dock")),
            (
                "updated",
                Value::Timestamp(Utc.timestamp_opt(1_700_000_000, 500_000_000).unwrap()),
            ),
            ("rating", Value::Float(2.5)),
            ("chat_type", Value::Enum(chat_type.value("Group").unwrap())),
            ("tags", Value::from(vec!["a", "b"])),
            ("owner", Value::Record(owner)),
        ])
        .unwrap();
    assert_eq!(record.get("lat"), Some(&Value::Float(3.0)));

    let wire = encode(&*serializer, &record, false).unwrap();
    assert_eq!(
        wire,
        json!({
            "open": true,
            "id": 1,
            "lat": 3.0,
            "title": "Dock",
            "updated": 1700000000,
            "rating": 2.5,
            "chat_type": "group",
            "kind": "venue",
            "tags": ["a", "b"],
            "owner": {"id": 7, "first_name": "Ada", "is_bot": false}
        })
    );
    assert_eq!(decode(&*serializer, &wire).unwrap(), record);
}

/// Application types convert through records in both directions.
#[test]
fn test_application_type_conversion() {
    let serializer = point_serializer();

    let point: Point = serializer.decode_as(&json!({"x": 1, "y": 2})).unwrap();
    assert_eq!(point, Point { x: 1, y: 2 });
    assert_eq!(
        serializer.encode_from(&point, true).unwrap(),
        json!({"x": 1, "y": 2})
    );

    let err = serializer.decode_as::<Point>(&json!({"x": 1})).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingRequiredValue);
    assert_eq!(err.path(), "y");
}

/// keep_none_fields chooses between omitting and emitting null.
#[test]
fn test_keep_none_fields() {
    let serializer = user_serializer();
    let record = decode(&*serializer, &json!({"id": 1, "first_name": "Ada"})).unwrap();

    assert_eq!(
        encode(&*serializer, &record, false).unwrap(),
        json!({"id": 1, "first_name": "Ada", "is_bot": false})
    );
    assert_eq!(
        encode(&*serializer, &record, true).unwrap(),
        json!({"id": 1, "first_name": "Ada", "username": null, "is_bot": false})
    );
}

// =============================================================================
// Required and Default Tests
// =============================================================================

/// An empty object fails on the first required field.
#[test]
fn test_required_omission() {
    let err = decode(&*point_serializer(), &json!({})).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingRequiredValue);
    assert_eq!(err.path(), "x");
}

/// Absent and null optional values take the default.
#[test]
fn test_default_substitution() {
    let serializer = user_serializer();
    let record = decode(&*serializer, &json!({"id": 1, "first_name": "Ada"})).unwrap();
    assert_eq!(record.get_bool("is_bot"), Some(false));

    let record = decode(
        &*serializer,
        &json!({"id": 1, "first_name": "Ada", "is_bot": null}),
    )
    .unwrap();
    assert_eq!(record.get_bool("is_bot"), Some(false));
}

// =============================================================================
// Validator Tests
// =============================================================================

/// Range bounds are inclusive.
#[test]
fn test_range_boundaries() {
    let validator = Validator::integer().with_range(RangeValidator::between(1, 10).unwrap());

    assert_eq!(validator.validate(Some(Value::Int(1))).unwrap(), Some(Value::Int(1)));
    assert_eq!(validator.validate(Some(Value::Int(10))).unwrap(), Some(Value::Int(10)));
    assert_eq!(
        validator.validate(Some(Value::Int(11))).unwrap_err().kind(),
        ErrorKind::OutOfRange
    );
}

/// Validating an already valid value returns it unchanged.
#[test]
fn test_validate_is_idempotent() {
    let validator = Validator::string()
        .optional()
        .with_default("none")
        .with_size(SizeValidator::between(1, 8).unwrap());

    let once = validator.validate(None).unwrap();
    let twice = validator.validate(once.clone()).unwrap();
    assert_eq!(once, twice);
    assert_eq!(twice, Some(Value::from("none")));
}

/// A list failure names the element index.
#[test]
fn test_list_element_index() {
    let validator = Validator::list(Validator::integer());
    let err = validator
        .validate(Some(Value::List(vec![
            Value::Int(1),
            Value::Int(2),
            Value::from("x"),
        ])))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert_eq!(err.path(), "[2]");
}

/// Decoding many records reports the failing element.
#[test]
fn test_decode_many_error_index() {
    let err = decode_many(
        &*point_serializer(),
        &json!([{"x": 1, "y": 1}, {"x": 2}]),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingRequiredValue);
    assert_eq!(err.path(), "[1].y");
}

// =============================================================================
// Polymorphic Dispatch Tests
// =============================================================================

/// The discriminator picks the variant.
#[test]
fn test_dispatch_by_discriminator() {
    let dispatcher = chat_member_dispatcher();

    let admin = decode_polymorphic(&dispatcher, &json!({"status": "admin", "user_id": 5})).unwrap();
    assert_eq!(admin.model_name(), "ChatMemberAdministrator");
    assert!(admin.is_a("ChatMember"));
    assert_eq!(admin.get_bool("can_ban"), Some(false));

    let member =
        decode_polymorphic(&dispatcher, &json!({"status": "member", "user_id": 6})).unwrap();
    assert_eq!(member.model_name(), "ChatMember");

    assert_eq!(
        encode_polymorphic(&dispatcher, &admin, true).unwrap(),
        json!({"status": "admin", "user_id": 5, "can_ban": false})
    );
}

/// An unregistered tag is reported by its value.
#[test]
fn test_dispatch_unknown_variant() {
    let err = decode_polymorphic(
        &chat_member_dispatcher(),
        &json!({"status": "ghost", "user_id": 5}),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownVariant);
    assert!(matches!(err.root(), wireform::SchemaError::UnknownVariant(tag) if tag == "ghost"));
}

// =============================================================================
// Lazy Reference Tests
// =============================================================================

/// A serializer nests itself by name.
#[test]
fn test_self_referential_serializer() {
    let registry = message_registry();
    let serializer = registry.serializer("MessageSerializer").unwrap();

    let wire = json!({
        "message_id": 3,
        "text": "third",
        "reply_to_message": {
            "message_id": 2,
            "reply_to_message": {"message_id": 1, "text": "first"}
        },
        "new_chat_members": [{"id": 7, "first_name": "Ada"}]
    });
    let record: Record = decode(&*serializer, &wire).unwrap();

    let reply = record.get_record("reply_to_message").unwrap();
    let root = reply.get_record("reply_to_message").unwrap();
    assert_eq!(root.get_str("text"), Some("first"));
    assert!(root.get("reply_to_message").is_none());

    let members = record.get_list("new_chat_members").unwrap();
    assert_eq!(members[0].as_record().unwrap().get_i64("id"), Some(7));

    let encoded = encode(&*serializer, &record, false).unwrap();
    assert_eq!(
        encoded["reply_to_message"]["reply_to_message"],
        json!({"message_id": 1, "text": "first"})
    );
    assert_eq!(decode(&*serializer, &encoded).unwrap(), record);
}

/// A model held directly nests without any registry.
#[test]
fn test_direct_nesting_without_registry() {
    let users = user_serializer();
    let message = Model::builder("Msg")
        .field(ModelField::related_to("from", users.model()))
        .build()
        .unwrap();
    let serializer = Serializer::for_model(&message)
        .field(SerializerField::nested("from", &users))
        .derive(&DerivationTable::standard())
        .unwrap();

    let record = decode(&*serializer, &json!({"from": {"id": 1, "first_name": "Ada"}})).unwrap();
    assert_eq!(record.get_record("from").unwrap().get_i64("id"), Some(1));
    assert_eq!(
        encode(&*serializer, &record, false).unwrap(),
        json!({"from": {"id": 1, "first_name": "Ada", "is_bot": false}})
    );
}

/// A serializer taken from a registry keeps decoding after the registry is dropped.
#[test]
fn test_serializer_outlives_registry() {
    let users = user_serializer();
    let message = Model::builder("Message")
        .field(ModelField::integer("message_id"))
        .field(ModelField::related("from", "User"))
        .field(ModelField::related("reply_to_message", "Message").optional())
        .build()
        .unwrap();
    let serializer = Serializer::for_model(&message)
        .field(SerializerField::related_named("from", "UserSerializer"))
        .field(SerializerField::related_named("reply_to_message", "MessageSerializer").optional())
        .derive(&DerivationTable::standard())
        .unwrap();

    let mut builder = Registry::builder();
    builder.register_model(users.model().clone()).unwrap();
    builder.register_model(message).unwrap();
    builder.register_serializer(users).unwrap();
    builder.register_serializer(serializer).unwrap();
    let registry = builder.build();
    let serializer = registry.serializer("MessageSerializer").unwrap();

    let wire = json!({
        "message_id": 2,
        "from": {"id": 1, "first_name": "Ada"},
        "reply_to_message": {"message_id": 1, "from": {"id": 2, "first_name": "Ken"}}
    });
    let first = decode(&*serializer, &wire).unwrap();

    drop(registry);
    let second = decode(&*serializer, &wire).unwrap();
    assert_eq!(second, first);
    assert_eq!(
        encode(&*serializer, &second, false).unwrap()["reply_to_message"]["from"],
        json!({"id": 2, "first_name": "Ken", "is_bot": false})
    );
}

/// Errors in nested levels carry the whole path.
#[test]
fn test_nested_error_path() {
    let registry = message_registry();
    let serializer = registry.serializer("MessageSerializer").unwrap();

    let err = decode(
        &*serializer,
        &json!({
            "message_id": 3,
            "reply_to_message": {
                "message_id": 2,
                "new_chat_members": [{"id": 1, "first_name": "A"}, {"id": 2, "first_name": ""}]
            }
        }),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LengthOutOfRange);
    assert_eq!(err.path(), "reply_to_message.new_chat_members[1].first_name");
}

/// A name that never gets registered fails only when it is used.
#[test]
fn test_unresolved_reference_fails_lazily() {
    let model = Model::builder("Update")
        .field(ModelField::integer("update_id"))
        .field(ModelField::any("poll").optional())
        .build()
        .unwrap();
    let serializer = Serializer::for_model(&model)
        .field(SerializerField::related_named("poll", "PollSerializer").optional())
        .derive(&DerivationTable::standard())
        .unwrap();

    let mut builder = Registry::builder();
    builder.register_serializer(serializer).unwrap();
    let registry = builder.build();
    let serializer = registry.serializer("UpdateSerializer").unwrap();

    assert!(decode(&*serializer, &json!({"update_id": 1})).is_ok());

    let err = decode(&*serializer, &json!({"update_id": 1, "poll": {"id": "p"}})).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ForwardReferenceUnresolved);
    assert_eq!(err.path(), "poll");
}
