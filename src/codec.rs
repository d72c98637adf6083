//! Conversion entry points
//!
//! Thin free functions over [`Serializable`], the surface external
//! collaborators call. Conversion performs no I/O and never logs.

use serde_json::Value as Json;

use crate::errors::SchemaResult;
use crate::model::Record;
use crate::serializer::{Dispatcher, Serializable};

/// Decodes a wire object into a record
pub fn decode<S: Serializable + ?Sized>(serializer: &S, json: &Json) -> SchemaResult<Record> {
    serializer.to_object(json)
}

/// Encodes a record into a wire object
pub fn encode<S: Serializable + ?Sized>(
    serializer: &S,
    record: &Record,
    keep_none_fields: bool,
) -> SchemaResult<Json> {
    serializer.to_representation(record, keep_none_fields)
}

/// Decodes a wire array, preserving order. Element errors carry the index.
pub fn decode_many<S: Serializable + ?Sized>(
    serializer: &S,
    json: &Json,
) -> SchemaResult<Vec<Record>> {
    serializer.to_object_many(json)
}

/// Encodes records into a wire array, preserving order
pub fn encode_many<S: Serializable + ?Sized>(
    serializer: &S,
    records: &[Record],
    keep_none_fields: bool,
) -> SchemaResult<Json> {
    serializer.to_representation_many(records, keep_none_fields)
}

/// Decodes a tagged union through its dispatcher
pub fn decode_polymorphic(dispatcher: &Dispatcher, json: &Json) -> SchemaResult<Record> {
    dispatcher.to_object(json)
}

/// Encodes a record through the dispatcher variant it belongs to
pub fn encode_polymorphic(
    dispatcher: &Dispatcher,
    record: &Record,
    keep_none_fields: bool,
) -> SchemaResult<Json> {
    dispatcher.to_representation(record, keep_none_fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::model::{Model, ModelField};
    use crate::serializer::{DerivationTable, Serializer};
    use crate::validation::RangeValidator;
    use serde_json::json;

    fn rating() -> std::sync::Arc<Serializer> {
        let model = Model::builder("Rating")
            .field(ModelField::integer("score").range(RangeValidator::between(1, 10).unwrap()))
            .field(ModelField::integer("weight").optional().with_default(1))
            .build()
            .unwrap();
        Serializer::for_model(&model)
            .derive(&DerivationTable::standard())
            .unwrap()
    }

    #[test]
    fn test_range_boundaries_through_decode() {
        let serializer = rating();
        assert!(decode(&*serializer, &json!({"score": 10})).is_ok());
        assert!(decode(&*serializer, &json!({"score": 1})).is_ok());
        let err = decode(&*serializer, &json!({"score": 11})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
        assert_eq!(err.path(), "score");
    }

    #[test]
    fn test_default_substitution() {
        let serializer = rating();
        let record = decode(&*serializer, &json!({"score": 3})).unwrap();
        assert_eq!(record.get_i64("weight"), Some(1));
    }

    #[test]
    fn test_round_trip() {
        let serializer = rating();
        let record = decode(&*serializer, &json!({"score": 4, "weight": 2})).unwrap();
        let wire = encode(&*serializer, &record, true).unwrap();
        assert_eq!(decode(&*serializer, &wire).unwrap(), record);
    }

    #[test]
    fn test_many() {
        let serializer = rating();
        let records = decode_many(&*serializer, &json!([{"score": 2}, {"score": 3}])).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            encode_many(&*serializer, &records, false).unwrap(),
            json!([{"score": 2, "weight": 1}, {"score": 3, "weight": 1}])
        );
        let err = decode_many(&*serializer, &json!("nope")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }
}
