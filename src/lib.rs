//! wireform - declarative record schemas mapped to and from JSON
//!
//! Records are described by [`Model`]s: ordered, validated fields with
//! optional base models. [`Serializer`]s map records to wire JSON and back,
//! either declared field by field or derived from the model through a
//! [`DerivationTable`]. [`Dispatcher`]s route tagged unions to the right
//! serializer. Schemas that refer to each other by name, themselves
//! included, are collected in a [`Registry`] and resolved lazily.
//!
//! Schemas can also be declared in JSON documents and built with the
//! [`SchemaLoader`].

pub mod cli;
pub mod codec;
pub mod config;
pub mod errors;
pub mod loader;
pub mod model;
pub mod observability;
pub mod registry;
pub mod serializer;
pub mod validation;
pub mod value;

pub use codec::{decode, decode_many, decode_polymorphic, encode, encode_many, encode_polymorphic};
pub use config::EngineConfig;
pub use errors::{ErrorKind, SchemaError, SchemaResult};
pub use loader::SchemaLoader;
pub use model::{FieldKind, FromRecord, IntoRecord, Model, ModelField, Record};
pub use registry::{Registry, RegistryBuilder, SchemaRef};
pub use serializer::{
    DerivationTable, Dispatcher, Serializable, Serializer, SerializerField, UnmappedFieldPolicy,
};
pub use validation::Validator;
pub use value::{EnumDef, EnumValue, Value};
