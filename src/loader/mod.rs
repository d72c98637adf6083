//! Schema documents
//!
//! Models, serializers, enums and dispatchers can be declared in JSON
//! documents instead of code. [`SchemaLoader`] reads them and builds a
//! [`Registry`](crate::registry::Registry).

#[allow(clippy::module_inception)]
mod loader;
mod types;

pub use loader::SchemaLoader;
pub use types::{
    ConstraintDoc, DispatcherDoc, EnumDoc, EnumMemberDoc, ModelDoc, ModelFieldDoc, ModelKindDoc,
    SchemaDocument, SerializerDoc, SerializerFieldDoc, VariantDoc, WireKindDoc,
};
