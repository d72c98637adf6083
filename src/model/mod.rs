//! Record schemas and records
//!
//! A [`Model`] declares the fields of a record type. A [`Record`] is a
//! validated instance of a model, built by decoding wire JSON or by calling
//! [`Model::construct`] directly.

mod definition;
mod field;
mod record;

pub use definition::{Model, ModelBuilder};
pub use field::{FieldKind, FieldKindTag, ModelField};
pub use record::{FromRecord, IntoRecord, Record};
