//! Schema document definitions
//!
//! A schema document is one JSON object with four optional sections:
//!
//! ```json
//! {
//!   "enums":       [{"name": "ChatType", "members": [{"name": "Private", "value": "private"}]}],
//!   "models":      [{"name": "Chat", "extends": [], "fields": [{"name": "id", "type": "integer"}]}],
//!   "serializers": [{"name": "ChatSerializer", "model": "Chat", "derive": true}],
//!   "dispatchers": [{"name": "ChatMember", "discriminator": "status",
//!                    "variants": [{"tag": "member", "serializer": "MemberSerializer"}]}]
//! }
//! ```
//!
//! Field kinds are tagged by `type`:
//! - boolean, integer, float, string, unix_timestamp, any
//! - related: `model` (model fields) or `target` (serializer fields)
//! - list: `element`, itself a kind object
//! - enum: `enum`, the enum name
//! - constant: `value`
//! - void (serializer fields only)

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub enums: Vec<EnumDoc>,
    #[serde(default)]
    pub models: Vec<ModelDoc>,
    #[serde(default)]
    pub serializers: Vec<SerializerDoc>,
    #[serde(default)]
    pub dispatchers: Vec<DispatcherDoc>,
}

impl SchemaDocument {
    pub fn is_empty(&self) -> bool {
        self.enums.is_empty()
            && self.models.is_empty()
            && self.serializers.is_empty()
            && self.dispatchers.is_empty()
    }
}

// =============================================================================
// Enums
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDoc {
    pub name: String,
    pub members: Vec<EnumMemberDoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumMemberDoc {
    pub name: String,
    /// Wire value, a string or an integer
    pub value: Json,
}

// =============================================================================
// Models
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDoc {
    pub name: String,
    /// Base models, in composition order
    #[serde(default)]
    pub extends: Vec<String>,
    #[serde(default)]
    pub fields: Vec<ModelFieldDoc>,
}

/// Kind of a model field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelKindDoc {
    Boolean,
    Integer,
    Float,
    String,
    UnixTimestamp,
    Related {
        model: String,
    },
    List {
        element: Box<ModelKindDoc>,
    },
    Enum {
        #[serde(rename = "enum")]
        name: String,
    },
    Constant {
        value: Json,
    },
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFieldDoc {
    pub name: String,
    #[serde(flatten)]
    pub kind: ModelKindDoc,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Json>,
    /// Constant fields only: fail writes instead of ignoring them
    #[serde(default)]
    pub reject_writes: bool,
    #[serde(flatten)]
    pub constraints: ConstraintDoc,
}

// =============================================================================
// Serializers
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializerDoc {
    pub name: String,
    pub model: String,
    /// Serializer whose fields are copied first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    /// Derive the fields not declared below from the model
    #[serde(default)]
    pub derive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only: Option<Vec<String>>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub fields: Vec<SerializerFieldDoc>,
}

/// Kind of a serializer field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireKindDoc {
    Boolean,
    Integer,
    Float,
    String,
    UnixTimestamp,
    Void,
    Constant {
        value: Json,
    },
    /// Serializer or dispatcher, by name
    Related {
        target: String,
    },
    List {
        element: Box<WireKindDoc>,
    },
    Enum {
        #[serde(rename = "enum")]
        name: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializerFieldDoc {
    pub attribute: String,
    /// Wire key, defaults to the attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(flatten)]
    pub kind: WireKindDoc,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Json>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub write_only: bool,
    #[serde(flatten)]
    pub constraints: ConstraintDoc,
}

// =============================================================================
// Dispatchers
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatcherDoc {
    pub name: String,
    /// Wire key carrying the tag
    pub discriminator: String,
    /// Record attribute carrying the tag, defaults to the discriminator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    pub variants: Vec<VariantDoc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantDoc {
    pub tag: Json,
    pub serializer: String,
}

// =============================================================================
// Constraints
// =============================================================================

/// Optional constraints shared by model and serializer fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<serde_json::Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<serde_json::Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<Json>>,
}

impl ConstraintDoc {
    pub fn has_range(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    pub fn has_size(&self) -> bool {
        self.min_length.is_some() || self.max_length.is_some()
    }
}

fn default_required() -> bool {
    true
}
