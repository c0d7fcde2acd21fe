//! Entity declaration types
//!
//! An [`EntityDef`] is the raw declaration of one entity type: its own fields,
//! its own relations, and optionally the entity it extends. Declarations are
//! built explicitly with the builder methods below and handed to the
//! [`SchemaRegistry`](crate::SchemaRegistry), which merges inheritance chains.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Name of the key field every root entity declares
pub const KEY_FIELD: &str = "id";

/// Scalar semantic types, usable on their own or as `arrayOf` items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "date-iso8601")]
    DateIso8601,
    #[serde(rename = "any")]
    Any,
}

impl ScalarType {
    /// Wire name of the type
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::String => "string",
            ScalarType::Number => "number",
            ScalarType::Boolean => "boolean",
            ScalarType::DateIso8601 => "date-iso8601",
            ScalarType::Any => "any",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Semantic type of a field
///
/// Serialized as `{"type": "string"}` or `{"type": "arrayOf", "items": "string"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "items")]
pub enum FieldType {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "date-iso8601")]
    DateIso8601,
    /// Opaque value; concrete typing is left to the consumer
    #[serde(rename = "any")]
    Any,
    #[serde(rename = "arrayOf")]
    ArrayOf(ScalarType),
}

impl From<ScalarType> for FieldType {
    fn from(scalar: ScalarType) -> Self {
        match scalar {
            ScalarType::String => FieldType::String,
            ScalarType::Number => FieldType::Number,
            ScalarType::Boolean => FieldType::Boolean,
            ScalarType::DateIso8601 => FieldType::DateIso8601,
            ScalarType::Any => FieldType::Any,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::String => f.write_str("string"),
            FieldType::Number => f.write_str("number"),
            FieldType::Boolean => f.write_str("boolean"),
            FieldType::DateIso8601 => f.write_str("date-iso8601"),
            FieldType::Any => f.write_str("any"),
            FieldType::ArrayOf(item) => write!(f, "arrayOf<{}>", item),
        }
    }
}

/// A single field declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub is_key: bool,
    /// Value applied when the field is absent and not required
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldDef {
    /// Optional, non-unique field of the given type
    pub fn new(name: impl Into<String>, field_type: impl Into<FieldType>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            required: false,
            unique: false,
            is_key: false,
            default: None,
            description: None,
        }
    }

    /// The standard `id` primary key: required, unique string
    pub fn key() -> Self {
        Self::new(KEY_FIELD, FieldType::String).required().unique().primary()
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn primary(mut self) -> Self {
        self.is_key = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Reference cardinality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    One,
    Many,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cardinality::One => f.write_str("one"),
            Cardinality::Many => f.write_str("many"),
        }
    }
}

/// A typed link to another entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDef {
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RelationDef {
    /// Exactly-one reference; required unless marked [`optional`](Self::optional)
    pub fn one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::One,
            required: true,
            description: None,
        }
    }

    /// Ordered list of references; may be empty or absent
    pub fn many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            cardinality: Cardinality::Many,
            required: false,
            description: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Declaration of one entity type, before inheritance is merged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub relations: Vec<RelationDef>,
}

impl EntityDef {
    /// Root entity carrying the standard `id` key
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extends: None,
            description: None,
            fields: vec![FieldDef::key()],
            relations: Vec::new(),
        }
    }

    /// Subtype of `parent`; the key comes from the parent
    pub fn extending(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extends: Some(parent.into()),
            description: None,
            fields: Vec::new(),
            relations: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn get_relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|r| r.name == name)
    }
}
