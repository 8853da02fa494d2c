//! # State schema
//!
//! The typed description of the state a handler reads and writes. A schema is
//! loaded once from JSON, checked, and then shared read-only by every unit of
//! a compilation through [`SchemaContext`].

mod accessor;
mod context;

pub use accessor::*;
pub use context::*;

use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar and composite types known to the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ValueType {
    String,
    Int,
    Float,
    Bool,
    Record(String),
    Array(Box<ValueType>),
    Map(Box<ValueType>),
    #[default]
    Any,
}

impl ValueType {
    /// Parses a type spelling: `string`, `int`, `float`, `bool`, `any`,
    /// a record name, `[]T` or `map[string]T`. Returns `None` for spellings
    /// that are not identifiers.
    pub fn parse(spelling: &str) -> Option<Self> {
        let s = spelling.trim();
        if let Some(elem) = s.strip_prefix("[]") {
            return Self::parse(elem).map(|t| ValueType::Array(Box::new(t)));
        }
        if let Some(value) = s.strip_prefix("map[string]") {
            return Self::parse(value).map(|t| ValueType::Map(Box::new(t)));
        }
        let parsed = match s {
            "" | "any" => ValueType::Any,
            "string" => ValueType::String,
            "int" | "integer" | "int64" | "int32" => ValueType::Int,
            "float" | "float64" | "number" | "double" => ValueType::Float,
            "bool" | "boolean" => ValueType::Bool,
            other => {
                let valid = other.starts_with(|c: char| c.is_ascii_alphabetic())
                    && other.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
                if !valid {
                    return None;
                }
                ValueType::Record(other.to_string())
            }
        };
        Some(parsed)
    }

    /// Like [`ValueType::parse`], falling back to `Any` for unknown spellings.
    pub fn parse_lenient(spelling: &str) -> Self {
        Self::parse(spelling).unwrap_or(ValueType::Any)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Int | ValueType::Float)
    }

    pub fn record_name(&self) -> Option<&str> {
        match self {
            ValueType::Record(name) => Some(name),
            _ => None,
        }
    }

    /// The element type of an array, or the value type of a map.
    pub fn element(&self) -> Option<&ValueType> {
        match self {
            ValueType::Array(inner) | ValueType::Map(inner) => Some(inner),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::String => write!(f, "string"),
            ValueType::Int => write!(f, "int"),
            ValueType::Float => write!(f, "float"),
            ValueType::Bool => write!(f, "bool"),
            ValueType::Record(name) => write!(f, "{}", name),
            ValueType::Array(inner) => write!(f, "[]{}", inner),
            ValueType::Map(inner) => write!(f, "map[string]{}", inner),
            ValueType::Any => write!(f, "any"),
        }
    }
}

/// Schema document as it appears on disk.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Schema {
    #[serde(default)]
    pub package: String,
    /// Name of the root state type. Defaults to the first declared type.
    #[serde(default)]
    pub root: Option<String>,
    pub types: Vec<TypeDef>,
}

impl Schema {
    /// Parses a schema from JSON text.
    pub fn from_json(json: &str) -> Result<Self, ParseError> {
        serde_json::from_str(json).map_err(|e| ParseError::Schema(e.to_string()))
    }
}

/// A named record type with ordered fields.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TypeDef {
    pub name: String,
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub key: Option<KeySpec>,
    #[serde(default)]
    pub optional: bool,
}

/// The `key` attribute of a field.
///
/// On an array field a string names the identity field of its elements. On a
/// record field `true` marks that field as the record's identity.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum KeySpec {
    Field(String),
    Flag(bool),
}
