//! Core enums and typed values
//!
//! Column value types, the typed values produced by column resolution, and the
//! directory search scope.

use serde::{Deserialize, Serialize};

/// Canonical type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    String,
    StringArray,
    Int,
    IntArray,
    Bool,
    Json,
}

impl ValueType {
    /// Parse a declared column type (case-insensitive).
    ///
    /// Returns `None` for unrecognized type names; callers fall back to
    /// [`ValueType::String`].
    pub fn from_declared(declared: &str) -> Option<Self> {
        match declared.trim().to_lowercase().as_str() {
            "string" | "str" | "text" | "sid" => Some(ValueType::String),
            "[]string" | "stringarray" | "string_array" | "strings" => {
                Some(ValueType::StringArray)
            }
            "int" | "integer" => Some(ValueType::Int),
            "[]int" | "[]integer" | "intarray" | "int_array" => Some(ValueType::IntArray),
            "bool" | "boolean" => Some(ValueType::Bool),
            "json" => Some(ValueType::Json),
            _ => None,
        }
    }

    /// Check if the type holds a list of values.
    pub fn is_array(&self) -> bool {
        matches!(self, ValueType::StringArray | ValueType::IntArray)
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueType::String => "string",
            ValueType::StringArray => "string_array",
            ValueType::Int => "int",
            ValueType::IntArray => "int_array",
            ValueType::Bool => "bool",
            ValueType::Json => "json",
        };
        f.write_str(name)
    }
}

/// A column value after coercion to the column's declared type.
///
/// When the rendered output cannot be parsed into the declared type the raw
/// text is kept as [`TypedValue::String`] (or [`TypedValue::StringArray`] for
/// lists) instead of being dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypedValue {
    Null,
    String(String),
    StringArray(Vec<String>),
    Int(i64),
    IntArray(Vec<i64>),
    Bool(bool),
    Json(serde_json::Value),
}

impl TypedValue {
    /// Check if the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null)
    }

    /// Get as string if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as integer if this is an integer value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            TypedValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as boolean if this is a boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TypedValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Breadth of a directory search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SearchScope {
    /// The base entry only.
    Base,
    /// The base entry and all of its descendants.
    #[default]
    WholeSubtree,
}

impl From<&str> for SearchScope {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "base" | "baseobject" | "base_object" => SearchScope::Base,
            _ => SearchScope::WholeSubtree,
        }
    }
}

impl From<String> for SearchScope {
    fn from(value: String) -> Self {
        SearchScope::from(value.as_str())
    }
}

impl From<SearchScope> for String {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::Base => "base".to_string(),
            SearchScope::WholeSubtree => "subtree".to_string(),
        }
    }
}
