//! Scalar data model: [`Value`], [`ColumnAttribute`] and the row type shared
//! by every layer above the slotted page.

use std::collections::BTreeMap;
use std::fmt;

/// Maximum byte length of a TEXT payload (fits in the on-page `u16` length prefix).
pub const MAX_TEXT_LEN: usize = u16::MAX as usize;

/// A scalar value stored in a row.
///
/// BOOLEAN is represented as INT 0/1 on the wire (§3), but kept as its own
/// tag here so the executor and catalog can type-check it against a
/// `ColumnAttribute::Boolean` column without guessing from an INT value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Value {
    Int(i32),
    Text(String),
    Boolean(bool),
}

impl Value {
    pub fn attribute(&self) -> ColumnAttribute {
        match self {
            Value::Int(_) => ColumnAttribute::Int,
            Value::Text(_) => ColumnAttribute::Text,
            Value::Boolean(_) => ColumnAttribute::Boolean,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "\"{s}\""),
            Value::Boolean(b) => write!(f, "{}", if *b { "true" } else { "false" }),
        }
    }
}

/// The data-type tag of a declared column (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnAttribute {
    Int,
    Text,
    Boolean,
}

impl ColumnAttribute {
    /// The string stored in `_columns.data_type`.
    pub fn as_catalog_str(self) -> &'static str {
        match self {
            ColumnAttribute::Int => "INT",
            ColumnAttribute::Text => "TEXT",
            ColumnAttribute::Boolean => "BOOLEAN",
        }
    }

    /// Parses the `_columns.data_type` string, or `None` for an unrecognized type
    /// (the executor turns that into `SchemaError("unrecognized data type")`).
    pub fn from_catalog_str(s: &str) -> Option<Self> {
        match s {
            "INT" => Some(ColumnAttribute::Int),
            "TEXT" => Some(ColumnAttribute::Text),
            "BOOLEAN" => Some(ColumnAttribute::Boolean),
            _ => None,
        }
    }
}

impl fmt::Display for ColumnAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_catalog_str())
    }
}

/// A column definition: name plus declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: ColumnAttribute,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: ColumnAttribute) -> Self {
        Self { name: name.into(), data_type }
    }
}

/// A row: column name -> value. Order is irrelevant here; column order for
/// marshalling comes from the owning relation's declared column sequence.
pub type Row = BTreeMap<String, Value>;

/// Builds a [`Row`] from `(name, value)` pairs, for tests and demos.
pub fn row(pairs: impl IntoIterator<Item = (&'static str, Value)>) -> Row {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}
