use serde::{Deserialize, Serialize};

use crate::value::Value;

/// A positional tuple of cells. Column 0 holds the record identity.
pub type Row = Vec<Value>;

/// One column of a table: name plus declared type, as the store reports it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Declared type text (may be empty for untyped columns).
    pub decl_type: String,
}

impl Column {
    pub fn new(name: impl Into<String>, decl_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            decl_type: decl_type.into(),
        }
    }
}

/// Typed schema descriptor for one table.
///
/// This is what components exchange instead of schema SQL: the ordered
/// column list is enough to recreate the table elsewhere and to locate
/// columns by name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<Column>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Number of columns.
    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    /// Position of the column with exactly this name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// The identity column (column 0), if the table has any columns.
    pub fn identity_column(&self) -> Option<&Column> {
        self.columns.first()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Returns `true` if both schemas list the same column names in order.
    /// Declared types are not compared.
    pub fn same_columns(&self, other: &TableSchema) -> bool {
        self.column_names().eq(other.column_names())
    }
}
