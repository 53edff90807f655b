use serde::{Deserialize, Serialize};

use crate::value::Value;

/// One recorded deletion: which record, in which table, and when.
///
/// `deleted_at` is kept as the raw stored cell; the tombstone reconciler
/// normalizes it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeletionEntry {
    pub identity: Value,
    pub table: String,
    pub deleted_at: Value,
}

impl DeletionEntry {
    pub fn new(identity: impl Into<Value>, table: impl Into<String>, deleted_at: impl Into<Value>) -> Self {
        Self {
            identity: identity.into(),
            table: table.into(),
            deleted_at: deleted_at.into(),
        }
    }
}

/// Where the deletion log lives inside a store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeletionLogSchema {
    /// Name of the deletion log table.
    pub table: String,
    /// Column holding the deleted record's identity.
    pub identity_column: String,
    /// Column holding the name of the table the record was deleted from.
    pub table_column: String,
    /// Column holding the deletion time.
    pub deleted_at_column: String,
}

impl Default for DeletionLogSchema {
    fn default() -> Self {
        Self {
            table: "deleted_records_logs".to_string(),
            identity_column: "id".to_string(),
            table_column: "tableName".to_string(),
            deleted_at_column: "deletedAt".to_string(),
        }
    }
}
