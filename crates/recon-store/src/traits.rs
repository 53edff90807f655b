use std::path::Path;

use recon_types::{DeletionEntry, DeletionLogSchema, Row, TableSchema, Value};

use crate::error::{StoreError, StoreResult};

/// A relational store participating in a merge.
///
/// All implementations must satisfy these invariants:
/// - `table_names` lists user tables only, in the store's declaration order.
/// - `schema` and `rows` fail with [`StoreError::MissingTable`] for unknown tables.
/// - Every row returned by `rows` has exactly `schema(table).arity()` values.
/// - `insert_rows` writes all rows or none of them.
pub trait Store {
    /// Where this store lives (its identity).
    fn location(&self) -> &Path;

    /// Names of all user tables, in declaration order.
    fn table_names(&self) -> StoreResult<Vec<String>>;

    /// Check whether a table exists.
    ///
    /// Default implementation scans `table_names()`.
    fn has_table(&self, name: &str) -> StoreResult<bool> {
        Ok(self.table_names()?.iter().any(|t| t == name))
    }

    /// Column definitions of a table.
    fn schema(&self, table: &str) -> StoreResult<TableSchema>;

    /// Every row of a table, fully materialized.
    fn rows(&self, table: &str) -> StoreResult<Vec<Row>>;

    /// Create a table from a schema descriptor.
    fn create_table(&mut self, schema: &TableSchema) -> StoreResult<()>;

    /// Bulk-insert rows into an existing table. Returns the number inserted.
    fn insert_rows(&mut self, table: &str, rows: &[Row]) -> StoreResult<usize>;

    /// Read the deletion log described by `log`.
    ///
    /// Columns are located by name, so the log may carry extra columns in
    /// any order. A non-text table-name cell is rendered with `Display`.
    fn deletion_log(&self, log: &DeletionLogSchema) -> StoreResult<Vec<DeletionEntry>> {
        let schema = self.schema(&log.table)?;
        let locate = |column: &str| {
            schema
                .column_index(column)
                .ok_or_else(|| StoreError::MissingColumn {
                    table: log.table.clone(),
                    column: column.to_string(),
                })
        };
        let id_idx = locate(&log.identity_column)?;
        let table_idx = locate(&log.table_column)?;
        let at_idx = locate(&log.deleted_at_column)?;

        let cell = |row: &Row, idx: usize| row.get(idx).cloned().unwrap_or(Value::Null);

        Ok(self
            .rows(&log.table)?
            .iter()
            .map(|row| DeletionEntry {
                identity: cell(row, id_idx),
                table: match cell(row, table_idx) {
                    Value::Text(s) => s,
                    other => other.to_string(),
                },
                deleted_at: cell(row, at_idx),
            })
            .collect())
    }
}
