use std::path::{Path, PathBuf};

use recon_types::{Row, TableSchema};

use crate::error::{StoreError, StoreResult};
use crate::traits::Store;

struct MemTable {
    schema: TableSchema,
    rows: Vec<Row>,
}

/// In-memory, `Vec`-backed store.
///
/// Intended for tests and embedding. Tables keep their creation order so
/// enumeration matches what a database file would report.
pub struct InMemoryStore {
    location: PathBuf,
    tables: Vec<MemTable>,
}

impl InMemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::named(":memory:")
    }

    /// Create an empty store with a display location, useful in logs.
    pub fn named(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            tables: Vec::new(),
        }
    }

    /// Builder-style helper: create a table and fill it.
    pub fn with_table(mut self, schema: TableSchema, rows: Vec<Row>) -> StoreResult<Self> {
        let name = schema.name.clone();
        self.create_table(&schema)?;
        self.insert_rows(&name, &rows)?;
        Ok(self)
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns `true` if the store has no tables.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    fn table(&self, name: &str) -> StoreResult<&MemTable> {
        self.tables
            .iter()
            .find(|t| t.schema.name == name)
            .ok_or_else(|| StoreError::MissingTable(name.to_string()))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for InMemoryStore {
    fn location(&self) -> &Path {
        &self.location
    }

    fn table_names(&self) -> StoreResult<Vec<String>> {
        Ok(self.tables.iter().map(|t| t.schema.name.clone()).collect())
    }

    fn has_table(&self, name: &str) -> StoreResult<bool> {
        Ok(self.tables.iter().any(|t| t.schema.name == name))
    }

    fn schema(&self, table: &str) -> StoreResult<TableSchema> {
        Ok(self.table(table)?.schema.clone())
    }

    fn rows(&self, table: &str) -> StoreResult<Vec<Row>> {
        Ok(self.table(table)?.rows.clone())
    }

    fn create_table(&mut self, schema: &TableSchema) -> StoreResult<()> {
        if self.has_table(&schema.name)? {
            return Err(StoreError::TableExists(schema.name.clone()));
        }
        self.tables.push(MemTable {
            schema: schema.clone(),
            rows: Vec::new(),
        });
        Ok(())
    }

    fn insert_rows(&mut self, table: &str, rows: &[Row]) -> StoreResult<usize> {
        let target = self
            .tables
            .iter_mut()
            .find(|t| t.schema.name == table)
            .ok_or_else(|| StoreError::MissingTable(table.to_string()))?;

        // Validate everything first so a bad row leaves the table untouched.
        let expected = target.schema.arity();
        if let Some((index, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != expected) {
            return Err(StoreError::ArityMismatch {
                table: table.to_string(),
                index,
                expected,
                actual: row.len(),
            });
        }

        target.rows.extend_from_slice(rows);
        Ok(rows.len())
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("location", &self.location)
            .field("table_count", &self.tables.len())
            .finish()
    }
}
