use std::path::PathBuf;

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested table does not exist in the store.
    #[error("table not found: {0}")]
    MissingTable(String),

    /// A required column is missing from a table.
    #[error("column {column} not found in table {table}")]
    MissingColumn { table: String, column: String },

    /// Attempted to create a table that already exists.
    #[error("table already exists: {0}")]
    TableExists(String),

    /// A row does not have one value per column.
    #[error("row {index} of table {table} has {actual} values, expected {expected}")]
    ArityMismatch {
        table: String,
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// No store exists at the given path.
    #[error("store not found: {}", .0.display())]
    NotFound(PathBuf),

    /// A fresh store was requested at a path that is already occupied.
    #[error("store already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// Error reported by the SQLite engine.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// I/O error from the underlying filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
