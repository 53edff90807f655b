//! Error types for the merge crate.

use recon_store::StoreError;
use recon_types::TypeError;

/// Errors that abort a merge.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// The table cannot be merged row by row (no identity column, or the
    /// two sources disagree on the column list).
    #[error("schema mismatch in table {table}: {reason}")]
    SchemaMismatch { table: String, reason: String },

    /// A row has no modification time and the policy forbids guessing.
    #[error("row {identity} in table {table} has no {column} value")]
    MissingTimestamp {
        table: String,
        identity: String,
        column: String,
    },

    /// A stored timestamp could not be normalized.
    #[error("timestamp error: {0}")]
    Type(#[from] TypeError),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience alias for merge results.
pub type MergeResult<T> = Result<T, MergeError>;
