//! Error types for the tree crate.

use std::path::PathBuf;

use recon_merge::MergeError;

/// Errors that can occur while merging two file trees.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// A file chosen for the output disappeared before it could be copied.
    #[error("chosen source file is missing: {0}")]
    MissingSourceFile(PathBuf),

    /// The merge layout or cleanup policy is unusable.
    #[error("invalid layout: {0}")]
    InvalidLayout(String),

    /// Configuration could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// Merging an embedded store failed.
    #[error("store merge failed for {path}: {source}")]
    StoreMerge {
        path: PathBuf,
        #[source]
        source: MergeError,
    },

    /// Directory traversal failed.
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for tree results.
pub type TreeResult<T> = Result<T, TreeError>;
