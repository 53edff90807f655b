//! Error types for the archive crate.

use recon_tree::TreeError;

/// Errors that can occur while reading, writing, or merging bundles.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// An entry name is absolute or climbs out of the extraction root.
    #[error("unsafe entry name in bundle: {0}")]
    UnsafeEntry(String),

    /// The bundle is not a readable zip archive.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Merging the extracted trees failed.
    #[error("tree merge error: {0}")]
    Tree(#[from] TreeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for archive results.
pub type ArchiveResult<T> = Result<T, ArchiveError>;
