//! Zip bundle boundary for recon.
//!
//! [`extract`] and [`pack`] move directory trees in and out of zip
//! bundles. [`merge_archives`] composes them with a tree merge so two
//! bundles can be reconciled into a third.

pub mod bundle;
pub mod error;
pub mod merge;

pub use bundle::{extract, pack};
pub use error::{ArchiveError, ArchiveResult};
pub use merge::{merge_archives, ArchiveMergeReport};
