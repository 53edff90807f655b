//! Reconciliation engine for recon.
//!
//! Merges two copies of a relational store so that, for every record, the
//! most recently modified version survives and recorded deletions outrank
//! stale updates.
//!
//! # Pipeline
//!
//! 1. [`TombstoneMap::reconcile`] folds both deletion logs into one map of
//!    latest deletion times.
//! 2. [`TableMerger`] merges one table in two phases: seed from the primary
//!    source, then reduce with the secondary.
//! 3. [`StoreMerger`] drives the table merger over every table of the
//!    primary store and writes the output store.
//!
//! The primary source is canonical: its tables define what the output
//! contains, and it wins whenever there is nothing to compare.

pub mod config;
pub mod error;
pub mod report;
pub mod store;
pub mod table;
pub mod tombstone;

pub use config::{AbsentTimestampPolicy, MergeConfig};
pub use error::{MergeError, MergeResult};
pub use report::{StoreMergeReport, TableMergeKind, TableOutcome};
pub use store::{merge_store_files, StoreMerger};
pub use table::{MergedTable, RowsById, Side, Slot, TableData, TableMerger};
pub use tombstone::{Tombstone, TombstoneMap};
