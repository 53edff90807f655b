//! Store handle boundary for recon.
//!
//! A store is a single relational database: a set of named tables plus one
//! distinguished deletion log table. The merge engine never speaks SQL; it
//! only sees the [`Store`] trait, which hands out typed schema descriptors
//! and fully materialized rows.
//!
//! # Backends
//!
//! - [`SqliteStore`]: a SQLite database file, via `rusqlite`
//! - [`InMemoryStore`]: a `Vec`-backed store for tests and embedding
//!
//! # Rules
//!
//! 1. Handles are scoped: dropping a store closes it, on success and error paths alike.
//! 2. Every table write is a single bulk insert; SQLite wraps it in one transaction.
//! 3. Engine-internal tables (`sqlite_*`) are never enumerated.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod memory;
pub mod sqlite;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::Store;
