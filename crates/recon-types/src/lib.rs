//! Foundation types for recon.
//!
//! This crate provides the value, schema, and temporal types shared by every
//! other recon crate. It performs no I/O.
//!
//! # Key Types
//!
//! - [`Value`]: A dynamically typed table cell
//! - [`Identity`]: Hashable, ordered key form of a row's identity cell
//! - [`TableSchema`] / [`Column`]: Typed schema descriptor passed between components
//! - [`DeletionEntry`] / [`DeletionLogSchema`]: Tombstone rows and where to find them
//! - [`Timestamp`]: Milliseconds since the Unix epoch, produced by [`normalize`]

pub mod deletion;
pub mod error;
pub mod schema;
pub mod timestamp;
pub mod value;

pub use deletion::{DeletionEntry, DeletionLogSchema};
pub use error::{TypeError, TypeResult};
pub use schema::{Column, Row, TableSchema};
pub use timestamp::{normalize, Timestamp, TIMESTAMP_FORMAT};
pub use value::{Identity, Value};
