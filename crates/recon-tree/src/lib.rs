//! File-tree merge for recon.
//!
//! Two directory trees are merged path by path. Plain files follow
//! newest-wins on modification time with the primary tree winning ties.
//! Files carrying the store suffix are embedded relational stores; when
//! both trees have one at the same path, the two are merged row by row with
//! [`recon_merge::merge_store_files`] instead of compared by time.
//!
//! [`Orchestrator::run`] drives the whole sequence for a [`MergeLayout`]:
//! walk both trees, build a [`MergePlan`], materialize it into the output
//! directory, then apply the [`CleanupPolicy`].

pub mod config;
pub mod error;
pub mod materialize;
pub mod orchestrator;
pub mod plan;
pub mod walk;

pub use config::{CleanupPolicy, TreeConfig};
pub use error::{TreeError, TreeResult};
pub use materialize::materialize;
pub use orchestrator::{MergeLayout, Orchestrator, TreeMergeReport};
pub use plan::{ChosenSource, MergePlan, PlannedFile, TreePlanner};
pub use walk::{walk_tree, FileEntry, FileKind};
