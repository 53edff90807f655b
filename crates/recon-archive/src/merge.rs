use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use recon_tree::{MergeLayout, Orchestrator, TreeConfig, TreeMergeReport};

use crate::bundle::{extract, pack};
use crate::error::ArchiveResult;

/// Outcome of merging two bundles.
#[derive(Clone, Debug, Serialize)]
pub struct ArchiveMergeReport {
    pub output: PathBuf,
    pub files_packed: usize,
    pub tree: TreeMergeReport,
}

/// Merge two zipped trees into a new bundle at `output`.
///
/// Both bundles are extracted into a temporary directory under
/// `workspace_root`, merged with `primary` as the canonical side, and the
/// result is packed into `output`. The temporary directory is removed when
/// this returns, whether or not the merge succeeded.
pub fn merge_archives(
    primary: &Path,
    secondary: &Path,
    output: &Path,
    workspace_root: &Path,
    config: &TreeConfig,
) -> ArchiveResult<ArchiveMergeReport> {
    fs::create_dir_all(workspace_root)?;
    let scratch = tempfile::Builder::new()
        .prefix("recon-merge-")
        .tempdir_in(workspace_root)?;

    let layout = MergeLayout::new(
        scratch.path().join("primary"),
        scratch.path().join("secondary"),
        scratch.path().join("merged"),
        scratch.path().join("work"),
    );
    extract(primary, &layout.primary)?;
    extract(secondary, &layout.secondary)?;

    let tree = Orchestrator::new(config.clone()).run(&layout)?;
    let files_packed = pack(&tree.final_location, output)?;

    info!(
        primary = %primary.display(),
        secondary = %secondary.display(),
        output = %output.display(),
        files = files_packed,
        "bundle merge complete"
    );
    Ok(ArchiveMergeReport {
        output: output.to_path_buf(),
        files_packed,
        tree,
    })
}
