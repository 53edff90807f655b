//! Write a [`MergePlan`] out as a directory tree.

use std::fs::{self, File};
use std::path::Path;
use std::time::SystemTime;

use tracing::{debug, info};

use crate::error::{TreeError, TreeResult};
use crate::plan::{ChosenSource, MergePlan};

/// Copy every chosen source into `output`, one file per planned path.
///
/// Copies keep the source's permissions and modification time. Merged
/// stores are moved out of the scratch workspace. Returns the number of
/// files written.
pub fn materialize(plan: &MergePlan, output: &Path) -> TreeResult<usize> {
    fs::create_dir_all(output)?;

    for (relative, file) in &plan.files {
        let source = file.source.path();
        if !source.is_file() {
            return Err(TreeError::MissingSourceFile(source.to_path_buf()));
        }

        let dest = output.join(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        match &file.source {
            ChosenSource::MergedStore(path) => move_file(path, &dest)?,
            ChosenSource::Primary(path) | ChosenSource::Secondary(path) => {
                copy_with_metadata(path, &dest, file.modified)?
            }
        }
        debug!(path = %relative.display(), from = %source.display(), "materialized");
    }

    info!(output = %output.display(), files = plan.len(), "materialized merged tree");
    Ok(plan.len())
}

fn copy_with_metadata(src: &Path, dest: &Path, modified: SystemTime) -> TreeResult<()> {
    // fs::copy carries the permission bits over.
    fs::copy(src, dest)?;
    File::open(dest)?.set_modified(modified)?;
    Ok(())
}

fn move_file(src: &Path, dest: &Path) -> TreeResult<()> {
    if let Err(e) = fs::rename(src, dest) {
        // Workspace and output may live on different filesystems.
        debug!(from = %src.display(), error = %e, "rename failed; copying instead");
        fs::copy(src, dest)?;
        fs::remove_file(src)?;
    }
    Ok(())
}
