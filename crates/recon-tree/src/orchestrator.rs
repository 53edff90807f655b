//! End-to-end tree merge: walk, plan, materialize, clean up.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use recon_merge::StoreMergeReport;

use crate::config::TreeConfig;
use crate::error::{TreeError, TreeResult};
use crate::materialize::materialize;
use crate::plan::TreePlanner;
use crate::walk::walk_tree;

/// Every path a tree merge touches. Nothing is derived from the process
/// working directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MergeLayout {
    pub primary: PathBuf,
    pub secondary: PathBuf,
    /// Where the merged tree is written. Must not exist yet.
    pub output: PathBuf,
    /// Parent of the private scratch directory that holds merged stores.
    pub workspace: PathBuf,
}

impl MergeLayout {
    pub fn new(
        primary: impl Into<PathBuf>,
        secondary: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        workspace: impl Into<PathBuf>,
    ) -> Self {
        Self {
            primary: primary.into(),
            secondary: secondary.into(),
            output: output.into(),
            workspace: workspace.into(),
        }
    }

    /// Check the layout before any work is done.
    ///
    /// Both sources must be directories and the output must not exist yet.
    /// No role path may equal or contain another; paths are compared after
    /// resolving symlinks and `..` for the part that exists.
    pub fn validate(&self) -> TreeResult<()> {
        for (role, path) in [("primary", &self.primary), ("secondary", &self.secondary)] {
            if !path.is_dir() {
                return Err(TreeError::InvalidLayout(format!(
                    "{role} tree is not a directory: {}",
                    path.display()
                )));
            }
        }
        if self.output.exists() {
            return Err(TreeError::InvalidLayout(format!(
                "output already exists: {}",
                self.output.display()
            )));
        }

        let roles = [
            ("primary", resolve(&self.primary)?),
            ("secondary", resolve(&self.secondary)?),
            ("output", resolve(&self.output)?),
            ("workspace", resolve(&self.workspace)?),
        ];
        for (i, (role, path)) in roles.iter().enumerate() {
            for (other_role, other) in &roles[i + 1..] {
                if path.starts_with(other) || other.starts_with(path) {
                    return Err(TreeError::InvalidLayout(format!(
                        "{role} {} overlaps {other_role} {}",
                        path.display(),
                        other.display()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Absolute form of `path`, canonical up to the deepest existing ancestor.
fn resolve(path: &Path) -> TreeResult<PathBuf> {
    if path.exists() {
        return Ok(fs::canonicalize(path)?);
    }
    let absolute = std::path::absolute(path)?;
    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return Ok(absolute),
        }
    }
    let mut resolved = fs::canonicalize(existing)?;
    resolved.extend(missing.iter().rev());
    Ok(resolved)
}

/// Outcome of a tree merge.
#[derive(Clone, Debug, Serialize)]
pub struct TreeMergeReport {
    pub layout: MergeLayout,
    pub files_written: usize,
    pub from_primary: usize,
    pub from_secondary: usize,
    pub stores: Vec<StoreMergeReport>,
    /// Where the merged tree ended up after cleanup.
    pub final_location: PathBuf,
}

/// Runs tree merges with one [`TreeConfig`].
#[derive(Clone, Debug, Default)]
pub struct Orchestrator {
    config: TreeConfig,
}

impl Orchestrator {
    pub fn new(config: TreeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Merge `layout.secondary` into `layout.primary`, writing `layout.output`,
    /// then apply the cleanup policy.
    ///
    /// Merged stores are staged in a private scratch directory inside the
    /// workspace, removed on success and on failure. Existing workspace
    /// content is left alone; the workspace itself is removed only if this
    /// call created it. A failure after materialization has started leaves a
    /// partial output tree.
    pub fn run(&self, layout: &MergeLayout) -> TreeResult<TreeMergeReport> {
        layout.validate()?;
        self.config.cleanup.validate()?;

        let created_workspace = !layout.workspace.exists();
        fs::create_dir_all(&layout.workspace)?;
        let scratch = tempfile::Builder::new()
            .prefix("recon-")
            .tempdir_in(&layout.workspace)?;

        let result = self.merge_and_clean(layout, &scratch.path().join("stores"));

        if let Err(e) = scratch.close() {
            warn!(workspace = %layout.workspace.display(), error = %e, "could not remove scratch directory");
        }
        if created_workspace {
            if let Err(e) = fs::remove_dir(&layout.workspace) {
                warn!(workspace = %layout.workspace.display(), error = %e, "could not remove workspace");
            }
        }
        result
    }

    fn merge_and_clean(&self, layout: &MergeLayout, stores_dir: &Path) -> TreeResult<TreeMergeReport> {
        let primary = walk_tree(&layout.primary, &self.config)?;
        let secondary = walk_tree(&layout.secondary, &self.config)?;

        let plan = TreePlanner::new(&self.config, stores_dir).plan(primary, secondary)?;
        let files_written = materialize(&plan, &layout.output)?;
        let final_location = self.clean_up(layout)?;

        let report = TreeMergeReport {
            layout: layout.clone(),
            files_written,
            from_primary: plan.from_primary(),
            from_secondary: plan.from_secondary(),
            stores: plan.stores,
            final_location,
        };
        info!(
            primary = %layout.primary.display(),
            secondary = %layout.secondary.display(),
            files = report.files_written,
            stores = report.stores.len(),
            location = %report.final_location.display(),
            "tree merge complete"
        );
        Ok(report)
    }

    fn clean_up(&self, layout: &MergeLayout) -> TreeResult<PathBuf> {
        let policy = &self.config.cleanup;
        if policy.remove_primary {
            fs::remove_dir_all(&layout.primary)?;
        }
        if policy.remove_secondary {
            fs::remove_dir_all(&layout.secondary)?;
        }
        if policy.replace_primary {
            fs::rename(&layout.output, &layout.primary)?;
            return Ok(layout.primary.clone());
        }
        Ok(layout.output.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CleanupPolicy;

    fn layout(root: &Path) -> MergeLayout {
        MergeLayout::new(
            root.join("r1"),
            root.join("r2"),
            root.join("out"),
            root.join("ws"),
        )
    }

    fn keep_all() -> Orchestrator {
        Orchestrator::new(TreeConfig {
            cleanup: CleanupPolicy::keep_all(),
            ..TreeConfig::default()
        })
    }

    #[test]
    fn missing_source_tree_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("r1")).unwrap();
        let err = keep_all().run(&layout(dir.path())).unwrap_err();
        assert!(matches!(err, TreeError::InvalidLayout(_)));
    }

    #[test]
    fn shared_paths_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("r1")).unwrap();
        fs::create_dir(dir.path().join("r2")).unwrap();
        let mut l = layout(dir.path());
        l.output = l.primary.clone();
        assert!(matches!(l.validate(), Err(TreeError::InvalidLayout(_))));
    }

    #[test]
    fn replace_without_remove_is_rejected_before_any_work() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("r1")).unwrap();
        fs::create_dir(dir.path().join("r2")).unwrap();
        let orchestrator = Orchestrator::new(TreeConfig {
            cleanup: CleanupPolicy {
                remove_primary: false,
                remove_secondary: false,
                replace_primary: true,
            },
            ..TreeConfig::default()
        });
        let err = orchestrator.run(&layout(dir.path())).unwrap_err();
        assert!(matches!(err, TreeError::InvalidLayout(_)));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn workspace_is_removed_after_merge() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("r1")).unwrap();
        fs::create_dir(dir.path().join("r2")).unwrap();
        fs::write(dir.path().join("r1/a.txt"), "a").unwrap();

        let report = keep_all().run(&layout(dir.path())).unwrap();
        assert_eq!(report.files_written, 1);
        assert_eq!(report.final_location, dir.path().join("out"));
        assert!(!dir.path().join("ws").exists());
        assert!(dir.path().join("out/a.txt").exists());
    }

    fn sources(root: &Path) {
        fs::create_dir(root.join("r1")).unwrap();
        fs::create_dir(root.join("r2")).unwrap();
        fs::write(root.join("r1/a.txt"), "a").unwrap();
        fs::write(root.join("r2/b.txt"), "b").unwrap();
    }

    #[test]
    fn output_inside_primary_is_rejected_and_primary_survives() {
        let dir = tempfile::tempdir().unwrap();
        sources(dir.path());
        let mut l = layout(dir.path());
        l.output = l.primary.join("merged");

        let err = Orchestrator::default().run(&l).unwrap_err();
        assert!(matches!(err, TreeError::InvalidLayout(_)));
        assert!(dir.path().join("r1/a.txt").exists());
        assert!(!l.output.exists());
        assert!(!l.workspace.exists());
    }

    #[test]
    fn nested_roles_are_rejected_in_either_direction() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        sources(root);

        let mut output_in_primary = layout(root);
        output_in_primary.output = root.join("r1/../r1/merged");
        let mut workspace_in_secondary = layout(root);
        workspace_in_secondary.workspace = root.join("r2/ws");
        let mut sources_in_workspace = layout(root);
        sources_in_workspace.workspace = root.to_path_buf();
        let mut workspace_in_output = layout(root);
        workspace_in_output.workspace = root.join("out/ws");
        let mut prefixed_siblings = layout(root);
        prefixed_siblings.output = root.join("r1-merged");
        prefixed_siblings.workspace = root.join("r2.work");

        for l in [
            output_in_primary,
            workspace_in_secondary,
            sources_in_workspace,
            workspace_in_output,
        ] {
            let err = Orchestrator::default().run(&l).unwrap_err();
            assert!(matches!(err, TreeError::InvalidLayout(_)), "{l:?}: {err}");
        }
        // Siblings sharing a name prefix are not nested.
        assert!(prefixed_siblings.validate().is_ok());

        assert!(root.join("r1/a.txt").exists());
        assert!(root.join("r2/b.txt").exists());
        assert!(!root.join("out").exists());
        assert!(!root.join("ws").exists());
    }

    #[test]
    fn existing_output_is_rejected_before_any_work() {
        let dir = tempfile::tempdir().unwrap();
        sources(dir.path());
        fs::create_dir(dir.path().join("out")).unwrap();
        fs::write(dir.path().join("out/stale.txt"), "old").unwrap();

        let err = Orchestrator::default().run(&layout(dir.path())).unwrap_err();
        assert!(matches!(err, TreeError::InvalidLayout(_)));
        assert!(dir.path().join("r1/a.txt").exists());
        assert!(!dir.path().join("r1/stale.txt").exists());
        assert!(dir.path().join("out/stale.txt").exists());
    }

    #[test]
    fn existing_workspace_content_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        sources(dir.path());
        fs::create_dir(dir.path().join("ws")).unwrap();
        fs::write(dir.path().join("ws/user.txt"), "mine").unwrap();

        keep_all().run(&layout(dir.path())).unwrap();

        let left: Vec<_> = fs::read_dir(dir.path().join("ws"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(left, vec![std::ffi::OsString::from("user.txt")]);
        assert_eq!(fs::read_to_string(dir.path().join("ws/user.txt")).unwrap(), "mine");
        assert!(dir.path().join("out/a.txt").exists());
        assert!(dir.path().join("out/b.txt").exists());
    }
}
