//! Decide, per relative path, which file the merged tree receives.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use tracing::{debug, info};

use recon_merge::{merge_store_files, StoreMergeReport};

use crate::config::TreeConfig;
use crate::error::{TreeError, TreeResult};
use crate::walk::{FileEntry, FileKind};

/// Where the output copy of a path comes from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "side", content = "path", rename_all = "snake_case")]
pub enum ChosenSource {
    Primary(PathBuf),
    Secondary(PathBuf),
    /// A store merged into the scratch workspace.
    MergedStore(PathBuf),
}

impl ChosenSource {
    pub fn path(&self) -> &Path {
        match self {
            Self::Primary(p) | Self::Secondary(p) | Self::MergedStore(p) => p,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlannedFile {
    pub source: ChosenSource,
    pub modified: SystemTime,
    pub kind: FileKind,
}

/// The merge decision for every relative path, plus the reports of the
/// store merges run while planning.
#[derive(Clone, Debug, Default)]
pub struct MergePlan {
    pub files: BTreeMap<PathBuf, PlannedFile>,
    pub stores: Vec<StoreMergeReport>,
}

impl MergePlan {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, relative: &Path) -> Option<&PlannedFile> {
        self.files.get(relative)
    }

    pub fn from_primary(&self) -> usize {
        self.count(|s| matches!(s, ChosenSource::Primary(_)))
    }

    pub fn from_secondary(&self) -> usize {
        self.count(|s| matches!(s, ChosenSource::Secondary(_)))
    }

    pub fn merged_stores(&self) -> usize {
        self.count(|s| matches!(s, ChosenSource::MergedStore(_)))
    }

    fn count(&self, pred: impl Fn(&ChosenSource) -> bool) -> usize {
        self.files.values().filter(|f| pred(&f.source)).count()
    }
}

/// Builds a [`MergePlan`] from the listings of both trees.
///
/// Plain files present on both sides keep the primary's copy unless the
/// secondary's is strictly newer. Stores present on both sides are always
/// merged, whatever their modification times, into `stores_dir`.
pub struct TreePlanner<'a> {
    config: &'a TreeConfig,
    stores_dir: PathBuf,
}

impl<'a> TreePlanner<'a> {
    pub fn new(config: &'a TreeConfig, stores_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            stores_dir: stores_dir.into(),
        }
    }

    pub fn plan(&self, primary: Vec<FileEntry>, secondary: Vec<FileEntry>) -> TreeResult<MergePlan> {
        let mut plan = MergePlan::default();

        for entry in primary {
            plan.files.insert(
                entry.relative,
                PlannedFile {
                    source: ChosenSource::Primary(entry.source),
                    modified: entry.modified,
                    kind: entry.kind,
                },
            );
        }

        for entry in secondary {
            let Some(existing) = plan.files.get_mut(&entry.relative) else {
                debug!(path = %entry.relative.display(), "only in secondary");
                plan.files.insert(
                    entry.relative,
                    PlannedFile {
                        source: ChosenSource::Secondary(entry.source),
                        modified: entry.modified,
                        kind: entry.kind,
                    },
                );
                continue;
            };

            if entry.kind == FileKind::Store && existing.kind == FileKind::Store {
                let dest = self.stores_dir.join(&entry.relative);
                let report = self.merge_store(existing.source.path(), &entry.source, &dest, &entry.relative)?;
                plan.stores.push(report);
                existing.modified = fs::metadata(&dest)?.modified()?;
                existing.source = ChosenSource::MergedStore(dest);
            } else if entry.modified > existing.modified {
                debug!(path = %entry.relative.display(), "secondary copy is newer");
                existing.source = ChosenSource::Secondary(entry.source);
                existing.modified = entry.modified;
                existing.kind = entry.kind;
            }
        }

        info!(
            files = plan.len(),
            from_primary = plan.from_primary(),
            from_secondary = plan.from_secondary(),
            merged_stores = plan.merged_stores(),
            "planned tree merge"
        );
        Ok(plan)
    }

    fn merge_store(
        &self,
        primary: &Path,
        secondary: &Path,
        dest: &Path,
        relative: &Path,
    ) -> TreeResult<StoreMergeReport> {
        debug!(path = %relative.display(), dest = %dest.display(), "merging embedded store");
        merge_store_files(primary, secondary, dest, &self.config.merge).map_err(|source| {
            TreeError::StoreMerge {
                path: relative.to_path_buf(),
                source,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn plain(root: &str, rel: &str, secs: u64) -> FileEntry {
        FileEntry {
            relative: PathBuf::from(rel),
            source: Path::new(root).join(rel),
            modified: at(secs),
            kind: FileKind::Plain,
        }
    }

    #[test]
    fn newer_secondary_file_wins() {
        let config = TreeConfig::default();
        let plan = TreePlanner::new(&config, "/ws/stores")
            .plan(
                vec![plain("/r1", "a.txt", 100), plain("/r1", "b.txt", 300)],
                vec![plain("/r2", "a.txt", 200), plain("/r2", "b.txt", 300)],
            )
            .unwrap();

        assert_eq!(
            plan.get(Path::new("a.txt")).unwrap().source,
            ChosenSource::Secondary(PathBuf::from("/r2/a.txt"))
        );
        // Equal times keep the primary.
        assert_eq!(
            plan.get(Path::new("b.txt")).unwrap().source,
            ChosenSource::Primary(PathBuf::from("/r1/b.txt"))
        );
    }

    #[test]
    fn union_of_both_trees() {
        let config = TreeConfig::default();
        let plan = TreePlanner::new(&config, "/ws/stores")
            .plan(
                vec![plain("/r1", "only1.txt", 1)],
                vec![plain("/r2", "only2.txt", 1)],
            )
            .unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.from_primary(), 1);
        assert_eq!(plan.from_secondary(), 1);
        assert_eq!(plan.merged_stores(), 0);
        assert!(plan.stores.is_empty());
    }

    #[test]
    fn store_only_on_one_side_is_taken_as_is() {
        let config = TreeConfig::default();
        let mut store = plain("/r2", "data/app.db", 5);
        store.kind = FileKind::Store;
        let plan = TreePlanner::new(&config, "/ws/stores")
            .plan(vec![], vec![store])
            .unwrap();
        let chosen = plan.get(Path::new("data/app.db")).unwrap();
        assert_eq!(chosen.source, ChosenSource::Secondary(PathBuf::from("/r2/data/app.db")));
        assert_eq!(chosen.kind, FileKind::Store);
    }

    #[test]
    fn unreadable_store_pair_reports_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = TreeConfig::default();
        let mut a = plain(dir.path().to_str().unwrap(), "app.db", 1);
        a.kind = FileKind::Store;
        let mut b = a.clone();
        b.modified = at(2);

        // Neither file exists on disk.
        let err = TreePlanner::new(&config, dir.path().join("stores"))
            .plan(vec![a], vec![b])
            .unwrap_err();
        assert!(matches!(err, TreeError::StoreMerge { ref path, .. } if path == Path::new("app.db")));
    }
}
