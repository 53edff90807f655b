//! Recursive enumeration of a source tree.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::TreeConfig;
use crate::error::{TreeError, TreeResult};

/// How a file takes part in the merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// Compared by modification time; the newer copy wins.
    Plain,
    /// An embedded store; both copies are merged row by row.
    Store,
}

/// One regular file found under a tree root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    /// Path relative to the tree root.
    pub relative: PathBuf,
    /// Absolute (root-joined) path of the file.
    pub source: PathBuf,
    pub modified: SystemTime,
    pub kind: FileKind,
}

/// List every regular file under `root`, sorted by relative path.
///
/// Symbolic links are not followed and directories are not reported.
pub fn walk_tree(root: &Path, config: &TreeConfig) -> TreeResult<Vec<FileEntry>> {
    if !root.is_dir() {
        return Err(TreeError::InvalidLayout(format!(
            "not a directory: {}",
            root.display()
        )));
    }

    let mut entries = Vec::new();
    for item in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let item = item?;
        if !item.file_type().is_file() {
            continue;
        }
        let relative = item
            .path()
            .strip_prefix(root)
            .map_err(|_| TreeError::InvalidLayout(format!("{} escapes its root", item.path().display())))?
            .to_path_buf();
        let kind = if config.is_store(&relative) {
            FileKind::Store
        } else {
            FileKind::Plain
        };
        entries.push(FileEntry {
            modified: item.metadata()?.modified()?,
            source: item.path().to_path_buf(),
            relative,
            kind,
        });
    }

    debug!(root = %root.display(), files = entries.len(), "walked tree");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn lists_files_recursively_with_kinds() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();
        fs::write(dir.path().join("top.txt"), "x").unwrap();
        fs::write(dir.path().join("a/b/deep.db"), "").unwrap();
        fs::write(dir.path().join("a/note.md"), "y").unwrap();

        let entries = walk_tree(dir.path(), &TreeConfig::default()).unwrap();
        let listed: Vec<_> = entries
            .iter()
            .map(|e| (e.relative.clone(), e.kind))
            .collect();
        assert_eq!(
            listed,
            vec![
                (PathBuf::from("a/b/deep.db"), FileKind::Store),
                (PathBuf::from("a/note.md"), FileKind::Plain),
                (PathBuf::from("top.txt"), FileKind::Plain),
            ]
        );
        assert!(entries.iter().all(|e| e.source.starts_with(dir.path())));
    }

    #[test]
    fn missing_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = walk_tree(&dir.path().join("nope"), &TreeConfig::default()).unwrap_err();
        assert!(matches!(err, TreeError::InvalidLayout(_)));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), "s").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        fs::write(dir.path().join("real.txt"), "r").unwrap();

        let entries = walk_tree(dir.path(), &TreeConfig::default()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].relative, PathBuf::from("real.txt"));
    }
}
