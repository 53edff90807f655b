use std::path::Path;

use serde::{Deserialize, Serialize};

use recon_merge::MergeConfig;

use crate::error::{TreeError, TreeResult};

/// What happens to the source trees once the merged tree is written.
///
/// The defaults delete the primary tree, keep the secondary tree, and move
/// the merged tree into the primary's place.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupPolicy {
    pub remove_primary: bool,
    pub remove_secondary: bool,
    /// Rename the output tree to the primary path. Requires `remove_primary`.
    pub replace_primary: bool,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            remove_primary: true,
            remove_secondary: false,
            replace_primary: true,
        }
    }
}

impl CleanupPolicy {
    /// Leave both source trees and the output where they are.
    pub fn keep_all() -> Self {
        Self {
            remove_primary: false,
            remove_secondary: false,
            replace_primary: false,
        }
    }

    pub fn validate(&self) -> TreeResult<()> {
        if self.replace_primary && !self.remove_primary {
            return Err(TreeError::InvalidLayout(
                "replace_primary requires remove_primary".into(),
            ));
        }
        Ok(())
    }
}

/// Settings for a tree merge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// File-name suffix that marks an embedded store.
    pub store_suffix: String,
    pub cleanup: CleanupPolicy,
    pub merge: MergeConfig,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            store_suffix: ".db".to_string(),
            cleanup: CleanupPolicy::default(),
            merge: MergeConfig::default(),
        }
    }
}

impl TreeConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> TreeResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| TreeError::Config(e.to_string()))?;
        config.cleanup.validate()?;
        Ok(config)
    }

    /// Load a TOML config file.
    pub fn load(path: &Path) -> TreeResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| TreeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Returns `true` if `path` names an embedded store.
    pub fn is_store(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(&self.store_suffix))
    }
}
