use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use recon_tree::TreeConfig;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Root for scratch directories and the default output bundle.
    pub workspace_root: PathBuf,
    pub tree: TreeConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            workspace_root: PathBuf::from("."),
            tree: TreeConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Where a merge writes its bundle when the request names no output.
    pub fn default_output(&self) -> PathBuf {
        self.workspace_root.join("merged_output.zip")
    }
}
