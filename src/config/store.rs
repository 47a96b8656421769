//! Store configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Location of the address store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Data directory holding the sled database
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: directories::ProjectDirs::from("", "", "ruian-sync")
                .map(|d| d.data_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".ruian-sync")),
        }
    }
}
