//! CLI command implementations

pub mod init;
pub mod reset;
pub mod run;
pub mod status;
pub mod suggest;

use anyhow::{Context, Result};
use ruian_sync::{config::Config, store::SledStore};

/// Open the address store in the configured data directory
pub fn open_store(config: &Config) -> Result<SledStore> {
    let data_dir = &config.store.data_dir;
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    SledStore::open(data_dir)
        .with_context(|| format!("Failed to open store in {}", data_dir.display()))
}
