use anyhow::Result;
use ruian_sync::{config::Config, store::AddressStore};
use tracing::info;

use super::open_store;

/// Remove all towns, streets and numbers; run logs are kept
pub fn reset_store(config: Config, yes: bool) -> Result<()> {
    if !yes {
        anyhow::bail!("Refusing to delete address data without --yes");
    }
    let store = open_store(&config)?;
    let before = store.stats()?;
    store.truncate()?;
    info!(
        "Removed {} towns, {} streets, {} numbers",
        before.towns, before.streets, before.numbers
    );
    println!("Store reset: {}", config.store.data_dir.display());
    Ok(())
}
