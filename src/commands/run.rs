use anyhow::{Context, Result};
use ruian_sync::{
    config::{Config, ImportStrategy},
    import::{ImportControllerBuilder, TargetPeriod},
    recovery::{recover_stale_runs, RecoveryResult},
    store::AddressStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::{open_store, status::print_log};

/// Options of the `run` command
pub struct RunOptions {
    pub archive: Option<PathBuf>,
    pub rebuild: bool,
    pub months_back: Option<u32>,
    pub base_url: Option<String>,
    pub quiet: bool,
}

pub async fn run_import(config: Config, options: RunOptions) -> Result<()> {
    let mut import = config.import.clone();
    if let Some(months_back) = options.months_back {
        import.months_back = months_back;
    }
    import.quiet |= options.quiet;

    let store: Arc<dyn AddressStore> = Arc::new(open_store(&config)?);
    let mut builder = ImportControllerBuilder::new(store).with_config(import.clone());
    if options.rebuild {
        builder = builder.with_strategy(ImportStrategy::Rebuild);
    }
    if let Some(base_url) = options.base_url {
        builder = builder.with_base_url(base_url);
    }
    let controller = builder.build().context("Failed to prepare import")?;

    let log = match options.archive {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Archive not found: {}", path.display());
            }
            controller
                .run_from_file(&path, TargetPeriod::current(import.months_back))
                .await
        }
        None => controller.run_import().await,
    }
    .context("Import failed")?;

    info!("Run {} finished: {}", log.id, log.state);
    if !import.quiet {
        print_log(&log);
    }
    Ok(())
}

pub fn recover(config: Config) -> Result<()> {
    let store = open_store(&config)?;
    match recover_stale_runs(&store)? {
        RecoveryResult::NoRecoveryNeeded => println!("No interrupted runs found"),
        RecoveryResult::FailedStaleRuns { run_ids } => {
            println!("Marked {} interrupted run(s) as failed: {:?}", run_ids.len(), run_ids);
        }
    }
    Ok(())
}
