//! Import run controller
//!
//! Drives one run through `running` to `done` or `failed`:
//!
//! 1. create and commit a `running` log for the target period,
//! 2. fetch and validate the archive,
//! 3. stream every delimited member through the [`RowProcessor`],
//!    committing entity writes together with the log counters every
//!    `checkpoint_rows` rows and at the end of each member,
//! 4. mark the log `done`.
//!
//! A member that fails is rolled back to its last checkpoint and counted as a
//! warning; the run continues with the next member. Download, archive and
//! store failures outside a member end the run with a `failed` log.

use super::cache::ResolverCache;
use super::error::ImportError;
use super::fetcher::{ArchiveFetcher, ArchiveHandle, ArchiveMember};
use super::period::TargetPeriod;
use super::processor::{FileStats, RowProcessor};
use super::progress::ImportProgress;
use super::reader::RecordReader;
use crate::config::{ImportConfig, ImportStrategy};
use crate::geo::KrovakTransformer;
use crate::recovery::recover_stale_runs;
use crate::store::{AddressStore, ImportRunLog};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Runs imports against an address store
pub struct ImportController {
    store: Arc<dyn AddressStore>,
    config: ImportConfig,
    transformer: Arc<KrovakTransformer>,
}

impl ImportController {
    /// Run the import for the current target period
    pub async fn run_import(&self) -> Result<ImportRunLog, ImportError> {
        self.run_for_period(TargetPeriod::current(self.config.months_back))
            .await
    }

    /// Download and import the archive published for `period`
    pub async fn run_for_period(&self, period: TargetPeriod) -> Result<ImportRunLog, ImportError> {
        let log = self.start_log(&period)?;
        let archive = match ArchiveFetcher::new(&self.config) {
            Ok(fetcher) => fetcher.fetch(&period).await,
            Err(e) => Err(e),
        };
        self.import_archive(log, archive).await
    }

    /// Import an archive already on disk, recording it under `period`
    pub async fn run_from_file(
        &self,
        path: &Path,
        period: TargetPeriod,
    ) -> Result<ImportRunLog, ImportError> {
        let log = self.start_log(&period)?;
        info!("Reading archive from: {}", path.display());
        let archive = ArchiveHandle::open_file(path, &self.config.member_extension);
        self.import_archive(log, archive).await
    }

    pub fn store(&self) -> &Arc<dyn AddressStore> {
        &self.store
    }

    fn start_log(&self, period: &TargetPeriod) -> Result<ImportRunLog, ImportError> {
        let id = self.store.next_log_id()?;
        let log = ImportRunLog::started(id, period.as_compact(), Utc::now());
        self.store.save_log(&log)?;
        self.store.commit()?;
        info!("=== Starting import {} (run {}) ===", log.name, log.id);
        Ok(log)
    }

    async fn import_archive(
        &self,
        log: ImportRunLog,
        archive: Result<ArchiveHandle, ImportError>,
    ) -> Result<ImportRunLog, ImportError> {
        let archive = match archive {
            Ok(archive) => archive,
            Err(e) => return Err(self.fail(log, e)),
        };

        if self.config.strategy == ImportStrategy::Rebuild {
            info!("Clearing existing data before rebuild");
            if let Err(e) = self.store.truncate() {
                return Err(self.fail(log, e.into()));
            }
        }

        let log_id = log.id;
        let store = self.store.clone();
        let transformer = self.transformer.clone();
        let config = self.config.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let mut log = log;
            let mut archive = archive;
            let result = process_archive(&*store, &transformer, &config, &mut archive, &mut log);
            (log, result)
        })
        .await;

        match joined {
            Ok((log, Ok(()))) => Ok(log),
            Ok((log, Err(e))) => Err(self.fail(log, e)),
            Err(join_error) => {
                let err = ImportError::Worker(join_error.to_string());
                self.store.rollback();
                match self.store.load_log(log_id) {
                    Ok(Some(log)) => Err(self.fail(log, err)),
                    _ => Err(err),
                }
            }
        }
    }

    /// Roll back, mark the log failed and hand the error back to the caller
    fn fail(&self, mut log: ImportRunLog, err: ImportError) -> ImportError {
        self.store.rollback();
        error!("Critical import failure: {}", err);
        log.mark_failed(Utc::now(), &err.to_string(), self.config.max_error_length);
        if let Err(e) = self.store.save_log(&log).and_then(|_| self.store.commit()) {
            error!("Failed to record failure of run {}: {}", log.id, e);
        }
        err
    }
}

/// Add a checkpoint's counters to the log
fn record_stats(log: &mut ImportRunLog, stats: &FileStats) {
    log.rows += stats.rows;
    log.towns.merge(&stats.towns);
    log.streets.merge(&stats.streets);
    log.numbers.merge(&stats.numbers);
    log.warnings += stats.warnings;
}

/// Sequentially process every member; runs on a blocking thread
fn process_archive(
    store: &dyn AddressStore,
    transformer: &KrovakTransformer,
    config: &ImportConfig,
    archive: &mut ArchiveHandle,
    log: &mut ImportRunLog,
) -> Result<(), ImportError> {
    let start = Instant::now();
    let members: Vec<ArchiveMember> = archive.members().to_vec();
    let file_count = members.len() as u64;
    info!("Archive contains {} delimited files", file_count);
    log.set_file_count(file_count);
    store.save_log(log)?;
    store.commit()?;

    let progress = ImportProgress::new(file_count, config.quiet);
    let processor = RowProcessor::new(store, transformer)
        .with_require_postal_code(config.require_postal_code);

    if let Err(e) = process_members(store, config, &processor, archive, &members, log, &progress) {
        progress.abandon(&format!("Import failed: {}", e));
        return Err(e);
    }
    progress.finish();

    info!("Import completed in {:.2} seconds", start.elapsed().as_secs_f64());
    info!(
        "Totals - Towns: {}, Streets: {}, Numbers: {}",
        log.towns.total(),
        log.streets.total(),
        log.numbers.total()
    );
    info!("Warnings: {}", log.warnings);
    if !config.quiet {
        progress.print_summary();
    }
    Ok(())
}

/// Process members in order, then mark the log `done`
fn process_members(
    store: &dyn AddressStore,
    config: &ImportConfig,
    processor: &RowProcessor<'_>,
    archive: &mut ArchiveHandle,
    members: &[ArchiveMember],
    log: &mut ImportRunLog,
    progress: &ImportProgress,
) -> Result<(), ImportError> {
    let file_count = members.len();
    let mut cache = ResolverCache::new();

    for (index, member) in members.iter().enumerate() {
        info!(
            "Processing file {}/{}: {}",
            index + 1,
            file_count,
            member.name
        );
        progress.file_started(&member.name);
        let file_start = Instant::now();
        let mut committed = log.clone();

        match process_member(store, config, processor, archive, member, &mut cache, log, &mut committed) {
            Ok(stats) => {
                info!(
                    "Processed {} rows in {:.2}s (T+:{} S+:{} N+:{} W:{})",
                    stats.rows,
                    file_start.elapsed().as_secs_f64(),
                    stats.towns.created,
                    stats.streets.created,
                    stats.numbers.created,
                    stats.warnings
                );
                progress.file_processed(&stats);
            }
            Err(e) => {
                store.rollback();
                let evicted = cache.rollback();
                error!("Rolling back changes for {}: {}", member.name, e);
                debug!("Evicted {} cache entries", evicted);
                *log = committed;
                log.warnings += 1;
                log.file_done();
                store.save_log(log)?;
                store.commit()?;
                progress.file_failed();
            }
        }
    }

    let (towns, streets, numbers) = cache.sizes();
    debug!("Resolver cache held {} towns, {} streets, {} numbers", towns, streets, numbers);

    log.mark_done(Utc::now());
    store.save_log(log)?;
    store.commit()?;
    Ok(())
}

/// Process one member, committing at every checkpoint.
///
/// `committed` tracks the log as of the last successful commit so the caller
/// can restore it after a failure.
#[allow(clippy::too_many_arguments)]
fn process_member(
    store: &dyn AddressStore,
    config: &ImportConfig,
    processor: &RowProcessor<'_>,
    archive: &mut ArchiveHandle,
    member: &ArchiveMember,
    cache: &mut ResolverCache,
    log: &mut ImportRunLog,
    committed: &mut ImportRunLog,
) -> Result<FileStats, ImportError> {
    let source = archive.open(&member.name)?;
    let records = RecordReader::new(source).map_err(|e| ImportError::file(&member.name, e))?;

    let mut file_stats = FileStats::default();
    let mut pending = FileStats::default();
    let mut checkpoint = |log: &mut ImportRunLog,
                          pending: &mut FileStats,
                          cache: &mut ResolverCache,
                          file_stats: &mut FileStats|
     -> Result<(), ImportError> {
        record_stats(log, pending);
        store.save_log(log)?;
        store.commit()?;
        cache.checkpoint();
        *committed = log.clone();
        file_stats.merge(pending);
        *pending = FileStats::default();
        Ok(())
    };

    let mut row: u64 = 0;
    for result in records {
        row += 1;
        match result {
            Ok(record) => {
                processor.process(row, &record, cache, &mut pending);
            }
            Err(ImportError::Csv(e)) if !e.is_io_error() => {
                warn!("Row {} unreadable: {}", row, e);
                pending.rows += 1;
                pending.warnings += 1;
            }
            Err(e) => return Err(ImportError::file(&member.name, e)),
        }

        if row % config.progress_log_rows == 0 {
            debug!("Processed {} rows...", row);
        }
        if row % config.checkpoint_rows == 0 {
            checkpoint(log, &mut pending, cache, &mut file_stats)
                .map_err(|e| ImportError::file(&member.name, e))?;
            debug!("Intermediate commit at row {}", row);
        }
    }

    log.file_done();
    checkpoint(log, &mut pending, cache, &mut file_stats)
        .map_err(|e| ImportError::file(&member.name, e))?;
    Ok(file_stats)
}

/// Builder for [`ImportController`]
pub struct ImportControllerBuilder {
    store: Arc<dyn AddressStore>,
    config: ImportConfig,
}

impl ImportControllerBuilder {
    pub fn new(store: Arc<dyn AddressStore>) -> Self {
        Self {
            store,
            config: ImportConfig::default(),
        }
    }

    /// Set import configuration
    pub fn with_config(mut self, config: ImportConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the archive location
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn with_strategy(mut self, strategy: ImportStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Set rows between intermediate checkpoints
    pub fn with_checkpoint_rows(mut self, rows: u64) -> Self {
        self.config.checkpoint_rows = rows;
        self
    }

    /// Set quiet mode
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.config.quiet = quiet;
        self
    }

    /// Build the controller.
    ///
    /// Stale `running` logs left by a crashed process are failed here, before
    /// any new run can start.
    pub fn build(self) -> Result<ImportController, ImportError> {
        if self.config.checkpoint_rows == 0 {
            return Err(ImportError::Config("checkpoint_rows must be positive".into()));
        }
        if self.config.progress_log_rows == 0 {
            return Err(ImportError::Config("progress_log_rows must be positive".into()));
        }

        let recovered = recover_stale_runs(&*self.store)?;
        if recovered.count() > 0 {
            warn!("Marked {} interrupted run(s) as failed", recovered.count());
        }

        Ok(ImportController {
            store: self.store,
            config: self.config,
            transformer: Arc::new(KrovakTransformer::new()),
        })
    }
}
