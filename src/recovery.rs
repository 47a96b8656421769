//! Crash recovery
//!
//! A run log still `running` when the process starts belongs to a run that
//! died mid-way. It cannot be resumed, so it is marked `failed` with its
//! counters left untouched as a record of how far it got.

use chrono::Utc;
use tracing::{info, warn};

use crate::store::{AddressStore, StoreError};

/// Error message stored on runs failed by recovery
pub const INTERRUPTED_MESSAGE: &str = "Interrupted: process stopped while the import was running";

/// Result of recovery operation
#[derive(Debug, PartialEq, Eq)]
pub enum RecoveryResult {
    /// No recovery was needed
    NoRecoveryNeeded,
    /// Stale runs were marked failed
    FailedStaleRuns { run_ids: Vec<u64> },
}

impl RecoveryResult {
    /// Number of runs marked failed
    pub fn count(&self) -> usize {
        match self {
            Self::NoRecoveryNeeded => 0,
            Self::FailedStaleRuns { run_ids } => run_ids.len(),
        }
    }
}

/// Mark every `running` log as `failed`.
///
/// Must run once at startup, before a new run begins.
pub fn recover_stale_runs<S: AddressStore + ?Sized>(store: &S) -> Result<RecoveryResult, StoreError> {
    let stale: Vec<_> = store.logs()?.into_iter().filter(|log| log.is_running()).collect();
    if stale.is_empty() {
        return Ok(RecoveryResult::NoRecoveryNeeded);
    }

    let now = Utc::now();
    let mut run_ids = Vec::with_capacity(stale.len());
    for mut log in stale {
        warn!(
            "Found interrupted run {} ({}), progress {}",
            log.id,
            log.name,
            log.progress()
        );
        log.mark_failed(now, INTERRUPTED_MESSAGE, INTERRUPTED_MESSAGE.len());
        store.save_log(&log)?;
        run_ids.push(log.id);
    }
    store.commit()?;
    info!("Marked {} interrupted run(s) as failed", run_ids.len());

    Ok(RecoveryResult::FailedStaleRuns { run_ids })
}
