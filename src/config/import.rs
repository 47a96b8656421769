//! Import pipeline configuration

use serde::{Deserialize, Serialize};

use super::DEFAULT_USER_AGENT;

/// Default publisher location of the address point archives
pub const DEFAULT_BASE_URL: &str = "https://vdp.cuzk.gov.cz/vymenny_format/csv";

/// How entity tables are treated at the start of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStrategy {
    /// Create-or-update by natural key, keeping identifiers stable
    Upsert,
    /// Truncate towns, streets and numbers, then import from scratch
    Rebuild,
}

/// Import run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Base URL the archive name is appended to
    pub base_url: String,
    /// Suffix of the archive name after the `YYYYMMDD` date
    pub archive_suffix: String,
    /// Extension of delimited members inside the archive
    pub member_extension: String,
    /// Download timeout (seconds)
    pub request_timeout_secs: u64,
    /// User agent for the download request
    pub user_agent: String,
    /// Rows between intermediate checkpoints
    pub checkpoint_rows: u64,
    /// Rows between debug progress lines
    pub progress_log_rows: u64,
    /// How many months before the current month the target period lies
    pub months_back: u32,
    /// Fail the town step when the postal code is empty
    pub require_postal_code: bool,
    /// Maximum stored length of a run's error message (bytes)
    pub max_error_length: usize,
    /// Upsert or rebuild
    pub strategy: ImportStrategy,
    /// Disable the progress bar
    pub quiet: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            archive_suffix: "_OB_ADR_csv.zip".to_string(),
            member_extension: ".csv".to_string(),
            request_timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            checkpoint_rows: 10_000,
            progress_log_rows: 1_000,
            months_back: 2,
            require_postal_code: false,
            max_error_length: 255,
            strategy: ImportStrategy::Upsert,
            quiet: false,
        }
    }
}
