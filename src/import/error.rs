//! Errors raised by the import pipeline

use crate::store::StoreError;
use thiserror::Error;

/// Errors that can occur during an import run
#[derive(Debug, Error)]
pub enum ImportError {
    /// Network unreachable, non-success status or timeout
    #[error("Download failed: {0}")]
    Download(String),

    /// Payload is not a readable ZIP archive
    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    /// One archive member could not be processed
    #[error("Failed to process '{file}': {message}")]
    FileProcessing { file: String, message: String },

    /// One row could not be resolved or stored
    #[error("Row {row}: {message}")]
    Row { row: u64, message: String },

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingHeaders(Vec<String>),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The blocking import worker panicked or was cancelled
    #[error("Import worker failed: {0}")]
    Worker(String),
}

impl ImportError {
    /// Wrap an error raised while processing an archive member
    pub fn file(file: impl Into<String>, err: impl std::fmt::Display) -> Self {
        ImportError::FileProcessing {
            file: file.into(),
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for ImportError {
    fn from(e: reqwest::Error) -> Self {
        ImportError::Download(e.to_string())
    }
}

impl From<zip::result::ZipError> for ImportError {
    fn from(e: zip::result::ZipError) -> Self {
        ImportError::InvalidArchive(e.to_string())
    }
}
