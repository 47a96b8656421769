//! Archive fetcher: downloads and validates the published ZIP archive

use super::error::ImportError;
use super::period::TargetPeriod;
use crate::config::ImportConfig;
use std::io::{self, Cursor, Read};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use zip::ZipArchive;

/// One delimited member of the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMember {
    pub name: String,
    /// Uncompressed size in bytes
    pub size: u64,
}

/// A fully buffered, validated archive
pub struct ArchiveHandle {
    archive: ZipArchive<Cursor<Vec<u8>>>,
    members: Vec<ArchiveMember>,
}

impl std::fmt::Debug for ArchiveHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveHandle")
            .field("entries", &self.archive.len())
            .field("members", &self.members)
            .finish()
    }
}

impl ArchiveHandle {
    /// Open an in-memory archive and check every entry's checksum.
    ///
    /// Only entries whose name ends with `extension` are exposed as members.
    pub fn from_bytes(bytes: Vec<u8>, extension: &str) -> Result<Self, ImportError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;

        let mut members = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let name = entry.name().to_string();
            // Reading to the end verifies the CRC
            io::copy(&mut entry, &mut io::sink())
                .map_err(|e| ImportError::InvalidArchive(format!("Corrupt file: {} ({})", name, e)))?;
            if entry.is_file() && name.ends_with(extension) {
                members.push(ArchiveMember {
                    name,
                    size: entry.size(),
                });
            }
        }

        info!(
            "Validated ZIP with {} entries, {} delimited members",
            archive.len(),
            members.len()
        );
        Ok(Self { archive, members })
    }

    /// Open an archive stored on disk
    pub fn open_file(path: &Path, extension: &str) -> Result<Self, ImportError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(bytes, extension)
    }

    /// Delimited members in archive order
    pub fn members(&self) -> &[ArchiveMember] {
        &self.members
    }

    /// Stream the bytes of a member
    pub fn open(&mut self, name: &str) -> Result<impl Read + '_, ImportError> {
        self.archive
            .by_name(name)
            .map_err(|e| ImportError::file(name, e))
    }
}

/// Downloads archives for a target period
pub struct ArchiveFetcher {
    client: reqwest::Client,
    base_url: String,
    archive_suffix: String,
    member_extension: String,
}

impl ArchiveFetcher {
    pub fn new(config: &ImportConfig) -> Result<Self, ImportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ImportError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            archive_suffix: config.archive_suffix.clone(),
            member_extension: config.member_extension.clone(),
        })
    }

    /// Download location of the archive for `period`
    pub fn archive_url(&self, period: &TargetPeriod) -> String {
        format!("{}/{}{}", self.base_url, period.as_compact(), self.archive_suffix)
    }

    /// Download, buffer and validate the archive.
    ///
    /// Nothing is written anywhere; a failure leaves no partial state behind.
    pub async fn fetch(&self, period: &TargetPeriod) -> Result<ArchiveHandle, ImportError> {
        let url = self.archive_url(period);
        info!("Downloading from: {}", url);
        let start = Instant::now();

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?.to_vec();

        info!(
            "Downloaded {:.2} MB in {:.2}s",
            bytes.len() as f64 / (1024.0 * 1024.0),
            start.elapsed().as_secs_f64()
        );

        let extension = self.member_extension.clone();
        let handle = tokio::task::spawn_blocking(move || ArchiveHandle::from_bytes(bytes, &extension))
            .await
            .map_err(|e| ImportError::InvalidArchive(format!("validation task failed: {}", e)))??;
        debug!("Archive members: {:?}", handle.members());
        Ok(handle)
    }
}
