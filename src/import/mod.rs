//! Import pipeline for the published address point archives
//!
//! # Example Usage
//!
//! ```no_run
//! use ruian_sync::import::ImportControllerBuilder;
//! use ruian_sync::store::{AddressStore, SledStore};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store: Arc<dyn AddressStore> = Arc::new(SledStore::open(".ruian-sync")?);
//! let controller = ImportControllerBuilder::new(store)
//!     .with_checkpoint_rows(10_000)
//!     .build()?;
//!
//! let log = controller.run_import().await?;
//! println!("Imported {} rows with {} warnings", log.rows, log.warnings);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Import Controller                        │
//! │        (run log state machine, checkpoints, rollback)        │
//! └──────────────────────────────────────────────────────────────┘
//!        │                   │                      │
//!        ▼                   ▼                      ▼
//! ┌──────────────┐   ┌────────────────┐   ┌────────────────────┐
//! │ArchiveFetcher│   │  RecordReader  │   │    RowProcessor    │
//! │ - HTTP fetch │──▶│ - Windows-1250 │──▶│ - town/street/num  │
//! │ - CRC check  │   │ - `;` CSV      │   │ - ResolverCache    │
//! └──────────────┘   └────────────────┘   │ - Krovak → WGS84   │
//!                                         └────────────────────┘
//!                                                   │
//!                                                   ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 AddressStore (sled overlay)                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod controller;
pub mod error;
pub mod fetcher;
pub mod period;
pub mod processor;
pub mod progress;
pub mod reader;

// Re-export main types
pub use cache::{CachedStreet, ResolverCache};
pub use controller::{ImportController, ImportControllerBuilder};
pub use error::ImportError;
pub use fetcher::{ArchiveFetcher, ArchiveHandle, ArchiveMember};
pub use period::TargetPeriod;
pub use processor::{FileStats, RowOutcome, RowProcessor};
pub use progress::{ImportProgress, RunStats};
pub use reader::{Field, Record, RecordReader};
