//! ruian-sync: RÚIAN address point import pipeline
//!
//! Periodically imports the Czech national address registry into a local
//! store of towns, streets and house numbers:
//! - Archive download for a computed target period (ZIP of `;`-delimited,
//!   Windows-1250 encoded files)
//! - Streaming row processing with a per-run resolver cache
//! - S-JTSK (Krovak) to WGS84 coordinate conversion
//! - Checkpointed commits on a sled-backed store, with per-file rollback
//! - Persisted run logs with progress, ETA and crash recovery
//! - Street and house number suggestions for address autocomplete

pub mod config;
pub mod geo;
pub mod import;
pub mod recovery;
pub mod store;
pub mod suggest;
pub mod types;
pub mod util;

pub use config::Config;
pub use types::*;
