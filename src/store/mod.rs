//! Persistence for towns, streets, numbers and import run logs
//!
//! The import pipeline talks to storage only through [`AddressStore`]. Writes
//! are staged until [`AddressStore::commit`] makes them durable as a unit, or
//! [`AddressStore::rollback`] discards them. Point lookups see staged writes;
//! listing operations (suggestions, log listing, statistics) see committed data.

mod log;
mod sled_store;

pub use log::{EntityCounts, ImportRunLog, RunState};
pub use sled_store::SledStore;

use crate::types::{Number, NumberData, NumberId, Street, StreetId, Town, TownData, TownId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors raised by a store implementation
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("transaction failed: {0}")]
    Transaction(String),

    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("not found: {0}")]
    NotFound(String),
}

/// Row counts of a store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub towns: usize,
    pub streets: usize,
    pub numbers: usize,
    pub runs: usize,
}

/// Repository over the normalized address data
pub trait AddressStore: Send + Sync {
    /// Look up a town by registry code
    fn find_town(&self, code: i64) -> Result<Option<Town>, StoreError>;
    /// Create a town; fails if the code already exists
    fn insert_town(&self, data: &TownData) -> Result<Town, StoreError>;
    /// Overwrite an existing town
    fn update_town(&self, town: &Town) -> Result<(), StoreError>;
    fn town(&self, id: TownId) -> Result<Option<Town>, StoreError>;

    /// Look up a street by name
    fn find_street(&self, name: &str) -> Result<Option<Street>, StoreError>;
    /// Create a street; fails if the name already exists
    fn insert_street(&self, name: &str, town_ids: BTreeSet<TownId>) -> Result<Street, StoreError>;
    /// Overwrite an existing street
    fn update_street(&self, street: &Street) -> Result<(), StoreError>;
    fn street(&self, id: StreetId) -> Result<Option<Street>, StoreError>;

    /// Look up a number by address point code
    fn find_number(&self, code: i64) -> Result<Option<Number>, StoreError>;
    /// Create a number; town and street references must exist
    fn insert_number(&self, data: &NumberData) -> Result<Number, StoreError>;
    /// Overwrite an existing number; town and street references must exist
    fn update_number(&self, number: &Number) -> Result<(), StoreError>;
    fn number(&self, id: NumberId) -> Result<Option<Number>, StoreError>;

    /// Committed streets whose name contains `query` (case-insensitive)
    fn streets_matching(&self, query: &str, limit: usize) -> Result<Vec<Street>, StoreError>;
    /// Committed numbers owned by a street
    fn numbers_of_street(&self, street_id: StreetId) -> Result<Vec<Number>, StoreError>;

    /// Allocate an identifier for a new run log
    fn next_log_id(&self) -> Result<u64, StoreError>;
    fn save_log(&self, log: &ImportRunLog) -> Result<(), StoreError>;
    fn load_log(&self, id: u64) -> Result<Option<ImportRunLog>, StoreError>;
    /// Committed run logs, newest first
    fn logs(&self) -> Result<Vec<ImportRunLog>, StoreError>;

    /// Make all staged writes durable atomically
    fn commit(&self) -> Result<(), StoreError>;
    /// Discard all staged writes
    fn rollback(&self);
    /// Remove all towns, streets and numbers; run logs are kept
    fn truncate(&self) -> Result<(), StoreError>;
    fn stats(&self) -> Result<StoreStats, StoreError>;
}

/// Compose `"number, street, town"` for an address point
pub fn full_address<S: AddressStore + ?Sized>(
    store: &S,
    number: &Number,
) -> Result<String, StoreError> {
    let mut parts = vec![number.name.clone()];
    if let Some(street_id) = number.street_id {
        if let Some(street) = store.street(street_id)? {
            parts.push(street.name);
        }
    }
    if let Some(town_id) = number.town_id {
        if let Some(town) = store.town(town_id)? {
            parts.push(town.name);
        }
    }
    Ok(parts.join(", "))
}
