//! sled-backed implementation of [`AddressStore`]
//!
//! Rows are bincode-encoded and keyed by their big-endian store id. Natural
//! keys (town code, street name, number code) live in secondary index trees,
//! and a `street_numbers` tree maps `street_id ++ number_id` for street lookups.
//!
//! Writes go to an in-memory overlay first. `commit` applies the whole overlay
//! in one multi-tree transaction, so entity rows and the run log counters
//! become durable together.

use super::{AddressStore, ImportRunLog, StoreError, StoreStats};
use crate::types::{Number, NumberData, NumberId, Street, StreetId, Town, TownData, TownId};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::TransactionResult;
use sled::Transactional;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info};

/// Database directory name inside the data directory
const DB_DIR: &str = "registry.sled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TreeKind {
    Towns = 0,
    TownCodes = 1,
    Streets = 2,
    StreetNames = 3,
    Numbers = 4,
    NumberCodes = 5,
    StreetNumbers = 6,
    Runs = 7,
}

const TREE_NAMES: [&str; 8] = [
    "towns",
    "town_codes",
    "streets",
    "street_names",
    "numbers",
    "number_codes",
    "street_numbers",
    "runs",
];

const ENTITY_TREES: [TreeKind; 7] = [
    TreeKind::Towns,
    TreeKind::TownCodes,
    TreeKind::Streets,
    TreeKind::StreetNames,
    TreeKind::Numbers,
    TreeKind::NumberCodes,
    TreeKind::StreetNumbers,
];

type Overlay = HashMap<(TreeKind, Vec<u8>), Option<Vec<u8>>>;

/// Address store on top of the sled embedded database
pub struct SledStore {
    db: sled::Db,
    trees: Vec<sled::Tree>,
    /// Staged writes; `None` marks a deletion
    pending: Mutex<Overlay>,
}

impl SledStore {
    /// Open or create the store inside `data_dir`
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = data_dir.as_ref().join(DB_DIR);
        let db = sled::open(&db_path)?;
        let trees = TREE_NAMES
            .iter()
            .map(|name| db.open_tree(name))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("Opened address store at {}", db_path.display());
        Ok(Self {
            db,
            trees,
            pending: Mutex::new(HashMap::new()),
        })
    }

    #[cfg(test)]
    fn pending_writes(&self) -> usize {
        self.pending.lock().len()
    }

    fn tree(&self, kind: TreeKind) -> &sled::Tree {
        &self.trees[kind as usize]
    }

    fn get_raw(&self, kind: TreeKind, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        {
            let pending = self.pending.lock();
            if let Some(staged) = pending.get(&(kind, key.to_vec())) {
                return Ok(staged.clone());
            }
        }
        Ok(self.tree(kind).get(key)?.map(|v| v.to_vec()))
    }

    fn put_raw(&self, kind: TreeKind, key: Vec<u8>, value: Vec<u8>) {
        self.pending.lock().insert((kind, key), Some(value));
    }

    fn delete_raw(&self, kind: TreeKind, key: Vec<u8>) {
        self.pending.lock().insert((kind, key), None);
    }

    fn get_row<T: DeserializeOwned>(
        &self,
        kind: TreeKind,
        key: &[u8],
    ) -> Result<Option<T>, StoreError> {
        match self.get_raw(kind, key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_row<T: Serialize>(&self, kind: TreeKind, key: Vec<u8>, row: &T) -> Result<(), StoreError> {
        let bytes = bincode::serialize(row)?;
        self.put_raw(kind, key, bytes);
        Ok(())
    }

    fn lookup_id(&self, kind: TreeKind, key: &[u8]) -> Result<Option<u64>, StoreError> {
        match self.get_raw(kind, key)? {
            Some(bytes) => decode_id(&bytes).map(Some),
            None => Ok(None),
        }
    }

    fn generate_id(&self) -> Result<u64, StoreError> {
        Ok(self.db.generate_id()? + 1)
    }

    fn ensure_town(&self, id: Option<TownId>) -> Result<(), StoreError> {
        if let Some(id) = id {
            if self.town(id)?.is_none() {
                return Err(StoreError::Integrity(format!("town {} does not exist", id)));
            }
        }
        Ok(())
    }

    fn ensure_street(&self, id: Option<StreetId>) -> Result<(), StoreError> {
        if let Some(id) = id {
            if self.street(id)?.is_none() {
                return Err(StoreError::Integrity(format!("street {} does not exist", id)));
            }
        }
        Ok(())
    }

    fn committed_rows<T: DeserializeOwned>(&self, kind: TreeKind) -> impl Iterator<Item = T> + '_ {
        self.tree(kind)
            .iter()
            .values()
            .filter_map(|r| r.ok())
            .filter_map(|v| bincode::deserialize(&v).ok())
    }
}

fn id_key(id: u64) -> Vec<u8> {
    id.to_be_bytes().to_vec()
}

fn code_key(code: i64) -> Vec<u8> {
    code.to_be_bytes().to_vec()
}

fn street_number_key(street_id: StreetId, number_id: NumberId) -> Vec<u8> {
    let mut key = Vec::with_capacity(16);
    key.extend_from_slice(&street_id.to_be_bytes());
    key.extend_from_slice(&number_id.to_be_bytes());
    key
}

fn decode_id(bytes: &[u8]) -> Result<u64, StoreError> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::Integrity(format!("malformed id of {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(raw))
}

impl AddressStore for SledStore {
    fn find_town(&self, code: i64) -> Result<Option<Town>, StoreError> {
        match self.lookup_id(TreeKind::TownCodes, &code_key(code))? {
            Some(id) => self.town(id),
            None => Ok(None),
        }
    }

    fn insert_town(&self, data: &TownData) -> Result<Town, StoreError> {
        if self.lookup_id(TreeKind::TownCodes, &code_key(data.code))?.is_some() {
            return Err(StoreError::Integrity(format!(
                "town code {} already exists",
                data.code
            )));
        }
        let town = Town {
            id: self.generate_id()?,
            code: data.code,
            name: data.name.clone(),
            postal_code: data.postal_code.clone(),
        };
        self.put_row(TreeKind::Towns, id_key(town.id), &town)?;
        self.put_raw(TreeKind::TownCodes, code_key(town.code), id_key(town.id));
        Ok(town)
    }

    fn update_town(&self, town: &Town) -> Result<(), StoreError> {
        let previous = self
            .town(town.id)?
            .ok_or_else(|| StoreError::NotFound(format!("town {}", town.id)))?;
        if previous.code != town.code {
            return Err(StoreError::Integrity(format!(
                "town {} cannot change code {} to {}",
                town.id, previous.code, town.code
            )));
        }
        self.put_row(TreeKind::Towns, id_key(town.id), town)
    }

    fn town(&self, id: TownId) -> Result<Option<Town>, StoreError> {
        self.get_row(TreeKind::Towns, &id_key(id))
    }

    fn find_street(&self, name: &str) -> Result<Option<Street>, StoreError> {
        match self.lookup_id(TreeKind::StreetNames, name.as_bytes())? {
            Some(id) => self.street(id),
            None => Ok(None),
        }
    }

    fn insert_street(&self, name: &str, town_ids: BTreeSet<TownId>) -> Result<Street, StoreError> {
        if self.lookup_id(TreeKind::StreetNames, name.as_bytes())?.is_some() {
            return Err(StoreError::Integrity(format!("street '{}' already exists", name)));
        }
        for town_id in &town_ids {
            self.ensure_town(Some(*town_id))?;
        }
        let street = Street {
            id: self.generate_id()?,
            name: name.to_string(),
            town_ids,
        };
        self.put_row(TreeKind::Streets, id_key(street.id), &street)?;
        self.put_raw(
            TreeKind::StreetNames,
            street.name.as_bytes().to_vec(),
            id_key(street.id),
        );
        Ok(street)
    }

    fn update_street(&self, street: &Street) -> Result<(), StoreError> {
        let previous = self
            .street(street.id)?
            .ok_or_else(|| StoreError::NotFound(format!("street {}", street.id)))?;
        if previous.name != street.name {
            return Err(StoreError::Integrity(format!(
                "street {} cannot be renamed",
                street.id
            )));
        }
        for town_id in street.town_ids.difference(&previous.town_ids) {
            self.ensure_town(Some(*town_id))?;
        }
        self.put_row(TreeKind::Streets, id_key(street.id), street)
    }

    fn street(&self, id: StreetId) -> Result<Option<Street>, StoreError> {
        self.get_row(TreeKind::Streets, &id_key(id))
    }

    fn find_number(&self, code: i64) -> Result<Option<Number>, StoreError> {
        match self.lookup_id(TreeKind::NumberCodes, &code_key(code))? {
            Some(id) => self.number(id),
            None => Ok(None),
        }
    }

    fn insert_number(&self, data: &NumberData) -> Result<Number, StoreError> {
        if self.lookup_id(TreeKind::NumberCodes, &code_key(data.code))?.is_some() {
            return Err(StoreError::Integrity(format!(
                "number code {} already exists",
                data.code
            )));
        }
        self.ensure_town(data.town_id)?;
        self.ensure_street(data.street_id)?;

        let number = Number {
            id: self.generate_id()?,
            code: data.code,
            name: data.name.clone(),
            coord_x: data.coord_x,
            coord_y: data.coord_y,
            lat: data.location.lat,
            lon: data.location.lon,
            town_id: data.town_id,
            street_id: data.street_id,
        };
        self.put_row(TreeKind::Numbers, id_key(number.id), &number)?;
        self.put_raw(TreeKind::NumberCodes, code_key(number.code), id_key(number.id));
        if let Some(street_id) = number.street_id {
            self.put_raw(
                TreeKind::StreetNumbers,
                street_number_key(street_id, number.id),
                Vec::new(),
            );
        }
        Ok(number)
    }

    fn update_number(&self, number: &Number) -> Result<(), StoreError> {
        let previous = self
            .number(number.id)?
            .ok_or_else(|| StoreError::NotFound(format!("number {}", number.id)))?;
        if previous.code != number.code {
            return Err(StoreError::Integrity(format!(
                "number {} cannot change code {} to {}",
                number.id, previous.code, number.code
            )));
        }
        self.ensure_town(number.town_id)?;
        self.ensure_street(number.street_id)?;

        if previous.street_id != number.street_id {
            if let Some(old) = previous.street_id {
                self.delete_raw(TreeKind::StreetNumbers, street_number_key(old, number.id));
            }
            if let Some(new) = number.street_id {
                self.put_raw(
                    TreeKind::StreetNumbers,
                    street_number_key(new, number.id),
                    Vec::new(),
                );
            }
        }
        self.put_row(TreeKind::Numbers, id_key(number.id), number)
    }

    fn number(&self, id: NumberId) -> Result<Option<Number>, StoreError> {
        self.get_row(TreeKind::Numbers, &id_key(id))
    }

    fn streets_matching(&self, query: &str, limit: usize) -> Result<Vec<Street>, StoreError> {
        let needle = query.trim().to_lowercase();
        Ok(self
            .committed_rows::<Street>(TreeKind::Streets)
            .filter(|street| street.name.to_lowercase().contains(&needle))
            .take(limit)
            .collect())
    }

    fn numbers_of_street(&self, street_id: StreetId) -> Result<Vec<Number>, StoreError> {
        let mut numbers = Vec::new();
        for entry in self
            .tree(TreeKind::StreetNumbers)
            .scan_prefix(street_id.to_be_bytes())
            .keys()
        {
            let key = entry?;
            let number_id = decode_id(&key[8..])?;
            if let Some(bytes) = self.tree(TreeKind::Numbers).get(id_key(number_id))? {
                numbers.push(bincode::deserialize(&bytes)?);
            }
        }
        Ok(numbers)
    }

    fn next_log_id(&self) -> Result<u64, StoreError> {
        self.generate_id()
    }

    fn save_log(&self, log: &ImportRunLog) -> Result<(), StoreError> {
        self.put_row(TreeKind::Runs, id_key(log.id), log)
    }

    fn load_log(&self, id: u64) -> Result<Option<ImportRunLog>, StoreError> {
        self.get_row(TreeKind::Runs, &id_key(id))
    }

    fn logs(&self) -> Result<Vec<ImportRunLog>, StoreError> {
        let mut logs = Vec::new();
        for entry in self.tree(TreeKind::Runs).iter().values().rev() {
            logs.push(bincode::deserialize(&entry?)?);
        }
        Ok(logs)
    }

    fn commit(&self) -> Result<(), StoreError> {
        let staged = std::mem::take(&mut *self.pending.lock());
        if staged.is_empty() {
            return Ok(());
        }

        let result: TransactionResult<(), ()> = self.trees.as_slice().transaction(|views| {
            for ((kind, key), value) in &staged {
                let view = &views[*kind as usize];
                match value {
                    Some(bytes) => {
                        view.insert(key.as_slice(), bytes.as_slice())?;
                    }
                    None => {
                        view.remove(key.as_slice())?;
                    }
                }
            }
            Ok(())
        });
        result.map_err(|e| StoreError::Transaction(format!("{:?}", e)))?;
        self.db.flush()?;
        debug!("Committed {} staged writes", staged.len());
        Ok(())
    }

    fn rollback(&self) {
        let mut pending = self.pending.lock();
        if !pending.is_empty() {
            debug!("Discarding {} staged writes", pending.len());
            pending.clear();
        }
    }

    fn truncate(&self) -> Result<(), StoreError> {
        self.pending
            .lock()
            .retain(|(kind, _), _| !ENTITY_TREES.contains(kind));
        for kind in ENTITY_TREES {
            self.tree(kind).clear()?;
        }
        self.db.flush()?;
        info!("Truncated towns, streets and numbers");
        Ok(())
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        Ok(StoreStats {
            towns: self.tree(TreeKind::Towns).len(),
            streets: self.tree(TreeKind::Streets).len(),
            numbers: self.tree(TreeKind::Numbers).len(),
            runs: self.tree(TreeKind::Runs).len(),
        })
    }
}
