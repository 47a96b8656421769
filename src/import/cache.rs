//! Per-run resolver cache
//!
//! Maps natural keys to store ids so every distinct town, street and number
//! is looked up at most once per run. Keys learned since the last checkpoint
//! are journaled; when a file is rolled back those entries are evicted so the
//! cache never points at rows that were discarded.

use crate::types::{NumberId, StreetId, TownId};
use std::collections::{BTreeSet, HashMap};

/// Cached street with the towns already linked to it
#[derive(Debug, Clone, PartialEq)]
pub struct CachedStreet {
    pub id: StreetId,
    pub town_ids: BTreeSet<TownId>,
}

#[derive(Debug, Clone, PartialEq)]
enum Touched {
    Town(i64),
    Street(String),
    Number(i64),
}

/// Natural key to id maps for one import run
#[derive(Debug, Default)]
pub struct ResolverCache {
    towns: HashMap<i64, TownId>,
    streets: HashMap<String, CachedStreet>,
    numbers: HashMap<i64, NumberId>,
    journal: Vec<Touched>,
}

impl ResolverCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn town(&self, code: i64) -> Option<TownId> {
        self.towns.get(&code).copied()
    }

    pub fn remember_town(&mut self, code: i64, id: TownId) {
        self.towns.insert(code, id);
        self.journal.push(Touched::Town(code));
    }

    pub fn street(&self, name: &str) -> Option<&CachedStreet> {
        self.streets.get(name)
    }

    pub fn remember_street(&mut self, name: &str, street: CachedStreet) {
        self.streets.insert(name.to_string(), street);
        self.journal.push(Touched::Street(name.to_string()));
    }

    /// Record a town link added to a cached street
    pub fn link_street_town(&mut self, name: &str, town_id: TownId) {
        if let Some(street) = self.streets.get_mut(name) {
            if street.town_ids.insert(town_id) {
                self.journal.push(Touched::Street(name.to_string()));
            }
        }
    }

    pub fn number(&self, code: i64) -> Option<NumberId> {
        self.numbers.get(&code).copied()
    }

    pub fn remember_number(&mut self, code: i64, id: NumberId) {
        self.numbers.insert(code, id);
        self.journal.push(Touched::Number(code));
    }

    /// Entries learned since the last checkpoint are now durable
    pub fn checkpoint(&mut self) {
        self.journal.clear();
    }

    /// Evict every entry learned or changed since the last checkpoint
    pub fn rollback(&mut self) -> usize {
        let evicted = self.journal.len();
        for touched in self.journal.drain(..) {
            match touched {
                Touched::Town(code) => {
                    self.towns.remove(&code);
                }
                Touched::Street(name) => {
                    self.streets.remove(&name);
                }
                Touched::Number(code) => {
                    self.numbers.remove(&code);
                }
            }
        }
        evicted
    }

    /// Entries cached per kind: towns, streets, numbers
    pub fn sizes(&self) -> (usize, usize, usize) {
        (self.towns.len(), self.streets.len(), self.numbers.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn street(id: StreetId) -> CachedStreet {
        CachedStreet {
            id,
            town_ids: BTreeSet::new(),
        }
    }

    #[test]
    fn test_remember_and_resolve() {
        let mut cache = ResolverCache::new();
        cache.remember_town(500123, 1);
        cache.remember_street("Main St", street(2));
        cache.remember_number(9001, 3);

        assert_eq!(cache.town(500123), Some(1));
        assert_eq!(cache.street("Main St").map(|s| s.id), Some(2));
        assert_eq!(cache.number(9001), Some(3));
        assert_eq!(cache.town(1), None);
        assert_eq!(cache.sizes(), (1, 1, 1));
    }

    #[test]
    fn test_rollback_evicts_only_uncheckpointed_entries() {
        let mut cache = ResolverCache::new();
        cache.remember_town(1, 10);
        cache.remember_street("Main St", street(20));
        cache.checkpoint();

        cache.remember_town(2, 11);
        cache.remember_number(9001, 30);
        assert_eq!(cache.rollback(), 2);

        assert_eq!(cache.town(1), Some(10));
        assert!(cache.street("Main St").is_some());
        assert_eq!(cache.town(2), None);
        assert_eq!(cache.number(9001), None);
    }

    #[test]
    fn test_rollback_evicts_street_with_new_town_link() {
        let mut cache = ResolverCache::new();
        cache.remember_street("Main St", street(20));
        cache.checkpoint();

        cache.link_street_town("Main St", 10);
        // Linking a town that is already known is not a change
        cache.link_street_town("Main St", 10);
        assert_eq!(cache.rollback(), 1);
        assert!(cache.street("Main St").is_none());
    }
}
