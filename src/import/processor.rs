//! Row processor: resolves one record into town, street and number rows

use super::cache::{CachedStreet, ResolverCache};
use super::error::ImportError;
use super::reader::{Field, Record};
use crate::geo::{parse_coordinate, KrovakTransformer};
use crate::store::{AddressStore, EntityCounts, StoreError};
use crate::types::{NumberData, NumberId, StreetId, TownData, TownId};
use crate::util::parse_code;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Label used when a row carries neither a house nor an orientation number
pub const UNKNOWN_NUMBER: &str = "Unknown";

/// Counters accumulated while processing rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStats {
    pub rows: u64,
    pub towns: EntityCounts,
    pub streets: EntityCounts,
    pub numbers: EntityCounts,
    pub warnings: u64,
}

impl FileStats {
    pub fn merge(&mut self, other: &FileStats) {
        self.rows += other.rows;
        self.towns.merge(&other.towns);
        self.streets.merge(&other.streets);
        self.numbers.merge(&other.numbers);
        self.warnings += other.warnings;
    }
}

/// What a single row resolved to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowOutcome {
    pub town: Option<TownId>,
    pub street: Option<StreetId>,
    pub number: Option<NumberId>,
    /// Warnings raised by this row
    pub warnings: u64,
}

/// Applies records to an [`AddressStore`] through a [`ResolverCache`]
pub struct RowProcessor<'a> {
    store: &'a dyn AddressStore,
    transformer: &'a KrovakTransformer,
    require_postal_code: bool,
}

impl<'a> RowProcessor<'a> {
    pub fn new(store: &'a dyn AddressStore, transformer: &'a KrovakTransformer) -> Self {
        Self {
            store,
            transformer,
            require_postal_code: false,
        }
    }

    /// Fail the town step when the postal code is empty
    pub fn with_require_postal_code(mut self, required: bool) -> Self {
        self.require_postal_code = required;
        self
    }

    /// Process one record.
    ///
    /// Never fails: a town error leaves the row without a town, and a street
    /// or number error skips the rest of the row. Both count as warnings.
    pub fn process(
        &self,
        row: u64,
        record: &Record,
        cache: &mut ResolverCache,
        stats: &mut FileStats,
    ) -> RowOutcome {
        stats.rows += 1;
        let mut outcome = RowOutcome::default();

        outcome.town = match self.resolve_town(row, record, cache, stats) {
            Ok(town) => town,
            Err(e) => {
                warn!("Town error in row {}: {}", row, e);
                outcome.warnings += 1;
                None
            }
        };

        let rest = self
            .resolve_street(record, outcome.town, cache, stats)
            .and_then(|street| {
                outcome.street = street;
                self.resolve_number(row, record, outcome.town, street, cache, stats)
            });
        match rest {
            Ok(number) => outcome.number = number,
            Err(e) => {
                warn!("Row {} error: {}", row, e);
                outcome.warnings += 1;
            }
        }

        stats.warnings += outcome.warnings;
        outcome
    }

    fn resolve_town(
        &self,
        row: u64,
        record: &Record,
        cache: &mut ResolverCache,
        stats: &mut FileStats,
    ) -> Result<Option<TownId>, ImportError> {
        let raw = record.get(Field::TownCode);
        let code = match parse_code(raw) {
            Ok(Some(code)) => code,
            Ok(None) => return Ok(None),
            Err(e) => return Err(invalid(row, Field::TownCode, raw, e)),
        };
        stats.towns.processed += 1;
        if let Some(id) = cache.town(code) {
            return Ok(Some(id));
        }

        let data = TownData {
            code,
            name: town_name(record),
            postal_code: record.get(Field::PostalCode).trim().to_string(),
        };
        if data.name.is_empty() {
            return Err(row_error(row, format!("town {} has no name", code)));
        }
        if self.require_postal_code && data.postal_code.is_empty() {
            return Err(row_error(row, format!("town {} has no postal code", code)));
        }

        let id = match self.store.find_town(code)? {
            Some(mut town) => {
                if town.name != data.name || town.postal_code != data.postal_code {
                    town.name = data.name;
                    town.postal_code = data.postal_code;
                    self.store.update_town(&town)?;
                }
                stats.towns.updated += 1;
                town.id
            }
            None => {
                let town = self.store.insert_town(&data)?;
                debug!("Created town: {} ({})", town.name, code);
                stats.towns.created += 1;
                town.id
            }
        };
        cache.remember_town(code, id);
        Ok(Some(id))
    }

    fn resolve_street(
        &self,
        record: &Record,
        town: Option<TownId>,
        cache: &mut ResolverCache,
        stats: &mut FileStats,
    ) -> Result<Option<StreetId>, ImportError> {
        let name = record.get(Field::StreetName).trim();
        if name.is_empty() {
            return Ok(None);
        }
        stats.streets.processed += 1;

        let cached = cache
            .street(name)
            .map(|s| (s.id, town.map_or(true, |t| s.town_ids.contains(&t))));
        if let Some((id, linked)) = cached {
            if let (Some(town_id), false) = (town, linked) {
                let mut street = self
                    .store
                    .street(id)?
                    .ok_or_else(|| StoreError::NotFound(format!("street {}", id)))?;
                street.town_ids.insert(town_id);
                self.store.update_street(&street)?;
                cache.link_street_town(name, town_id);
                debug!("Linked street {} to town {}", name, town_id);
            }
            return Ok(Some(id));
        }

        let street = match self.store.find_street(name)? {
            Some(mut street) => {
                if let Some(town_id) = town {
                    if street.town_ids.insert(town_id) {
                        self.store.update_street(&street)?;
                    }
                }
                stats.streets.updated += 1;
                street
            }
            None => {
                let street = self
                    .store
                    .insert_street(name, town.into_iter().collect::<BTreeSet<_>>())?;
                debug!("Created street: {}", name);
                stats.streets.created += 1;
                street
            }
        };
        cache.remember_street(
            name,
            CachedStreet {
                id: street.id,
                town_ids: street.town_ids,
            },
        );
        Ok(Some(street.id))
    }

    fn resolve_number(
        &self,
        row: u64,
        record: &Record,
        town: Option<TownId>,
        street: Option<StreetId>,
        cache: &mut ResolverCache,
        stats: &mut FileStats,
    ) -> Result<Option<NumberId>, ImportError> {
        let raw = record.get(Field::NumberCode);
        let code = match parse_code(raw) {
            Ok(Some(code)) => code,
            Ok(None) => return Ok(None),
            Err(e) => return Err(invalid(row, Field::NumberCode, raw, e)),
        };
        stats.numbers.processed += 1;
        if let Some(id) = cache.number(code) {
            return Ok(Some(id));
        }

        let x = record.get(Field::CoordX);
        let y = record.get(Field::CoordY);
        let data = NumberData {
            code,
            name: number_name(record),
            coord_x: parse_coordinate(x).unwrap_or(0.0),
            coord_y: parse_coordinate(y).unwrap_or(0.0),
            location: self.transformer.transform(Some(x), Some(y)),
            town_id: town,
            street_id: street,
        };

        let id = match self.store.find_number(code)? {
            Some(mut number) => {
                if number.apply(&data) {
                    self.store.update_number(&number)?;
                }
                stats.numbers.updated += 1;
                number.id
            }
            None => {
                let number = self.store.insert_number(&data)?;
                debug!("Created number: {} ({})", number.name, code);
                stats.numbers.created += 1;
                number.id
            }
        };
        cache.remember_number(code, id);
        Ok(Some(id))
    }
}

fn row_error(row: u64, message: String) -> ImportError {
    ImportError::Row { row, message }
}

fn invalid(row: u64, field: Field, raw: &str, err: std::num::ParseIntError) -> ImportError {
    row_error(row, format!("invalid {} '{}': {}", field.header(), raw.trim(), err))
}

/// `"Obec - Část"` when the settlement part differs from the settlement
pub fn town_name(record: &Record) -> String {
    let town = record.get(Field::TownName).trim();
    let part = record.get(Field::TownPartName).trim();
    if !part.is_empty() && part != town {
        format!("{} - {}", town, part)
    } else {
        town.to_string()
    }
}

/// Display label of an address point, e.g. `"12/3a"`
pub fn number_name(record: &Record) -> String {
    let house = record.get(Field::HouseNumber).trim();
    let orientation = record.get(Field::OrientationNumber).trim();
    let letter = record.get(Field::OrientationLetter).trim();

    if !orientation.is_empty() {
        if house.is_empty() {
            format!("{}{}", orientation, letter)
        } else {
            format!("{}/{}{}", house, orientation, letter)
        }
    } else if !house.is_empty() {
        house.to_string()
    } else {
        UNKNOWN_NUMBER.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SledStore;
    use tempfile::TempDir;

    fn row(town_code: &str, town: &str, street: &str, number_code: &str, house: &str) -> Record {
        Record::from_fields([
            (Field::TownCode, town_code),
            (Field::TownName, town),
            (Field::PostalCode, "11000"),
            (Field::StreetName, street),
            (Field::NumberCode, number_code),
            (Field::HouseNumber, house),
            (Field::CoordX, "1043129.70"),
            (Field::CoordY, "743104.50"),
        ])
    }

    struct Fixture {
        _dir: TempDir,
        store: SledStore,
        transformer: KrovakTransformer,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let store = SledStore::open(dir.path()).unwrap();
            Self {
                _dir: dir,
                store,
                transformer: KrovakTransformer::new(),
            }
        }

        fn processor(&self) -> RowProcessor<'_> {
            RowProcessor::new(&self.store, &self.transformer)
        }
    }

    #[test]
    fn test_number_name_variants() {
        let mut record = Record::from_fields([
            (Field::HouseNumber, "12"),
            (Field::OrientationNumber, "3"),
            (Field::OrientationLetter, "a"),
        ]);
        assert_eq!(number_name(&record), "12/3a");

        record = Record::from_fields([(Field::HouseNumber, " 12 ")]);
        assert_eq!(number_name(&record), "12");

        record = Record::from_fields([(Field::OrientationNumber, "5"), (Field::OrientationLetter, "b")]);
        assert_eq!(number_name(&record), "5b");

        assert_eq!(number_name(&Record::default()), UNKNOWN_NUMBER);
    }

    #[test]
    fn test_town_name_composition() {
        let record = Record::from_fields([(Field::TownName, "Praha"), (Field::TownPartName, "Žižkov")]);
        assert_eq!(town_name(&record), "Praha - Žižkov");

        let record = Record::from_fields([(Field::TownName, "Kolín"), (Field::TownPartName, "Kolín")]);
        assert_eq!(town_name(&record), "Kolín");
    }

    #[test]
    fn test_single_row_creates_all_entities() {
        let fx = Fixture::new();
        let mut cache = ResolverCache::new();
        let mut stats = FileStats::default();

        let outcome = fx.processor().process(
            1,
            &row("500123", "Springfield", "Main St", "9001", "12"),
            &mut cache,
            &mut stats,
        );

        assert_eq!(outcome.warnings, 0);
        assert_eq!(stats.towns.created, 1);
        assert_eq!(stats.streets.created, 1);
        assert_eq!(stats.numbers.created, 1);

        let number = fx.store.find_number(9001).unwrap().unwrap();
        assert_eq!(number.town_id, outcome.town);
        assert_eq!(number.street_id, outcome.street);
        assert!((number.lat - 50.086).abs() < 0.01);
        let town = fx.store.town(number.town_id.unwrap()).unwrap().unwrap();
        assert_eq!(town.code, 500123);
    }

    #[test]
    fn test_repeated_keys_hit_the_cache() {
        let fx = Fixture::new();
        let mut cache = ResolverCache::new();
        let mut stats = FileStats::default();
        let processor = fx.processor();

        processor.process(1, &row("1", "A", "Main St", "9001", "1"), &mut cache, &mut stats);
        processor.process(2, &row("1", "A", "Main St", "9001", "1"), &mut cache, &mut stats);

        assert_eq!(stats.rows, 2);
        assert_eq!(stats.towns.processed, 2);
        assert_eq!(stats.towns.created, 1);
        assert_eq!(stats.towns.updated, 0);
        assert_eq!(stats.numbers.created, 1);
    }

    #[test]
    fn test_street_accumulates_towns() {
        let fx = Fixture::new();
        let mut cache = ResolverCache::new();
        let mut stats = FileStats::default();
        let processor = fx.processor();

        let a = processor.process(1, &row("1", "A", "Main St", "1", "1"), &mut cache, &mut stats);
        let b = processor.process(2, &row("2", "B", "Main St", "2", "2"), &mut cache, &mut stats);
        processor.process(3, &row("1", "A", "Main St", "3", "3"), &mut cache, &mut stats);

        let street = fx.store.find_street("Main St").unwrap().unwrap();
        let expected: BTreeSet<TownId> = [a.town.unwrap(), b.town.unwrap()].into();
        assert_eq!(street.town_ids, expected);
        assert_eq!(stats.streets.created, 1);
    }

    #[test]
    fn test_missing_number_code_is_not_a_warning() {
        let fx = Fixture::new();
        let mut cache = ResolverCache::new();
        let mut stats = FileStats::default();

        let outcome = fx.processor().process(
            1,
            &row("1", "A", "Main St", "", "12"),
            &mut cache,
            &mut stats,
        );
        assert_eq!(outcome.warnings, 0);
        assert!(outcome.town.is_some());
        assert!(outcome.street.is_some());
        assert!(outcome.number.is_none());
        assert_eq!(stats.numbers.processed, 0);
    }

    #[test]
    fn test_malformed_number_code_keeps_town_and_street() {
        let fx = Fixture::new();
        let mut cache = ResolverCache::new();
        let mut stats = FileStats::default();

        let outcome = fx.processor().process(
            7,
            &row("1", "A", "Main St", "90x1", "12"),
            &mut cache,
            &mut stats,
        );
        assert_eq!(outcome.warnings, 1);
        assert_eq!(stats.warnings, 1);
        assert!(outcome.street.is_some());
        assert!(fx.store.find_town(1).unwrap().is_some());
        assert!(fx.store.find_street("Main St").unwrap().is_some());
    }

    #[test]
    fn test_town_failure_does_not_stop_the_row() {
        let fx = Fixture::new();
        let mut cache = ResolverCache::new();
        let mut stats = FileStats::default();

        let outcome = fx.processor().process(
            1,
            &row("1", "", "Main St", "9001", "12"),
            &mut cache,
            &mut stats,
        );
        assert_eq!(outcome.warnings, 1);
        assert!(outcome.town.is_none());
        let number = fx.store.find_number(9001).unwrap().unwrap();
        assert_eq!(number.town_id, None);
        assert_eq!(number.street_id, outcome.street);
    }

    #[test]
    fn test_require_postal_code() {
        let fx = Fixture::new();
        let mut cache = ResolverCache::new();
        let mut stats = FileStats::default();
        let processor = fx.processor().with_require_postal_code(true);

        let record = Record::from_fields([(Field::TownCode, "1"), (Field::TownName, "A")]);
        let outcome = processor.process(1, &record, &mut cache, &mut stats);
        assert_eq!(outcome.warnings, 1);
        assert!(fx.store.find_town(1).unwrap().is_none());
    }

    #[test]
    fn test_existing_rows_are_refreshed() {
        let fx = Fixture::new();
        let processor = fx.processor();
        let mut stats = FileStats::default();
        processor.process(
            1,
            &row("1", "Old", "Main St", "9001", "12"),
            &mut ResolverCache::new(),
            &mut stats,
        );

        let mut stats = FileStats::default();
        let record = Record::from_fields([
            (Field::TownCode, "1"),
            (Field::TownName, "New"),
            (Field::StreetName, "Main St"),
            (Field::NumberCode, "9001"),
            (Field::HouseNumber, "14"),
        ]);
        processor.process(1, &record, &mut ResolverCache::new(), &mut stats);

        assert_eq!(stats.towns.updated, 1);
        assert_eq!(stats.towns.created, 0);
        assert_eq!(stats.numbers.updated, 1);
        let town = fx.store.find_town(1).unwrap().unwrap();
        assert_eq!(town.name, "New");
        assert_eq!(town.postal_code, "");
        let number = fx.store.find_number(9001).unwrap().unwrap();
        assert_eq!(number.name, "14");
        assert_eq!((number.lat, number.lon), (0.0, 0.0));
    }
}
