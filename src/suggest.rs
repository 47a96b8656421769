//! Street and house number suggestions for address autocomplete

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::store::{AddressStore, StoreError};
use crate::types::{NumberId, StreetId, Town, TownId};

/// Maximum streets returned by [`suggest_streets`]
pub const STREET_SUGGESTION_LIMIT: usize = 10;
/// Maximum numbers returned by [`suggest_numbers_for_street`]
pub const NUMBER_SUGGESTION_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreetSuggestion {
    pub id: StreetId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberSuggestion {
    pub id: NumberId,
    pub number: String,
    pub town_name: String,
    pub postal_code: String,
}

/// Streets whose name contains `query`, ignoring case
pub fn suggest_streets<S: AddressStore + ?Sized>(
    store: &S,
    query: &str,
) -> Result<Vec<StreetSuggestion>, StoreError> {
    Ok(store
        .streets_matching(query, STREET_SUGGESTION_LIMIT)?
        .into_iter()
        .map(|street| StreetSuggestion {
            id: street.id,
            name: street.name,
        })
        .collect())
}

/// Numbers of a street whose label contains `query`, ignoring case
pub fn suggest_numbers_for_street<S: AddressStore + ?Sized>(
    store: &S,
    query: &str,
    street_id: StreetId,
) -> Result<Vec<NumberSuggestion>, StoreError> {
    let needle = query.trim().to_lowercase();
    let mut towns: HashMap<TownId, Option<Town>> = HashMap::new();
    let mut suggestions = Vec::new();

    for number in store.numbers_of_street(street_id)? {
        if !number.name.to_lowercase().contains(&needle) {
            continue;
        }
        let town = match number.town_id {
            Some(town_id) => {
                if !towns.contains_key(&town_id) {
                    towns.insert(town_id, store.town(town_id)?);
                }
                towns.get(&town_id).and_then(|t| t.as_ref())
            }
            None => None,
        };
        suggestions.push(NumberSuggestion {
            id: number.id,
            number: number.name,
            town_name: town.map(|t| t.name.clone()).unwrap_or_default(),
            postal_code: town.map(|t| t.postal_code.clone()).unwrap_or_default(),
        });
        if suggestions.len() >= NUMBER_SUGGESTION_LIMIT {
            break;
        }
    }
    Ok(suggestions)
}

/// Numbers owned by a street
pub fn street_number_count<S: AddressStore + ?Sized>(
    store: &S,
    street_id: StreetId,
) -> Result<usize, StoreError> {
    Ok(store.numbers_of_street(street_id)?.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SledStore;
    use crate::types::{GeoPoint, NumberData, TownData};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn seeded_store(dir: &TempDir) -> (SledStore, StreetId) {
        let store = SledStore::open(dir.path()).unwrap();
        let town = store
            .insert_town(&TownData {
                code: 500123,
                name: "Springfield".to_string(),
                postal_code: "11000".to_string(),
            })
            .unwrap();
        let street = store
            .insert_street("Main Street", BTreeSet::from([town.id]))
            .unwrap();
        for (code, name) in [(1, "12"), (2, "12/3a"), (3, "7"), (4, "120")] {
            store
                .insert_number(&NumberData {
                    code,
                    name: name.to_string(),
                    coord_x: 0.0,
                    coord_y: 0.0,
                    location: GeoPoint::ZERO,
                    town_id: Some(town.id),
                    street_id: Some(street.id),
                })
                .unwrap();
        }
        for i in 0..15 {
            store
                .insert_street(&format!("Main Lane {}", i), BTreeSet::new())
                .unwrap();
        }
        store.commit().unwrap();
        (store, street.id)
    }

    #[test]
    fn test_street_suggestions_are_limited() {
        let temp_dir = TempDir::new().unwrap();
        let (store, _) = seeded_store(&temp_dir);

        assert_eq!(suggest_streets(&store, "main").unwrap().len(), STREET_SUGGESTION_LIMIT);
        let exact = suggest_streets(&store, "STREET").unwrap();
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].name, "Main Street");
    }

    #[test]
    fn test_number_suggestions_carry_town() {
        let temp_dir = TempDir::new().unwrap();
        let (store, street_id) = seeded_store(&temp_dir);

        let found = suggest_numbers_for_street(&store, "12", street_id).unwrap();
        let labels: Vec<&str> = found.iter().map(|s| s.number.as_str()).collect();
        assert_eq!(labels.len(), 3);
        assert!(labels.contains(&"12/3a"));
        assert!(found.iter().all(|s| s.town_name == "Springfield" && s.postal_code == "11000"));

        let upper = suggest_numbers_for_street(&store, "3A", street_id).unwrap();
        assert_eq!(upper.len(), 1);
        assert_eq!(street_number_count(&store, street_id).unwrap(), 4);
        assert!(suggest_numbers_for_street(&store, "", 999_999).unwrap().is_empty());
    }
}
