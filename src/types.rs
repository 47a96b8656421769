//! Core types for the address registry store

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Store-assigned identifier of a town row
pub type TownId = u64;
/// Store-assigned identifier of a street row
pub type StreetId = u64;
/// Store-assigned identifier of a number (address point) row
pub type NumberId = u64;

/// A settlement or settlement part, keyed by its registry code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Town {
    pub id: TownId,
    /// Registry code (natural key)
    pub code: i64,
    pub name: String,
    pub postal_code: String,
}

/// Values needed to create or refresh a town
#[derive(Debug, Clone, PartialEq)]
pub struct TownData {
    pub code: i64,
    pub name: String,
    pub postal_code: String,
}

/// A named thoroughfare
///
/// Street names are treated as unique across the whole dataset, so a street
/// accumulates every town it was seen in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Street {
    pub id: StreetId,
    /// Street name (natural key)
    pub name: String,
    /// Towns this street runs through; only ever grows
    pub town_ids: BTreeSet<TownId>,
}

/// An address point (house number with coordinates)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Number {
    pub id: NumberId,
    /// Address point code (natural key)
    pub code: i64,
    /// Display label, e.g. `"12/3a"`
    pub name: String,
    /// Projected S-JTSK coordinates as delivered by the registry
    pub coord_x: f64,
    pub coord_y: f64,
    /// WGS84 coordinates
    pub lat: f64,
    pub lon: f64,
    pub town_id: Option<TownId>,
    pub street_id: Option<StreetId>,
}

/// Values needed to create or refresh a number
#[derive(Debug, Clone, PartialEq)]
pub struct NumberData {
    pub code: i64,
    pub name: String,
    pub coord_x: f64,
    pub coord_y: f64,
    pub location: GeoPoint,
    pub town_id: Option<TownId>,
    pub street_id: Option<StreetId>,
}

impl Number {
    /// Copy refreshed values onto an existing row, keeping its identity.
    ///
    /// Returns `true` when anything changed.
    pub fn apply(&mut self, data: &NumberData) -> bool {
        let updated = Number {
            id: self.id,
            code: self.code,
            name: data.name.clone(),
            coord_x: data.coord_x,
            coord_y: data.coord_y,
            lat: data.location.lat,
            lon: data.location.lon,
            town_id: data.town_id,
            street_id: data.street_id,
        };
        if *self == updated {
            return false;
        }
        *self = updated;
        true
    }
}

/// Geographic point in WGS84 degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// Sentinel returned for missing or unparseable source coordinates
    pub const ZERO: GeoPoint = GeoPoint { lat: 0.0, lon: 0.0 };

    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_zero(&self) -> bool {
        self.lat == 0.0 && self.lon == 0.0
    }
}
