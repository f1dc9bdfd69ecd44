#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Tree record and protection zone types.
//!
//! Defines the raw [`FeatureCollection`] accumulated from a geodata
//! service (or read from disk), the [`NormalizedTreeRecord`] produced by
//! normalizing each feature, and the flat [`ZoneRecord`] row that a
//! rendering layer consumes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Value substituted for missing text fields.
pub const UNKNOWN: &str = "Unknown";

/// Opaque identifier a geodata service uses to address one feature.
///
/// Only used as a handle for batched lookup. Ordering carries no meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub i64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ObjectId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// The `type` tag of a `GeoJSON` feature collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionKind {
    /// `"FeatureCollection"`.
    #[default]
    FeatureCollection,
}

/// An ordered multiset of raw `GeoJSON` features.
///
/// Features are kept as JSON values because property naming differs
/// between sources; interpretation happens at normalization time.
/// Insertion order is batch arrival order, not identifier order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    /// Always `"FeatureCollection"`. Documents that omit it are accepted.
    #[serde(rename = "type", default)]
    pub kind: CollectionKind,
    /// Raw features in arrival order.
    pub features: Vec<serde_json::Value>,
}

impl FeatureCollection {
    /// Creates an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            kind: CollectionKind::FeatureCollection,
            features: Vec::new(),
        }
    }

    /// Wraps already-parsed features.
    #[must_use]
    pub const fn from_features(features: Vec<serde_json::Value>) -> Self {
        Self {
            kind: CollectionKind::FeatureCollection,
            features,
        }
    }

    /// Number of features.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the collection holds no features.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Appends a batch of features, preserving their order.
    pub fn extend(&mut self, features: impl IntoIterator<Item = serde_json::Value>) {
        self.features.extend(features);
    }
}

/// One tree, normalized from a raw feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTreeRecord {
    /// WGS84 longitude in degrees.
    pub longitude: f64,
    /// WGS84 latitude in degrees.
    pub latitude: f64,
    /// Trunk diameter in inches (0 when the source omits it).
    pub diameter: f64,
    /// Common species name.
    pub species_common: String,
    /// Botanical species name.
    pub species_botanical: String,
    /// Inventory status (e.g. `"Active"`).
    pub status: String,
    /// Site identifier; falls back to the object id, then [`UNKNOWN`].
    pub site_id: String,
    /// Service object id, if the feature carried one.
    pub object_id: Option<i64>,
}

/// Circular protection zone derived from a trunk diameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProtectionZone {
    /// Radius in feet.
    pub radius_feet: f64,
    /// Radius in meters.
    pub radius_meters: f64,
}

/// A flat table row: the normalized record plus its protection zone.
///
/// Flat so it serializes directly as a CSV row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRecord {
    /// WGS84 longitude in degrees.
    pub longitude: f64,
    /// WGS84 latitude in degrees.
    pub latitude: f64,
    /// Trunk diameter in inches.
    pub diameter: f64,
    /// Common species name.
    pub species_common: String,
    /// Botanical species name.
    pub species_botanical: String,
    /// Inventory status.
    pub status: String,
    /// Site identifier.
    pub site_id: String,
    /// Service object id.
    pub object_id: Option<i64>,
    /// Protection zone radius in feet.
    pub protection_radius_feet: f64,
    /// Protection zone radius in meters.
    pub protection_radius_meters: f64,
}

impl ZoneRecord {
    /// Attaches a zone to its record.
    #[must_use]
    pub fn new(record: NormalizedTreeRecord, zone: ProtectionZone) -> Self {
        Self {
            longitude: record.longitude,
            latitude: record.latitude,
            diameter: record.diameter,
            species_common: record.species_common,
            species_botanical: record.species_botanical,
            status: record.status,
            site_id: record.site_id,
            object_id: record.object_id,
            protection_radius_feet: zone.radius_feet,
            protection_radius_meters: zone.radius_meters,
        }
    }
}

/// Ordered candidate property keys for each normalized field.
///
/// The first key present with a non-null value wins. Deserializable so a
/// service definition can override the lists for sources with different
/// naming; omitted fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMapping {
    /// Trunk diameter keys.
    pub diameter: Vec<String>,
    /// Common species name keys.
    pub species_common: Vec<String>,
    /// Botanical species name keys.
    pub species_botanical: Vec<String>,
    /// Status keys.
    pub status: Vec<String>,
    /// Site identifier keys.
    pub site_id: Vec<String>,
    /// Object identifier keys.
    pub object_id: Vec<String>,
}

fn keys(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| (*s).to_string()).collect()
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            diameter: keys(&["DIAMETER", "diameter"]),
            species_common: keys(&["SPP_COM", "species_common"]),
            species_botanical: keys(&["SPP_BOT", "species_botanical"]),
            status: keys(&["STATUS", "status"]),
            site_id: keys(&["site_id", "OBJECTID"]),
            object_id: keys(&["OBJECTID", "object_id"]),
        }
    }
}
