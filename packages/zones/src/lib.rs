#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Tree feature normalization and protection zone computation.
//!
//! Turns a raw `GeoJSON` [`FeatureCollection`](tree_zones_models::FeatureCollection)
//! into normalized tree records, derives each tree's construction
//! protection zone from its trunk diameter, and writes the resulting table
//! for a rendering layer.

pub mod io;
pub mod normalize;
pub mod policy;
pub mod table;

use thiserror::Error;

/// Errors from reading or writing feature and zone files.
#[derive(Debug, Error)]
pub enum ZonesError {
    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV serialization failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Errors isolated to a single feature during normalization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// The feature has no usable `[longitude, latitude]` pair.
    #[error("Malformed geometry: {reason}")]
    MalformedGeometry {
        /// What was wrong with the coordinates.
        reason: String,
    },
}
