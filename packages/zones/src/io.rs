//! Reading feature collections and writing zone tables.
//!
//! A retrieval is saved as a plain `GeoJSON` `FeatureCollection` so later
//! runs can load it from disk instead of paging through the service again.
//! Zone tables are written either as CSV or as a point `FeatureCollection`
//! whose properties carry the table columns.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use tree_zones_models::{FeatureCollection, ZoneRecord};

use crate::ZonesError;

/// File name the street-tree export is usually saved under.
pub const DEFAULT_LOCAL_FILE: &str = "Urban_Forestry_Street_Trees.geojson";

/// Reads a `GeoJSON` `FeatureCollection` document.
///
/// # Errors
///
/// Returns [`ZonesError`] if the file cannot be read or is not a feature
/// collection (no `features` array).
pub fn load_feature_collection(path: &Path) -> Result<FeatureCollection, ZonesError> {
    let reader = BufReader::new(File::open(path)?);
    let collection: FeatureCollection = serde_json::from_reader(reader)?;
    log::info!(
        "Loaded {} features from {}",
        collection.len(),
        path.display()
    );
    Ok(collection)
}

/// Writes a feature collection as `GeoJSON`, creating parent directories.
///
/// # Errors
///
/// Returns [`ZonesError`] if the file cannot be written.
pub fn save_feature_collection(path: &Path, collection: &FeatureCollection) -> Result<(), ZonesError> {
    let mut writer = create(path)?;
    serde_json::to_writer(&mut writer, collection)?;
    writer.flush()?;
    log::info!("Saved {} features to {}", collection.len(), path.display());
    Ok(())
}

/// Writes the zone table as CSV, one row per tree.
///
/// # Errors
///
/// Returns [`ZonesError`] if the file cannot be written.
pub fn write_zones_csv(path: &Path, zones: &[ZoneRecord]) -> Result<(), ZonesError> {
    let mut writer = csv::Writer::from_writer(create(path)?);
    for zone in zones {
        writer.serialize(zone)?;
    }
    writer.flush()?;
    log::info!("Wrote {} zones to {}", zones.len(), path.display());
    Ok(())
}

/// Converts the zone table into point features for map layers.
///
/// # Errors
///
/// Returns [`ZonesError`] if a row cannot be serialized.
pub fn zones_to_geojson(zones: &[ZoneRecord]) -> Result<FeatureCollection, ZonesError> {
    let features = zones
        .iter()
        .map(|zone| {
            Ok(serde_json::json!({
                "type": "Feature",
                "properties": serde_json::to_value(zone)?,
                "geometry": {
                    "type": "Point",
                    "coordinates": [zone.longitude, zone.latitude],
                },
            }))
        })
        .collect::<Result<Vec<_>, serde_json::Error>>()?;
    Ok(FeatureCollection::from_features(features))
}

/// Writes the zone table as a point `FeatureCollection`.
///
/// # Errors
///
/// Returns [`ZonesError`] if the file cannot be written.
pub fn write_zones_geojson(path: &Path, zones: &[ZoneRecord]) -> Result<(), ZonesError> {
    save_feature_collection(path, &zones_to_geojson(zones)?)
}

fn create(path: &Path) -> Result<BufWriter<File>, ZonesError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(BufWriter::new(File::create(path)?))
}
