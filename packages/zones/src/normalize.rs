//! Normalizes raw `GeoJSON` tree features into [`NormalizedTreeRecord`]s.
//!
//! Property names differ between sources (`DIAMETER` vs `diameter`, ...),
//! so each field is read through the ordered candidate keys of a
//! [`FieldMapping`]. Missing fields take a default; only unusable
//! coordinates make a feature fail.

use serde_json::{Map, Value};
use tree_zones_models::{FeatureCollection, FieldMapping, NormalizedTreeRecord, UNKNOWN};

use crate::NormalizeError;

/// A feature that could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFeature {
    /// Position of the feature in the source collection.
    pub index: usize,
    /// Why it was skipped.
    pub error: NormalizeError,
}

/// Result of normalizing a whole collection.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    /// One record per usable feature, in collection order.
    pub records: Vec<NormalizedTreeRecord>,
    /// Features skipped for malformed geometry.
    pub skipped: Vec<SkippedFeature>,
}

/// Normalizes every feature in `collection`.
///
/// Features with malformed geometry are skipped and reported in
/// [`Normalized::skipped`]; the rest of the collection is still returned.
#[must_use]
pub fn normalize_collection(collection: &FeatureCollection, fields: &FieldMapping) -> Normalized {
    let mut normalized = Normalized::default();

    for (index, feature) in collection.features.iter().enumerate() {
        match normalize_feature(feature, fields) {
            Ok(record) => normalized.records.push(record),
            Err(error) => {
                log::debug!("Skipping feature {index}: {error}");
                normalized.skipped.push(SkippedFeature { index, error });
            }
        }
    }

    if !normalized.skipped.is_empty() {
        log::warn!(
            "Skipped {} of {} features with malformed geometry",
            normalized.skipped.len(),
            collection.len(),
        );
    }

    normalized
}

/// Normalizes a single `GeoJSON` feature.
///
/// # Errors
///
/// Returns [`NormalizeError::MalformedGeometry`] if the feature has no
/// coordinate array, fewer than two coordinates, or non-numeric ones.
pub fn normalize_feature(
    feature: &Value,
    fields: &FieldMapping,
) -> Result<NormalizedTreeRecord, NormalizeError> {
    let (longitude, latitude) = point_coordinates(feature)?;
    let props = feature.get("properties").and_then(Value::as_object);

    Ok(NormalizedTreeRecord {
        longitude,
        latitude,
        diameter: first_of(props, &fields.diameter, as_number).unwrap_or(0.0),
        species_common: text_or_unknown(props, &fields.species_common),
        species_botanical: text_or_unknown(props, &fields.species_botanical),
        status: text_or_unknown(props, &fields.status),
        site_id: first_of(props, &fields.site_id, as_identifier_text)
            .unwrap_or_else(|| UNKNOWN.to_string()),
        object_id: first_of(props, &fields.object_id, as_integer),
    })
}

fn point_coordinates(feature: &Value) -> Result<(f64, f64), NormalizeError> {
    let coords = feature
        .get("geometry")
        .and_then(|g| g.get("coordinates"))
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("missing coordinates"))?;

    if coords.len() < 2 {
        return Err(malformed(format!(
            "expected [longitude, latitude], got {} component(s)",
            coords.len()
        )));
    }

    let longitude = coords[0]
        .as_f64()
        .ok_or_else(|| malformed("longitude is not a number"))?;
    let latitude = coords[1]
        .as_f64()
        .ok_or_else(|| malformed("latitude is not a number"))?;

    Ok((longitude, latitude))
}

fn malformed(reason: impl Into<String>) -> NormalizeError {
    NormalizeError::MalformedGeometry {
        reason: reason.into(),
    }
}

/// Returns the first candidate key whose value converts.
///
/// Null values and values `convert` rejects fall through to the next key.
fn first_of<T>(
    props: Option<&Map<String, Value>>,
    keys: &[String],
    convert: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    let props = props?;
    keys.iter()
        .filter_map(|key| props.get(key))
        .find_map(convert)
}

fn text_or_unknown(props: Option<&Map<String, Value>>, keys: &[String]) -> String {
    first_of(props, keys, as_text).unwrap_or_else(|| UNKNOWN.to_string())
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|v| v.fract() == 0.0 && v.abs() < 9.0e15)
                .map(|v| v as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Site ids are displayed as text but often arrive as integers (or as
/// whole floats from services that store them as doubles).
fn as_identifier_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(_) => as_integer(value)
            .map(|id| id.to_string())
            .or_else(|| as_text(value)),
        _ => as_text(value),
    }
}
