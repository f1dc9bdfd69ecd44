//! Compile-time registry of upstream tree services.
//!
//! Each entry is a `(name, toml_content)` pair embedded via `include_str!`.
//! Adding a service means creating a TOML file in `services/` and adding a
//! corresponding entry here. [`load_service_file`] reads the same schema
//! from disk for services that are not built in.

use std::path::Path;

use tree_zones_arcgis_models::ServiceDefinition;

use crate::ArcGisError;

/// Number of registered services. Enforced by a test.
#[cfg(test)]
const EXPECTED_SERVICE_COUNT: usize = 1;

/// Service used when none is specified.
pub const DEFAULT_SERVICE_ID: &str = "madison_street_trees";

/// Embedded TOML service definitions.
const SERVICE_TOMLS: &[(&str, &str)] = &[(
    "madison_street_trees",
    include_str!("../services/madison_street_trees.toml"),
)];

/// Returns all registered services.
///
/// # Panics
///
/// Panics if any embedded TOML file fails to parse. Since these are
/// compile-time constants, parse failures indicate a development error
/// and are caught by the tests below.
#[must_use]
pub fn all_services() -> Vec<ServiceDefinition> {
    SERVICE_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse service '{name}': {e}"))
        })
        .collect()
}

/// Looks up a registered service by id.
#[must_use]
pub fn service(id: &str) -> Option<ServiceDefinition> {
    all_services().into_iter().find(|s| s.id == id)
}

/// Reads a service definition from a TOML file.
///
/// # Errors
///
/// Returns [`ArcGisError`] if the file cannot be read or parsed.
pub fn load_service_file(path: &Path) -> Result<ServiceDefinition, ArcGisError> {
    let text = std::fs::read_to_string(path)?;
    Ok(toml::de::from_str(&text)?)
}
