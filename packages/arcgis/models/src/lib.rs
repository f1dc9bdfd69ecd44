#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `ArcGIS` service definition types.
//!
//! Defines the TOML schema for upstream geodata services: where to query,
//! how large each page and chunk may be, how long to pause between
//! requests, and which property keys the service's features use. Also
//! defines the [`RetrievalState`] machine the retriever walks through.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use tree_zones_models::FieldMapping;

/// An upstream `ArcGIS` layer, deserialized from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    /// Unique service identifier (e.g., `"madison_street_trees"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Layer query URL (up to `.../query`).
    pub query_url: String,
    /// Default `where` clause.
    #[serde(default = "default_where_clause")]
    pub where_clause: String,
    /// Default `outFields` for feature requests.
    #[serde(default = "default_out_fields")]
    pub out_fields: String,
    /// Paging, timeout, and rate-limit settings.
    #[serde(default)]
    pub pagination: PaginationConfig,
    /// Candidate property keys for normalization.
    #[serde(default)]
    pub fields: FieldMapping,
}

fn default_where_clause() -> String {
    "1=1".to_string()
}

fn default_out_fields() -> String {
    "*".to_string()
}

/// Paging, timeout, and retry settings for one service.
///
/// Identifier pages are cheap (integers only) so they are much larger than
/// feature chunks, which carry full geometry and attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Identifiers requested per page (`resultRecordCount`).
    pub id_batch_size: usize,
    /// Identifiers per feature request (`objectIds`).
    pub feature_batch_size: usize,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Retries for transient HTTP failures within a single request.
    pub max_retries: u32,
    /// Pause between consecutive requests.
    pub courtesy: CourtesyDelay,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            id_batch_size: 1000,
            feature_batch_size: 100,
            timeout_secs: 30,
            max_retries: 3,
            courtesy: CourtesyDelay::default(),
        }
    }
}

impl PaginationConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Cooperative rate limiting between consecutive requests.
///
/// A short pause after every request, replaced by a long pause after every
/// `long_delay_every`-th request. The values come from what the upstream
/// service tolerates, so they live in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourtesyDelay {
    /// Pause after an ordinary request, in milliseconds.
    pub short_delay_ms: u64,
    /// Pause after every `long_delay_every`-th request, in milliseconds.
    pub long_delay_ms: u64,
    /// Cadence of long pauses. `0` disables them.
    pub long_delay_every: u32,
}

impl Default for CourtesyDelay {
    fn default() -> Self {
        Self {
            short_delay_ms: 1000,
            long_delay_ms: 5000,
            long_delay_every: 10,
        }
    }
}

impl CourtesyDelay {
    /// No pauses at all.
    pub const NONE: Self = Self {
        short_delay_ms: 0,
        long_delay_ms: 0,
        long_delay_every: 0,
    };

    /// Pause to take after the `completed`-th request (1-based).
    #[must_use]
    pub fn after_request(&self, completed: u64) -> Duration {
        let long = self.long_delay_every > 0
            && completed > 0
            && completed % u64::from(self.long_delay_every) == 0;
        Duration::from_millis(if long {
            self.long_delay_ms
        } else {
            self.short_delay_ms
        })
    }
}

/// Where a retrieval is in the two-phase identifier-then-feature protocol.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RetrievalState {
    /// Nothing requested yet.
    NotStarted,
    /// Paging through identifiers.
    FetchingIds,
    /// Fetching feature chunks.
    FetchingFeatures,
    /// Every identifier was found and every chunk succeeded.
    Done,
    /// Finished with a best-effort result: the identifier phase was cut
    /// short, a chunk failed, or the retrieval was cancelled.
    PartiallyFailed,
}

impl RetrievalState {
    /// Whether the retrieval has stopped.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::PartiallyFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_service_gets_defaults() {
        let def: ServiceDefinition = toml::from_str(
            r#"
            id = "example"
            name = "Example Trees"
            query_url = "https://example.com/arcgis/rest/services/Trees/MapServer/0/query"
            "#,
        )
        .unwrap();
        assert_eq!(def.where_clause, "1=1");
        assert_eq!(def.out_fields, "*");
        assert_eq!(def.pagination, PaginationConfig::default());
        assert_eq!(def.fields, FieldMapping::default());
    }

    #[test]
    fn partial_tables_keep_remaining_defaults() {
        let def: ServiceDefinition = toml::from_str(
            r#"
            id = "example"
            name = "Example Trees"
            query_url = "https://example.com/query"

            [pagination]
            feature_batch_size = 50

            [pagination.courtesy]
            short_delay_ms = 250

            [fields]
            diameter = ["DBH", "dbh"]
            "#,
        )
        .unwrap();
        assert_eq!(def.pagination.feature_batch_size, 50);
        assert_eq!(def.pagination.id_batch_size, 1000);
        assert_eq!(def.pagination.courtesy.short_delay_ms, 250);
        assert_eq!(def.pagination.courtesy.long_delay_every, 10);
        assert_eq!(def.fields.diameter, vec!["DBH", "dbh"]);
        assert_eq!(def.fields.status, FieldMapping::default().status);
    }

    #[test]
    fn long_delay_every_tenth_request() {
        let delay = CourtesyDelay::default();
        assert_eq!(delay.after_request(1), Duration::from_secs(1));
        assert_eq!(delay.after_request(9), Duration::from_secs(1));
        assert_eq!(delay.after_request(10), Duration::from_secs(5));
        assert_eq!(delay.after_request(11), Duration::from_secs(1));
        assert_eq!(delay.after_request(20), Duration::from_secs(5));
    }

    #[test]
    fn zero_cadence_disables_long_delay() {
        let delay = CourtesyDelay {
            long_delay_every: 0,
            ..CourtesyDelay::default()
        };
        assert_eq!(delay.after_request(10), Duration::from_secs(1));
        assert_eq!(CourtesyDelay::NONE.after_request(10), Duration::ZERO);
    }

    #[test]
    fn state_displays_snake_case() {
        assert_eq!(RetrievalState::PartiallyFailed.to_string(), "partially_failed");
        assert!(RetrievalState::Done.is_terminal());
        assert!(!RetrievalState::FetchingIds.is_terminal());
    }
}
