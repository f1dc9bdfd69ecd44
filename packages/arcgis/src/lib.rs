#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Paginated `ArcGIS` REST client.
//!
//! `ArcGIS` layers cap how many records one query may return, so large
//! layers are retrieved in two phases:
//!
//! 1. [`ids::fetch_all_ids`] pages through `returnIdsOnly=true` queries
//!    with `resultOffset`/`resultRecordCount` until a short page.
//! 2. [`features::fetch_features`] requests full `GeoJSON` features for
//!    fixed-size chunks of those identifiers.
//!
//! [`retrieve::Retriever`] sequences both phases. Requests are strictly
//! sequential with a courtesy pause between them, and a
//! [`CancellationToken`](tokio_util::sync::CancellationToken) is honored
//! between requests. Failures never panic: the identifier phase returns
//! what it collected so far, and the feature phase skips and records
//! failed chunks.

pub mod features;
pub mod http;
pub mod ids;
mod pacing;
pub mod progress;
pub mod registry;
pub mod retrieve;
pub mod retry;

use async_trait::async_trait;
use thiserror::Error;
use tree_zones_models::ObjectId;

pub use tree_zones_arcgis_models::{
    CourtesyDelay, PaginationConfig, RetrievalState, ServiceDefinition,
};

/// Errors that can occur while talking to a geodata service.
#[derive(Debug, Error)]
pub enum ArcGisError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Response status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// The response body did not have the expected shape.
    #[error("Malformed response: {message}")]
    MalformedResponse {
        /// Description of what was wrong.
        message: String,
    },

    /// Service definition or paging parameters are unusable.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },

    /// Service definition TOML failed to parse.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error reading a service definition.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The retrieval was cancelled between requests.
    #[error("Retrieval cancelled")]
    Cancelled,
}

impl ArcGisError {
    /// Network, timeout, or non-2xx failures.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Status { .. })
    }

    /// Responses that arrived but could not be interpreted.
    #[must_use]
    pub const fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedResponse { .. })
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }
}

/// The two queries of the identifier-then-feature protocol.
///
/// [`http::ArcGisHttpService`] implements this over HTTP; tests implement
/// it in memory.
#[async_trait]
pub trait GeodataService: Send + Sync {
    /// Returns one page of identifiers matching `where_clause`, starting
    /// at `offset`. An empty page means there are no more identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`ArcGisError`] if the request fails or the response is
    /// malformed.
    async fn query_ids(
        &self,
        where_clause: &str,
        offset: u64,
        record_count: usize,
    ) -> Result<Vec<ObjectId>, ArcGisError>;

    /// Returns the full `GeoJSON` features for `ids`, with `out_fields`
    /// attributes and geometry.
    ///
    /// # Errors
    ///
    /// Returns [`ArcGisError`] if the request fails or the response is
    /// malformed.
    async fn query_features(
        &self,
        ids: &[ObjectId],
        out_fields: &str,
    ) -> Result<Vec<serde_json::Value>, ArcGisError>;
}

#[async_trait]
impl<S: GeodataService + ?Sized> GeodataService for &S {
    async fn query_ids(
        &self,
        where_clause: &str,
        offset: u64,
        record_count: usize,
    ) -> Result<Vec<ObjectId>, ArcGisError> {
        (**self).query_ids(where_clause, offset, record_count).await
    }

    async fn query_features(
        &self,
        ids: &[ObjectId],
        out_fields: &str,
    ) -> Result<Vec<serde_json::Value>, ArcGisError> {
        (**self).query_features(ids, out_fields).await
    }
}
