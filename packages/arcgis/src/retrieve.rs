//! Two-phase retrieval: identifiers first, then features.
//!
//! [`Retriever::retrieve_all`] runs [`fetch_all_ids`] and then
//! [`fetch_features`] against one service and reports which terminal
//! [`RetrievalState`] it reached, so callers can tell a complete result
//! from a best-effort partial one.

use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tree_zones_arcgis_models::{
    CourtesyDelay, PaginationConfig, RetrievalState, ServiceDefinition,
};
use tree_zones_models::{FeatureCollection, ObjectId};

use crate::features::{FailedChunk, fetch_features};
use crate::http::ArcGisHttpService;
use crate::ids::{Interruption, fetch_all_ids};
use crate::progress::{ProgressCallback, null_progress};
use crate::{ArcGisError, GeodataService};

/// Shared settings for one phase's request loop.
pub struct FetchContext<'a> {
    /// Pause policy between requests.
    pub courtesy: CourtesyDelay,
    /// Checked before every request and during every pause.
    pub cancel: &'a CancellationToken,
    /// Receives per-request progress.
    pub progress: &'a dyn ProgressCallback,
}

/// Outcome of [`Retriever::retrieve_all`].
#[derive(Debug)]
pub struct Retrieval {
    /// [`RetrievalState::Done`] or [`RetrievalState::PartiallyFailed`].
    pub state: RetrievalState,
    /// Every feature retrieved, in chunk arrival order.
    pub collection: FeatureCollection,
    /// Identifiers found by the identifier phase.
    pub identifier_count: usize,
    /// Set when the identifier phase stopped early.
    pub id_interruption: Option<Interruption>,
    /// Feature chunks whose request failed.
    pub failed_chunks: Vec<FailedChunk>,
    /// Identifiers whose features were not fetched because of cancellation.
    pub unattempted_ids: Vec<ObjectId>,
    /// Whether cancellation ended the retrieval.
    pub cancelled: bool,
}

impl Retrieval {
    /// Whether every identifier was found and every chunk succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.state == RetrievalState::Done
    }

    /// Zero features retrieved. Distinct from failure: a complete
    /// retrieval of an empty layer is empty too.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    /// Identifiers whose features were not retrieved (failed chunks, then
    /// unattempted ones). Identifiers the identifier phase never found are
    /// unknowable and not included.
    #[must_use]
    pub fn missing_ids(&self) -> Vec<ObjectId> {
        self.failed_chunks
            .iter()
            .flat_map(|chunk| chunk.ids.iter().copied())
            .chain(self.unattempted_ids.iter().copied())
            .collect()
    }
}

/// Sequences the identifier and feature phases against one service.
pub struct Retriever<S> {
    service: S,
    out_fields: String,
    id_batch_size: NonZeroUsize,
    feature_batch_size: NonZeroUsize,
    courtesy: CourtesyDelay,
    progress: Arc<dyn ProgressCallback>,
    cancel: CancellationToken,
    state: RetrievalState,
}

impl Retriever<ArcGisHttpService> {
    /// Builds an HTTP retriever from a service definition.
    ///
    /// # Errors
    ///
    /// Returns [`ArcGisError`] if the pagination settings are invalid or
    /// the HTTP client cannot be built.
    pub fn for_service(definition: &ServiceDefinition) -> Result<Self, ArcGisError> {
        let service = ArcGisHttpService::new(&definition.query_url, &definition.pagination)?;
        Ok(Self::new(service, &definition.pagination)?.with_out_fields(&definition.out_fields))
    }
}

impl<S: GeodataService> Retriever<S> {
    /// Creates a retriever over `service`.
    ///
    /// # Errors
    ///
    /// Returns [`ArcGisError::Config`] if either batch size is zero.
    pub fn new(service: S, pagination: &PaginationConfig) -> Result<Self, ArcGisError> {
        Ok(Self {
            service,
            out_fields: "*".to_string(),
            id_batch_size: non_zero("id_batch_size", pagination.id_batch_size)?,
            feature_batch_size: non_zero("feature_batch_size", pagination.feature_batch_size)?,
            courtesy: pagination.courtesy,
            progress: null_progress(),
            cancel: CancellationToken::new(),
            state: RetrievalState::NotStarted,
        })
    }

    /// Sets the `outFields` requested for each feature.
    #[must_use]
    pub fn with_out_fields(mut self, out_fields: impl Into<String>) -> Self {
        self.out_fields = out_fields.into();
        self
    }

    /// Reports progress to `progress` instead of discarding it.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Uses `cancel` to stop the retrieval between requests.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// A handle that cancels this retriever's requests.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current (or last terminal) state.
    #[must_use]
    pub const fn state(&self) -> RetrievalState {
        self.state
    }

    /// The underlying geodata service.
    #[must_use]
    pub const fn service(&self) -> &S {
        &self.service
    }

    /// Retrieves every feature matching `where_clause`.
    ///
    /// Never retries across the phase boundary: a caller that wants a full
    /// retry calls this again. An empty identifier set skips the feature
    /// phase entirely.
    pub async fn retrieve_all(&mut self, where_clause: &str) -> Retrieval {
        let ctx = FetchContext {
            courtesy: self.courtesy,
            cancel: &self.cancel,
            progress: self.progress.as_ref(),
        };

        self.state = RetrievalState::FetchingIds;
        log::info!("Step 1: Fetching all object IDs (where {where_clause})...");
        let ids = fetch_all_ids(&self.service, where_clause, self.id_batch_size, &ctx).await;

        let mut retrieval = Retrieval {
            state: RetrievalState::PartiallyFailed,
            collection: FeatureCollection::new(),
            identifier_count: ids.ids.len(),
            cancelled: matches!(
                ids.interruption,
                Some(Interruption {
                    error: ArcGisError::Cancelled,
                    ..
                })
            ),
            id_interruption: ids.interruption,
            failed_chunks: Vec::new(),
            unattempted_ids: Vec::new(),
        };

        if retrieval.cancelled {
            retrieval.unattempted_ids = ids.ids;
        } else if ids.ids.is_empty() {
            log::warn!("No object IDs found with the given criteria");
        } else {
            self.state = RetrievalState::FetchingFeatures;
            log::info!(
                "Step 2: Fetching {} features in batches of {}...",
                ids.ids.len(),
                self.feature_batch_size
            );
            let features = fetch_features(
                &self.service,
                &ids.ids,
                &self.out_fields,
                self.feature_batch_size,
                &ctx,
            )
            .await;

            retrieval.collection = features.collection;
            retrieval.failed_chunks = features.failed_chunks;
            retrieval.unattempted_ids = features.unattempted_ids;
            retrieval.cancelled |= features.cancelled;
        }

        retrieval.state = if retrieval.id_interruption.is_none()
            && retrieval.failed_chunks.is_empty()
            && !retrieval.cancelled
        {
            RetrievalState::Done
        } else {
            RetrievalState::PartiallyFailed
        };
        self.state = retrieval.state;

        let summary = format!(
            "Retrieved {} features ({})",
            retrieval.collection.len(),
            retrieval.state
        );
        log::info!("{summary}");
        self.progress.finish(summary);

        retrieval
    }
}

fn non_zero(name: &str, value: usize) -> Result<NonZeroUsize, ArcGisError> {
    NonZeroUsize::new(value).ok_or_else(|| ArcGisError::Config {
        message: format!("{name} must be greater than zero"),
    })
}
