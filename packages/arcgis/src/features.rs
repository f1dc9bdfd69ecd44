//! Phase two: fetching full features in identifier chunks.
//!
//! Full-geometry responses are much heavier than identifier pages, so the
//! identifier set is split into small contiguous chunks, one request each.
//! A failed chunk is logged, recorded, and skipped; the remaining chunks
//! still run.

use std::num::NonZeroUsize;

use tree_zones_models::{FeatureCollection, ObjectId};

use crate::pacing::{before_request, cancellable};
use crate::{ArcGisError, GeodataService, retrieve::FetchContext};

/// A chunk whose request failed.
#[derive(Debug)]
pub struct FailedChunk {
    /// 0-based chunk number.
    pub index: usize,
    /// Identifiers the chunk asked for.
    pub ids: Vec<ObjectId>,
    /// Why it failed.
    pub error: ArcGisError,
}

/// Result of the feature phase.
#[derive(Debug, Default)]
pub struct FeatureFetch {
    /// Features from every successful chunk, in chunk order.
    pub collection: FeatureCollection,
    /// Number of chunks the identifiers were split into.
    pub total_chunks: usize,
    /// Chunks whose request succeeded.
    pub completed_chunks: usize,
    /// Chunks whose request failed.
    pub failed_chunks: Vec<FailedChunk>,
    /// Identifiers of chunks cut off by cancellation, including one
    /// dropped mid-request.
    pub unattempted_ids: Vec<ObjectId>,
    /// Whether the loop was cancelled before the last chunk.
    pub cancelled: bool,
}

impl FeatureFetch {
    /// Whether every chunk was requested and succeeded.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.failed_chunks.is_empty() && !self.cancelled
    }

    /// Identifiers whose features were not retrieved, in request order.
    #[must_use]
    pub fn missing_ids(&self) -> Vec<ObjectId> {
        self.failed_chunks
            .iter()
            .flat_map(|chunk| chunk.ids.iter().copied())
            .chain(self.unattempted_ids.iter().copied())
            .collect()
    }
}

/// Retrieves full features for `ids` in chunks of at most `chunk_size`.
///
/// Issues exactly `ceil(ids.len() / chunk_size)` requests (fewer only on
/// cancellation), each for a contiguous, non-overlapping slice of `ids`.
/// Progress advances by one per chunk processed, successful or not.
pub async fn fetch_features<S: GeodataService + ?Sized>(
    service: &S,
    ids: &[ObjectId],
    out_fields: &str,
    chunk_size: NonZeroUsize,
    ctx: &FetchContext<'_>,
) -> FeatureFetch {
    let chunks: Vec<&[ObjectId]> = ids.chunks(chunk_size.get()).collect();
    let total = chunks.len();
    let mut fetch = FeatureFetch {
        total_chunks: total,
        ..FeatureFetch::default()
    };

    ctx.progress.set_total(total as u64);

    for (index, chunk) in chunks.iter().enumerate() {
        if let Err(error) = before_request(&ctx.courtesy, index as u64, ctx.cancel).await {
            log::warn!("Feature fetch stopped before batch {}/{total}: {error}", index + 1);
            fetch.cancelled = true;
            fetch.unattempted_ids = chunks[index..].concat();
            break;
        }

        ctx.progress.set_message(format!(
            "Processing batch {}/{total} ({} features)...",
            index + 1,
            chunk.len()
        ));

        match cancellable(ctx.cancel, service.query_features(chunk, out_fields)).await {
            Ok(features) => {
                log::debug!(
                    "Batch {}/{total}: {} features for {} IDs",
                    index + 1,
                    features.len(),
                    chunk.len()
                );
                fetch.completed_chunks += 1;
                fetch.collection.extend(features);
            }
            Err(ArcGisError::Cancelled) => {
                log::warn!("Feature fetch cancelled during batch {}/{total}", index + 1);
                fetch.cancelled = true;
                fetch.unattempted_ids = chunks[index..].concat();
                break;
            }
            Err(error) => {
                log::error!("Error fetching features for batch {}: {error}", index + 1);
                fetch.failed_chunks.push(FailedChunk {
                    index,
                    ids: chunk.to_vec(),
                    error,
                });
            }
        }

        ctx.progress.inc(1);
    }

    if fetch.failed_chunks.is_empty() {
        log::info!(
            "Processed {} features from {} batches",
            fetch.collection.len(),
            fetch.completed_chunks
        );
    } else {
        log::warn!(
            "Processed {} features; {} of {total} batches failed ({} IDs missing)",
            fetch.collection.len(),
            fetch.failed_chunks.len(),
            fetch.missing_ids().len(),
        );
    }

    fetch
}
