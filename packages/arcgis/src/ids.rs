//! Phase one: paging through feature identifiers.
//!
//! Queries with `returnIdsOnly=true` return bare integers, so pages can be
//! large. The offset advances by the number of identifiers actually
//! received. A page shorter than the requested size ends the loop, so
//! `id_batch_size` must not exceed the service's `maxRecordCount`: a
//! capped page would look like the last one.

use std::num::NonZeroUsize;

use tree_zones_models::ObjectId;

use crate::pacing::{before_request, cancellable};
use crate::{ArcGisError, GeodataService, retrieve::FetchContext};

/// Why the identifier loop stopped before reaching the end of the data.
#[derive(Debug)]
pub struct Interruption {
    /// Offset of the request that failed or was not issued.
    pub offset: u64,
    /// The failure. [`ArcGisError::Cancelled`] for cancellation.
    pub error: ArcGisError,
}

/// Result of the identifier phase.
#[derive(Debug)]
pub struct IdFetch {
    /// Identifiers in arrival order. Duplicates are kept.
    pub ids: Vec<ObjectId>,
    /// Identifier requests issued (including a failed one).
    pub requests: usize,
    /// Set when the loop stopped on a failure or cancellation, in which
    /// case `ids` may be incomplete.
    pub interruption: Option<Interruption>,
}

impl IdFetch {
    /// Whether the loop reached the end of the data.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.interruption.is_none()
    }
}

/// Retrieves every identifier matching `where_clause`.
///
/// Stops after the first page holding fewer than `batch_size` identifiers
/// (including an empty page). A page holding more than `batch_size` means
/// the server ignored the paging parameters and returned everything, so
/// the loop stops there too instead of re-reading the same set. A failed
/// or malformed response, or cancellation, ends the loop early with the
/// identifiers collected so far and an [`Interruption`].
pub async fn fetch_all_ids<S: GeodataService + ?Sized>(
    service: &S,
    where_clause: &str,
    batch_size: NonZeroUsize,
    ctx: &FetchContext<'_>,
) -> IdFetch {
    let batch_size = batch_size.get();
    let mut fetch = IdFetch {
        ids: Vec::new(),
        requests: 0,
        interruption: None,
    };
    let mut offset: u64 = 0;

    loop {
        if let Err(error) = before_request(&ctx.courtesy, fetch.requests as u64, ctx.cancel).await
        {
            log::warn!("Identifier fetch stopped at offset {offset}: {error}");
            fetch.interruption = Some(Interruption { offset, error });
            break;
        }

        ctx.progress.set_message(format!(
            "Fetching object IDs: {} retrieved...",
            fetch.ids.len()
        ));

        fetch.requests += 1;
        let request = service.query_ids(where_clause, offset, batch_size);
        let page = match cancellable(ctx.cancel, request).await {
            Ok(page) => page,
            Err(error @ ArcGisError::Cancelled) => {
                log::warn!("Identifier fetch cancelled at offset {offset}");
                fetch.interruption = Some(Interruption { offset, error });
                break;
            }
            Err(error) => {
                log::error!("Error fetching object IDs at offset {offset}: {error}");
                fetch.interruption = Some(Interruption { offset, error });
                break;
            }
        };

        let count = page.len();
        log::debug!("offset={offset}: received {count} object IDs");
        fetch.ids.extend(page);

        if count < batch_size {
            break;
        }
        if count > batch_size {
            log::warn!(
                "Service returned {count} object IDs for a page of {batch_size}; \
                 assuming it ignored paging and sent the full set"
            );
            break;
        }

        offset += count as u64;
    }

    if fetch.is_complete() {
        log::info!(
            "Retrieved {} object IDs in {} requests",
            fetch.ids.len(),
            fetch.requests
        );
    } else {
        log::warn!(
            "Retrieved {} object IDs before stopping; the set may be incomplete",
            fetch.ids.len()
        );
    }

    fetch
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;
    use tree_zones_arcgis_models::CourtesyDelay;

    use super::*;
    use crate::progress::NullProgress;
    use crate::testing::MockService;

    fn batch(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    async fn fetch(service: &MockService, batch_size: usize) -> IdFetch {
        let cancel = CancellationToken::new();
        let ctx = FetchContext {
            courtesy: CourtesyDelay::NONE,
            cancel: &cancel,
            progress: &NullProgress,
        };
        fetch_all_ids(service, "1=1", batch(batch_size), &ctx).await
    }

    #[tokio::test]
    async fn short_last_page_ends_pagination() {
        let service = MockService::with_ids(2500);
        let result = fetch(&service, 1000).await;
        assert!(result.is_complete());
        assert_eq!(result.ids.len(), 2500);
        assert_eq!(result.requests, 3);
        assert_eq!(
            *service.id_calls.lock().unwrap(),
            vec![(0, 1000), (1000, 1000), (2000, 1000)]
        );
    }

    #[tokio::test]
    async fn exact_multiple_needs_one_empty_page() {
        let service = MockService::with_ids(3000);
        let result = fetch(&service, 1000).await;
        assert_eq!(result.ids.len(), 3000);
        assert_eq!(service.id_call_count(), 4);
    }

    #[tokio::test]
    async fn full_page_then_empty_page() {
        let service = MockService::with_pages(vec![
            Ok((1..=1000).map(ObjectId).collect()),
            Ok(Vec::new()),
        ]);
        let result = fetch(&service, 1000).await;
        assert!(result.is_complete());
        assert_eq!(result.ids.len(), 1000);
        assert_eq!(service.id_call_count(), 2);
    }

    #[tokio::test]
    async fn preserves_arrival_order() {
        let service = MockService::with_pages(vec![
            Ok(vec![ObjectId(9), ObjectId(3)]),
            Ok(vec![ObjectId(7)]),
        ]);
        let result = fetch(&service, 2).await;
        assert_eq!(result.ids, vec![ObjectId(9), ObjectId(3), ObjectId(7)]);
    }

    #[tokio::test]
    async fn stops_after_short_page_even_if_service_would_repeat() {
        let service = MockService::with_pages(vec![
            Ok(vec![ObjectId(1), ObjectId(2), ObjectId(3)]),
            Ok(vec![ObjectId(1), ObjectId(2), ObjectId(3)]),
            Ok(vec![ObjectId(1), ObjectId(2), ObjectId(3)]),
        ]);
        let result = fetch(&service, 5).await;
        assert_eq!(result.ids.len(), 3);
        assert_eq!(service.id_call_count(), 1);
    }

    #[tokio::test]
    async fn oversized_page_is_taken_as_full_set() {
        let service = MockService::with_pages(vec![
            Ok((1..=25).map(ObjectId).collect()),
            Ok((1..=25).map(ObjectId).collect()),
        ]);
        let result = fetch(&service, 10).await;
        assert!(result.is_complete());
        assert_eq!(result.ids.len(), 25);
        assert_eq!(service.id_call_count(), 1);
    }

    #[tokio::test]
    async fn offset_advances_by_received_count() {
        let service = MockService::with_pages(vec![
            Ok((1..=4).map(ObjectId).collect()),
            Ok((5..=8).map(ObjectId).collect()),
            Ok(vec![ObjectId(9)]),
        ]);
        fetch(&service, 4).await;
        let offsets: Vec<u64> = service.id_calls.lock().unwrap().iter().map(|c| c.0).collect();
        assert_eq!(offsets, vec![0, 4, 8]);
    }

    #[tokio::test]
    async fn failure_returns_partial_ids_marked_incomplete() {
        let service = MockService::with_pages(vec![
            Ok((1..=10).map(ObjectId).collect()),
            Err(ArcGisError::Status {
                status: 503,
                url: "mock".to_string(),
            }),
            Ok((11..=20).map(ObjectId).collect()),
        ]);
        let result = fetch(&service, 10).await;
        assert!(!result.is_complete());
        assert_eq!(result.ids.len(), 10);
        assert_eq!(result.requests, 2);
        let interruption = result.interruption.unwrap();
        assert_eq!(interruption.offset, 10);
        assert!(interruption.error.is_transport());
    }

    #[tokio::test]
    async fn malformed_page_is_treated_like_transport_failure() {
        let service = MockService::with_pages(vec![Err(ArcGisError::malformed("bad shape"))]);
        let result = fetch(&service, 10).await;
        assert!(result.ids.is_empty());
        assert!(result.interruption.unwrap().error.is_malformed());
    }

    #[tokio::test]
    async fn cancelled_before_start_issues_no_requests() {
        let service = MockService::with_ids(50);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = FetchContext {
            courtesy: CourtesyDelay::NONE,
            cancel: &cancel,
            progress: &NullProgress,
        };
        let result = fetch_all_ids(&service, "1=1", batch(10), &ctx).await;
        assert_eq!(service.id_call_count(), 0);
        assert!(matches!(
            result.interruption,
            Some(Interruption {
                error: ArcGisError::Cancelled,
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn pauses_between_pages() {
        let service = MockService::with_ids(30);
        let cancel = CancellationToken::new();
        let ctx = FetchContext {
            courtesy: CourtesyDelay {
                short_delay_ms: 1000,
                long_delay_ms: 5000,
                long_delay_every: 2,
            },
            cancel: &cancel,
            progress: &NullProgress,
        };
        let start = tokio::time::Instant::now();
        let result = fetch_all_ids(&service, "1=1", batch(10), &ctx).await;
        assert_eq!(result.requests, 4);
        // Pauses after requests 1, 2, 3: short, long, short.
        assert_eq!(start.elapsed(), std::time::Duration::from_secs(7));
    }
}
