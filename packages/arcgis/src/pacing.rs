//! Courtesy pauses between consecutive requests, and cancellation of the
//! request in flight.

use tokio_util::sync::CancellationToken;
use tree_zones_arcgis_models::CourtesyDelay;

use crate::ArcGisError;

/// Waits until the next request may be issued.
///
/// `completed` is the number of requests already issued in this phase. The
/// first request goes out immediately; later ones wait for the courtesy
/// pause owed to the previous request. Cancellation is checked up front and
/// raced against the pause.
///
/// # Errors
///
/// Returns [`ArcGisError::Cancelled`] if `cancel` fires before the request
/// may go out.
pub async fn before_request(
    courtesy: &CourtesyDelay,
    completed: u64,
    cancel: &CancellationToken,
) -> Result<(), ArcGisError> {
    if cancel.is_cancelled() {
        return Err(ArcGisError::Cancelled);
    }

    let delay = if completed == 0 {
        std::time::Duration::ZERO
    } else {
        courtesy.after_request(completed)
    };

    if delay.is_zero() {
        return Ok(());
    }

    log::trace!("Courtesy pause {delay:?} after request {completed}");

    tokio::select! {
        () = cancel.cancelled() => Err(ArcGisError::Cancelled),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}

/// Runs `request` unless `cancel` fires first.
///
/// A cancelled request is dropped where it stands, which also abandons any
/// retry backoff inside it, so no further attempt goes out.
///
/// # Errors
///
/// Returns [`ArcGisError::Cancelled`] if `cancel` fires first, otherwise
/// whatever `request` returns.
pub async fn cancellable<T>(
    cancel: &CancellationToken,
    request: impl Future<Output = Result<T, ArcGisError>>,
) -> Result<T, ArcGisError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ArcGisError::Cancelled),
        result = request => result,
    }
}
