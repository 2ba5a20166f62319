use std::{future::Future, time::Duration};
use thiserror::Error;

/// The timer won the race
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation timed out after {}ms", .0.as_millis())]
pub struct TimedOut(pub Duration);

/// Race `operation` against a timer of `limit`.
///
/// When the timer fires first the operation is dropped, which releases
/// whatever it owns (sockets, lookups in progress). Cleanup of values the
/// operation already returned stays with the caller.
///
/// # Errors
///
/// Returns `TimedOut` when `limit` elapses before the operation completes
pub async fn race<F>(limit: Duration, operation: F) -> Result<F::Output, TimedOut>
where
    F: Future,
{
    // zero limits are rejected by ProbeConfig
    debug_assert!(!limit.is_zero(), "race limit must be positive");

    tokio::time::timeout(limit, operation)
        .await
        .map_err(|_| TimedOut(limit))
}
