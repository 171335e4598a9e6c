//! Retry Policy: exponential backoff limited to transient transport
//! failures.
//!
//! A plain async function over a closure, not a trait: there's only
//! one retry algorithm here, wrapping a single effect, so a function is
//! all the seam needs.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::fleet::FleetResult;

/// Retry parameters for a single operation kind: `max_retries = 3` for
/// `move_shelf`/`return_shelf` and `max_retries = 2` for
/// `move_to_location`/`dock_shelf`/`undock_shelf`.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryConfig {
    pub const fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// Default config for `move_shelf`/`return_shelf`: 3 retries.
    pub const fn shelf_move() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(30))
    }

    /// Default config for `move_to_location`/`dock_shelf`/`undock_shelf`: 2 retries.
    pub const fn navigation() -> Self {
        Self::new(2, Duration::from_secs(1), Duration::from_secs(30))
    }
}

/// Outcome of running an operation under [`with_retry`]: either the
/// underlying effect completed (successfully or not, after however many
/// attempts), or an external cancellation interrupted a backoff sleep.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome {
    Completed(FleetResult),
    Cancelled,
}

/// Run `effect` up to `config.max_retries + 1` times total.
///
/// Returns immediately on success or on any non-transient failure. On a
/// transient failure (a negative transport error code), sleeps
/// `min(base_delay * 2^attempt, max_delay)` and retries. The backoff sleep
/// races `cancel`, so external cancellation during a retry wait is never
/// silently swallowed.
pub async fn with_retry<F, Fut>(config: RetryConfig, cancel: &CancellationToken, mut effect: F) -> RetryOutcome
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = FleetResult>,
{
    let mut attempt: u32 = 0;
    loop {
        if cancel.is_cancelled() {
            return RetryOutcome::Cancelled;
        }

        let result = effect().await;

        if result.ok || !result.is_transient() {
            return RetryOutcome::Completed(result);
        }

        if attempt >= config.max_retries {
            return RetryOutcome::Completed(result);
        }

        let delay = config
            .base_delay
            .saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
            .min(config.max_delay);

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => return RetryOutcome::Cancelled,
        }

        attempt += 1;
    }
}
