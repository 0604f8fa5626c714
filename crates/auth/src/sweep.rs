//! Periodic expiry of tokens whose deadline has passed.
//!
//! Flips `expired` on overdue rows so the stored flags catch up with the
//! deadline. Rows are never deleted and `revoked` is never touched.

use std::sync::Arc;
use std::time::Duration;

use lectern_core::clock::Clock;
use tokio_util::sync::CancellationToken;

use crate::store::{StoreResult, TokenStore};

/// Default time between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Shortest accepted time between sweeps. Shorter intervals are raised to it.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Expire every token whose deadline is at or before the clock's `now`.
///
/// Returns the number of tokens that changed.
pub async fn sweep_once<S: TokenStore + ?Sized>(store: &S, clock: &dyn Clock) -> StoreResult<u64> {
    store.expire_tokens_before(clock.now()).await
}

/// Run the expiry sweep until `cancel` is triggered.
///
/// The first sweep runs immediately. Store failures are logged and the loop
/// carries on with the next tick. An `every` below [`MIN_SWEEP_INTERVAL`],
/// zero included, is raised to it.
pub async fn run<S: TokenStore>(
    store: S,
    clock: Arc<dyn Clock>,
    every: Duration,
    cancel: CancellationToken,
) {
    if every < MIN_SWEEP_INTERVAL {
        tracing::warn!(
            requested_ms = every.as_millis() as u64,
            "Sweep interval too short, using minimum"
        );
    }
    let every = every.max(MIN_SWEEP_INTERVAL);
    tracing::info!(interval_secs = every.as_secs(), "Token expiry sweep started");

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Token expiry sweep stopping");
                break;
            }
            _ = interval.tick() => {
                match sweep_once(&store, clock.as_ref()).await {
                    Ok(expired) => {
                        if expired > 0 {
                            tracing::info!(expired, "Token sweep: expired overdue tokens");
                        } else {
                            tracing::debug!("Token sweep: nothing to expire");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Token sweep failed");
                    }
                }
            }
        }
    }
}
