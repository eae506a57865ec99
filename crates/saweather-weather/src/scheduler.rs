//! Background refresh of the signed-in user's location.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::coordinator::FreshnessCoordinator;

/// Shortest allowed tick; `tokio::time::interval` rejects zero.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Periodically refetches the session location once its cache goes stale.
///
/// A tick that finds fresh data does nothing. Shutdown waits for an
/// in-progress fetch to finish so cache writes are never cut short.
pub struct RefreshScheduler {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RefreshScheduler {
    /// Start ticking immediately, then every `interval`. Intervals shorter
    /// than [`MIN_REFRESH_INTERVAL`] are raised to it.
    pub fn spawn(coordinator: Arc<FreshnessCoordinator>, interval: Duration) -> Self {
        if interval < MIN_REFRESH_INTERVAL {
            tracing::warn!(
                "Refresh interval {:?} too short, using {:?}",
                interval,
                MIN_REFRESH_INTERVAL
            );
        }
        let interval = interval.max(MIN_REFRESH_INTERVAL);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!("Weather refresh scheduler started ({:?})", interval);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Some(state) = coordinator.refresh_if_stale().await {
                            tracing::debug!(
                                offline = state.is_offline,
                                "Background refresh finished"
                            );
                        }
                    }
                }
            }

            tracing::info!("Weather refresh scheduler stopped");
        });

        Self { cancel, handle }
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            tracing::error!("Refresh scheduler task failed: {}", e);
        }
    }
}
