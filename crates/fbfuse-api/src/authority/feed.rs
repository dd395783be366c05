//! Live target-configuration feed with backoff on failure.
//!
//! Follows the authority's latest-target endpoint for one proxy and forwards
//! every *changed* payload through an `mpsc` channel. The first payload the
//! caller already applied is passed in as the baseline so it is not
//! delivered twice.
//!
//! Only transient failures (connection errors, timeouts, 5xx) back off. An
//! authority that answers with a 404 or a rejection is reachable, so the
//! feed keeps its normal poll rate.
//!
//! # Example
//!
//! ```rust,ignore
//! let feed = TargetFeed::spawn(client, "FBFUSE_1".into(), initial, Duration::from_millis(500),
//!     BackoffConfig::default(), cancel.child_token());
//! while let Some(update) = feed.next().await {
//!     apply(update.beams);
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::client::AuthorityClient;
use super::models::TargetConfig;

const UPDATE_CHANNEL_CAPACITY: usize = 16;

// ── BackoffConfig ────────────────────────────────────────────────────

/// Exponential backoff applied while the authority is unreachable.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay after the first failed poll. Default: 500ms.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 10s.
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

// ── TargetFeed ───────────────────────────────────────────────────────

/// Handle to a running target feed.
///
/// Dropping the handle closes the channel, which also stops the task on its
/// next delivery; [`shutdown`](Self::shutdown) stops it immediately.
pub struct TargetFeed {
    update_rx: mpsc::Receiver<TargetConfig>,
    cancel: CancellationToken,
}

impl TargetFeed {
    /// Spawn the polling task and return the handle.
    pub fn spawn(
        client: Arc<AuthorityClient>,
        proxy: String,
        baseline: TargetConfig,
        poll_interval: Duration,
        backoff: BackoffConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (update_tx, update_rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            feed_loop(
                &client,
                &proxy,
                baseline,
                poll_interval,
                &backoff,
                &update_tx,
                &task_cancel,
            )
            .await;
        });

        Self { update_rx, cancel }
    }

    /// Wait for the next changed configuration.
    ///
    /// Returns `None` once the feed has been shut down.
    pub async fn next(&mut self) -> Option<TargetConfig> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            update = self.update_rx.recv() => update,
        }
    }

    /// Signal the background task to stop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background polling loop ──────────────────────────────────────────

async fn feed_loop(
    client: &AuthorityClient,
    proxy: &str,
    baseline: TargetConfig,
    poll_interval: Duration,
    backoff: &BackoffConfig,
    update_tx: &mpsc::Sender<TargetConfig>,
    cancel: &CancellationToken,
) {
    let mut last = baseline;
    let mut failures: u32 = 0;

    loop {
        let delay = if failures == 0 {
            poll_interval
        } else {
            calculate_backoff(failures - 1, backoff)
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        match client.latest_target_config(proxy).await {
            Ok(config) => {
                if failures > 0 {
                    tracing::info!(proxy, failures, "target feed recovered");
                }
                failures = 0;
                if config == last {
                    continue;
                }
                tracing::debug!(proxy, beams = config.beams.len(), "target configuration changed");
                last = config.clone();
                if update_tx.send(config).await.is_err() {
                    break;
                }
            }
            Err(e) if e.is_transient() => {
                failures = failures.saturating_add(1);
                tracing::warn!(proxy, error = %e, failures, "target feed poll failed");
            }
            Err(e) if e.is_not_found() => {
                failures = 0;
                tracing::debug!(proxy, "no target configuration published yet");
            }
            Err(e) => {
                failures = 0;
                tracing::warn!(proxy, error = %e, "target feed poll rejected");
            }
        }
    }

    tracing::debug!(proxy, "target feed exiting");
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 ± 0.25)`
fn calculate_backoff(attempt: u32, config: &BackoffConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    Duration::from_secs_f64((capped * jitter_factor).max(0.0))
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backoff_config() {
        let config = BackoffConfig::default();
        assert_eq!(config.initial_delay, Duration::from_millis(500));
        assert_eq!(config.max_delay, Duration::from_secs(10));
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = BackoffConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = BackoffConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        };

        let d10 = calculate_backoff(10, &config);
        assert!(
            d10 <= Duration::from_millis(12_500),
            "delay at attempt 10 ({d10:?}) should be capped near max_delay"
        );
    }
}
