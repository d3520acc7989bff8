//! Periodic task loop driven by `tokio::time`, stoppable via a watch channel.
//!
//! Built on tokio's clock, so tests can drive it with a paused runtime
//! instead of waiting on real timers.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Run `task` every `period`, first after one full period, until the
/// shutdown signal is set or its sender is dropped.
///
/// Ticks missed while `task` runs are skipped rather than bunched up.
pub async fn run_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    mut task: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(task = name, period_secs = period.as_secs(), "periodic task started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {
                tracing::debug!(task = name, "periodic task tick");
                task().await;
            }
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    tracing::info!(task = name, "periodic task stopped");
}
