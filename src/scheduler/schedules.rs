use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use super::periodic::run_periodic;
use super::upstream::UpstreamCheck;
use crate::builder::{IndexBuilder, RebuildOutcome};

/// Periodic triggers for full reindexing.
///
/// - reindex: every `reindex_interval`, rebuild every alias
/// - upstream: every `upstream_interval`, refresh upstream data and rebuild
///   every alias only if it changed
pub struct RebuildScheduler {
    builder: Arc<IndexBuilder>,
    reindex_interval: Duration,
    upstream: Option<(Arc<dyn UpstreamCheck>, Duration)>,
}

impl RebuildScheduler {
    pub fn new(builder: Arc<IndexBuilder>, reindex_interval: Duration) -> Self {
        Self {
            builder,
            reindex_interval,
            upstream: None,
        }
    }

    pub fn with_upstream_check(mut self, check: Arc<dyn UpstreamCheck>, interval: Duration) -> Self {
        self.upstream = Some((check, interval));
        self
    }

    /// Start both schedules. They run until `shutdown_rx` reads `true`; a
    /// handle completes only once the rebuilds its schedule started are done.
    pub fn spawn(&self, shutdown_rx: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(2);

        let builder = self.builder.clone();
        let in_flight: Arc<Mutex<Vec<JoinHandle<()>>>> = Arc::default();
        let tick_in_flight = in_flight.clone();
        let reindex = run_periodic(
            "reindex",
            self.reindex_interval,
            shutdown_rx.clone(),
            move || {
                // Spawned so a slow rebuild never delays the next tick; the
                // ledger lease turns an overlapping run into a skip.
                let builder = builder.clone();
                let in_flight = tick_in_flight.clone();
                async move {
                    let mut in_flight = in_flight.lock().await;
                    in_flight.retain(|handle| !handle.is_finished());
                    in_flight.push(tokio::spawn(async move {
                        log_outcomes("reindex", &builder.reindex_everything().await);
                    }));
                }
            },
        );
        handles.push(tokio::spawn(async move {
            reindex.await;
            drain(&in_flight).await;
        }));

        if let Some((check, interval)) = &self.upstream {
            let builder = self.builder.clone();
            let check = check.clone();
            handles.push(tokio::spawn(run_periodic(
                "upstream-check",
                *interval,
                shutdown_rx,
                move || {
                    let builder = builder.clone();
                    let check = check.clone();
                    async move { check_upstream(check.as_ref(), &builder).await }
                },
            )));
        }

        handles
    }
}

async fn check_upstream(check: &dyn UpstreamCheck, builder: &IndexBuilder) {
    match check.refresh().await {
        Ok(true) => {
            tracing::info!("upstream data changed, reindexing");
            log_outcomes("upstream-check", &builder.reindex_everything().await);
        }
        Ok(false) => {
            tracing::debug!("upstream data unchanged");
        }
        Err(e) => {
            tracing::warn!(error = %e, "upstream check failed, will retry next tick");
        }
    }
}

/// Wait for rebuilds still running after the schedule stopped, so none is
/// cut off holding its lease.
async fn drain(in_flight: &Mutex<Vec<JoinHandle<()>>>) {
    let pending = std::mem::take(&mut *in_flight.lock().await);
    let running = pending.iter().filter(|handle| !handle.is_finished()).count();
    if running > 0 {
        tracing::info!(running, "waiting for scheduled rebuilds to finish");
    }
    for handle in pending {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "scheduled rebuild ended abnormally");
        }
    }
}

fn log_outcomes(trigger: &'static str, outcomes: &[RebuildOutcome]) {
    let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
    if failed > 0 {
        tracing::warn!(trigger, aliases = outcomes.len(), failed, "scheduled reindex finished with failures");
    } else {
        tracing::debug!(trigger, aliases = outcomes.len(), "scheduled reindex finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::generation::InMemoryGenerationStore;
    use crate::ledger::{InMemoryVersionStore, VersionLedger};
    use crate::search::{InMemorySearchEngine, IndexAdminTools};
    use crate::source::StaticEntitySource;

    struct ScriptedCheck {
        calls: AtomicUsize,
        answers: Vec<anyhow::Result<bool>>,
    }

    #[async_trait]
    impl UpstreamCheck for ScriptedCheck {
        async fn refresh(&self) -> anyhow::Result<bool> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.answers.get(call) {
                Some(Ok(changed)) => Ok(*changed),
                Some(Err(e)) => Err(anyhow::anyhow!(e.to_string())),
                None => Ok(false),
            }
        }
    }

    #[tokio::test]
    async fn test_upstream_error_is_swallowed() {
        let check = ScriptedCheck {
            calls: AtomicUsize::new(0),
            answers: vec![Err(anyhow::anyhow!("unreachable"))],
        };
        let builder = IndexBuilder::new(
            VersionLedger::new(Arc::new(InMemoryVersionStore::new())),
            Arc::new(InMemoryGenerationStore::new()),
            IndexAdminTools::new(Arc::new(InMemorySearchEngine::new()), 1_000),
            Arc::new(StaticEntitySource::new()),
            Vec::new(),
        );

        check_upstream(&check, &builder).await;
        assert_eq!(check.calls.load(Ordering::SeqCst), 1);
    }
}
