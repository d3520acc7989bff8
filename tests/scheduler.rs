//! Integration tests for the rebuild schedules, on tokio's paused clock

mod helpers;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::sleep;

use helpers::{alias, GatedSource, Harness};
use refdata_indexer::ledger::RunStatus;
use refdata_indexer::scheduler::{RebuildScheduler, UpstreamCheck};

/// Answers refreshes from a fixed script, then reports no change.
struct ScriptedCheck {
    answers: Vec<bool>,
    calls: AtomicUsize,
}

impl ScriptedCheck {
    fn new(answers: Vec<bool>) -> Arc<Self> {
        Arc::new(Self {
            answers,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamCheck for ScriptedCheck {
    async fn refresh(&self) -> anyhow::Result<bool> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answers.get(call).copied().unwrap_or(false))
    }
}

async fn harness() -> Harness {
    let h = Harness::with_aliases(vec![alias("coderegistry", &[("coderegistry", false)])]);
    h.seed("coderegistry", 3).await;
    h
}

#[tokio::test(start_paused = true)]
async fn test_reindex_runs_every_interval() {
    let h = harness().await;
    let scheduler = RebuildScheduler::new(h.builder(), Duration::from_secs(60));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = scheduler.spawn(shutdown_rx);
    assert_eq!(handles.len(), 1);

    sleep(Duration::from_secs(59)).await;
    assert!(h.resolve("coderegistry").await.is_empty());

    sleep(Duration::from_secs(2)).await;
    let first = h.resolve("coderegistry").await;
    assert_eq!(first.len(), 1);

    sleep(Duration::from_secs(60)).await;
    let second = h.resolve("coderegistry").await;
    assert_eq!(second.len(), 1);
    assert_ne!(first, second);
    assert_eq!(h.live_generations("coderegistry").await.len(), 1);

    shutdown_tx.send(true).unwrap();
    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn test_upstream_change_triggers_reindex() {
    let h = harness().await;
    let check = ScriptedCheck::new(vec![false, true]);
    let scheduler = RebuildScheduler::new(h.builder(), Duration::from_secs(86_400))
        .with_upstream_check(check.clone(), Duration::from_secs(10));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = scheduler.spawn(shutdown_rx);
    assert_eq!(handles.len(), 2);

    sleep(Duration::from_secs(11)).await;
    assert_eq!(check.calls(), 1);
    assert!(h.resolve("coderegistry").await.is_empty());

    sleep(Duration::from_secs(10)).await;
    assert_eq!(check.calls(), 2);
    assert_eq!(h.resolve("coderegistry").await.len(), 1);

    shutdown_tx.send(true).unwrap();
    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_schedules() {
    let h = harness().await;
    let check = ScriptedCheck::new(vec![true]);
    let scheduler = RebuildScheduler::new(h.builder(), Duration::from_secs(60))
        .with_upstream_check(check.clone(), Duration::from_secs(60));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = scheduler.spawn(shutdown_rx);

    shutdown_tx.send(true).unwrap();
    for handle in handles {
        handle.await.unwrap();
    }

    sleep(Duration::from_secs(600)).await;
    assert_eq!(check.calls(), 0);
    assert!(h.engine.index_names().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_running_rebuild() {
    let h = harness().await;
    let gated = GatedSource::new(h.source.clone());
    let scheduler =
        RebuildScheduler::new(h.builder_with_source(gated.clone()), Duration::from_secs(60));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = scheduler.spawn(shutdown_rx);

    gated.wait_entered_within(Duration::from_secs(120)).await;
    shutdown_tx.send(true).unwrap();
    let stopped = tokio::spawn(async move {
        for handle in handles {
            handle.await.unwrap();
        }
    });

    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    assert!(!stopped.is_finished());
    assert!(h
        .ledger
        .has_running("coderegistry", "coderegistry")
        .await
        .unwrap());

    gated.release();
    stopped.await.unwrap();

    let records = h.versions.records_for("coderegistry", "coderegistry").await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, RunStatus::Successful);
    assert_eq!(h.resolve("coderegistry").await.len(), 1);
}
