//! Integration tests for version-gated loading
//!
//! These tests verify that:
//! 1. A version applied successfully is never applied again
//! 2. Failed and in-flight attempts never count as applied
//! 3. Startup initialization is tracked as a ledger record

mod helpers;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use proptest::prelude::*;

use helpers::Harness;
use refdata_indexer::ledger::{InMemoryVersionStore, LedgerError, RunStatus, VersionLedger};
use refdata_indexer::loader::{
    DataLoadOrchestrator, DataLoader, LoadStatus, INITIALIZATION_DATA_TYPE,
    INITIALIZATION_IDENTIFIER,
};
use refdata_indexer::RebuildStatus;

// =============================================================================
// Version gate
// =============================================================================

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    /// Once a version is marked successful, the gate stays closed for it
    /// until another version succeeds, whatever happens in between.
    #[test]
    fn gate_closed_for_current_version(
        attempts in prop::collection::vec((0u8..4, any::<bool>()), 1..24)
    ) {
        let rt = runtime();
        rt.block_on(async {
            let ledger = VersionLedger::new(Arc::new(InMemoryVersionStore::new()));
            let mut current: Option<String> = None;

            for (version, succeed) in attempts {
                let version = format!("v{version}");
                let should = ledger.should_apply("codescheme", "default", &version).await.unwrap();
                prop_assert_eq!(should, current.as_deref() != Some(version.as_str()));

                let mut record = ledger
                    .begin_run("codescheme", "default", "internal", &version)
                    .await
                    .unwrap();
                if succeed {
                    ledger.mark_success(&mut record).await.unwrap();
                    current = Some(version.clone());
                } else {
                    ledger.mark_failed(&mut record).await.unwrap();
                }

                if let Some(current) = &current {
                    for _ in 0..2 {
                        prop_assert!(!ledger.should_apply("codescheme", "default", current).await.unwrap());
                    }
                }
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}

#[tokio::test]
async fn test_gate_decisions() {
    let ledger = VersionLedger::new(Arc::new(InMemoryVersionStore::new()));

    assert!(ledger.should_apply("codescheme", "default", "v1").await.unwrap());

    let mut record = ledger
        .begin_run("codescheme", "default", "internal", "v1")
        .await
        .unwrap();
    // in-flight attempts do not close the gate
    assert!(ledger.should_apply("codescheme", "default", "v1").await.unwrap());

    ledger.mark_success(&mut record).await.unwrap();
    assert!(!ledger.should_apply("codescheme", "default", "v1").await.unwrap());
    assert!(ledger.should_apply("codescheme", "default", "v2").await.unwrap());
    // pairs are independent
    assert!(ledger.should_apply("codescheme", "other", "v1").await.unwrap());

    let current = ledger.current_version("codescheme", "default").await.unwrap();
    assert_eq!(current.unwrap().version, "v1");
}

#[tokio::test]
async fn test_second_running_record_rejected() {
    let ledger = VersionLedger::new(Arc::new(InMemoryVersionStore::new()));
    let mut first = ledger
        .begin_run("code", "code", "internal", "code_1")
        .await
        .unwrap();

    let err = ledger
        .begin_run("code", "code", "internal", "code_2")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::RunAlreadyActive { .. }));

    ledger.mark_failed(&mut first).await.unwrap();
    assert_eq!(first.status, RunStatus::Failed);
    ledger
        .begin_run("code", "code", "internal", "code_2")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_terminal_record_cannot_be_marked_again() {
    let ledger = VersionLedger::new(Arc::new(InMemoryVersionStore::new()));
    let mut record = ledger
        .begin_run("code", "code", "internal", "code_1")
        .await
        .unwrap();
    ledger.mark_success(&mut record).await.unwrap();

    let err = ledger.mark_failed(&mut record).await.unwrap_err();
    assert!(matches!(err, LedgerError::NotRunning(id) if id == record.id));
}

// =============================================================================
// Startup orchestration
// =============================================================================

struct FakeLoader {
    data_type: &'static str,
    version: &'static str,
    fail: bool,
    loads: AtomicUsize,
}

impl FakeLoader {
    fn new(data_type: &'static str, version: &'static str, fail: bool) -> Arc<Self> {
        Arc::new(Self {
            data_type,
            version,
            fail,
            loads: AtomicUsize::new(0),
        })
    }

    fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataLoader for FakeLoader {
    fn data_type(&self) -> &str {
        self.data_type
    }

    fn identifier(&self) -> &str {
        "default"
    }

    async fn version(&self) -> anyhow::Result<String> {
        Ok(self.version.to_string())
    }

    async fn load(&self) -> anyhow::Result<()> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("{} rows rejected", self.data_type);
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_initialize_loads_then_rebuilds() {
    let h = Harness::new();
    h.seed("coderegistry", 2).await;
    h.seed("code", 3).await;
    h.source.put("extension", Vec::new()).await;
    let registries = FakeLoader::new("coderegistries", "v1", false);
    let codes = FakeLoader::new("codes", "v1", false);

    let orchestrator = DataLoadOrchestrator::new(h.ledger.clone(), h.builder())
        .with_loader(registries.clone())
        .with_loader(codes.clone());

    let report = orchestrator.initialize().await.unwrap();

    assert!(report.is_success());
    assert!(report.loads.iter().all(|l| l.status == LoadStatus::Applied));
    assert_eq!(report.rebuilds.len(), 2);
    assert!(report.rebuilds.iter().all(|r| r.status == RebuildStatus::Success));
    assert!(!orchestrator.is_initializing().await.unwrap());

    let init = h
        .versions
        .records_for(INITIALIZATION_DATA_TYPE, INITIALIZATION_IDENTIFIER)
        .await;
    assert_eq!(init.len(), 1);
    assert_eq!(init[0].status, RunStatus::Successful);

    // a restart with unchanged data loads nothing
    let report = orchestrator.initialize().await.unwrap();
    assert!(report.loads.iter().all(|l| l.status == LoadStatus::UpToDate));
    assert_eq!(registries.loads(), 1);
    assert_eq!(codes.loads(), 1);
}

#[tokio::test]
async fn test_failed_load_marks_initialization_failed() {
    let h = Harness::new();
    h.seed("coderegistry", 2).await;
    h.seed("code", 3).await;
    h.source.put("extension", Vec::new()).await;
    let broken = FakeLoader::new("codes", "v1", true);

    let orchestrator =
        DataLoadOrchestrator::new(h.ledger.clone(), h.builder()).with_loader(broken.clone());

    let report = orchestrator.initialize().await.unwrap();

    assert!(!report.is_success());
    assert!(matches!(report.loads[0].status, LoadStatus::Failed(ref reason) if reason.contains("rows rejected")));
    // indexes are still rebuilt from what the store holds
    assert_eq!(report.rebuilds.len(), 2);

    let init = h
        .versions
        .records_for(INITIALIZATION_DATA_TYPE, INITIALIZATION_IDENTIFIER)
        .await;
    assert_eq!(init[0].status, RunStatus::Failed);

    // the failed version is retried on the next start
    orchestrator.initialize().await.unwrap();
    assert_eq!(broken.loads(), 2);
}

#[tokio::test]
async fn test_initialize_skipped_while_another_is_running() {
    let h = Harness::new();
    h.ledger
        .begin_run(
            INITIALIZATION_DATA_TYPE,
            INITIALIZATION_IDENTIFIER,
            "internal",
            "2026-01-01T00:00:00Z",
        )
        .await
        .unwrap();
    let loader = FakeLoader::new("codes", "v1", false);

    let orchestrator =
        DataLoadOrchestrator::new(h.ledger.clone(), h.builder()).with_loader(loader.clone());

    assert!(orchestrator.is_initializing().await.unwrap());
    let report = orchestrator.initialize().await.unwrap();
    assert!(report.skipped);
    assert!(report.loads.is_empty());
    assert_eq!(loader.loads(), 0);
    assert!(h.engine.index_names().await.is_empty());
}
