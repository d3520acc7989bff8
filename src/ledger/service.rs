//! The version ledger: idempotency gate for versioned loads and lease
//! bookkeeping for rebuilds.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::ports::{LedgerError, Result, VersionStore};
use super::types::{RunStatus, VersionRecord};

/// Records which `(data_type, identifier, version)` tuples have been applied.
///
/// `begin_run` does not check for an existing running record; the store
/// rejects a second one atomically with [`LedgerError::RunAlreadyActive`].
#[derive(Clone)]
pub struct VersionLedger {
    store: Arc<dyn VersionStore>,
}

impl VersionLedger {
    pub fn new(store: Arc<dyn VersionStore>) -> Self {
        Self { store }
    }

    /// True unless the current applied version for the pair equals `version`.
    pub async fn should_apply(
        &self,
        data_type: &str,
        identifier: &str,
        version: &str,
    ) -> Result<bool> {
        let current = self.store.latest_successful(data_type, identifier).await?;
        let apply = match &current {
            Some(record) => record.version != version,
            None => true,
        };

        tracing::debug!(
            data_type,
            identifier,
            version,
            current = current.as_ref().map(|r| r.version.as_str()),
            apply,
            "version gate evaluated"
        );

        Ok(apply)
    }

    /// Create and persist a running record for a new attempt.
    pub async fn begin_run(
        &self,
        data_type: &str,
        identifier: &str,
        source: &str,
        version: &str,
    ) -> Result<VersionRecord> {
        let record = VersionRecord::running(data_type, identifier, source, version);
        self.store.insert_running(&record).await?;

        tracing::debug!(
            record_id = %record.id,
            data_type,
            identifier,
            version,
            "run started"
        );

        Ok(record)
    }

    pub async fn mark_success(&self, record: &mut VersionRecord) -> Result<()> {
        self.finish(record, RunStatus::Successful).await
    }

    pub async fn mark_failed(&self, record: &mut VersionRecord) -> Result<()> {
        self.finish(record, RunStatus::Failed).await
    }

    pub async fn has_running(&self, data_type: &str, identifier: &str) -> Result<bool> {
        self.store.has_running(data_type, identifier).await
    }

    /// The record defining the currently applied version, if any.
    pub async fn current_version(
        &self,
        data_type: &str,
        identifier: &str,
    ) -> Result<Option<VersionRecord>> {
        self.store.latest_successful(data_type, identifier).await
    }

    /// Cancel running records idle for longer than `lease`.
    pub async fn reclaim_stale(
        &self,
        data_type: &str,
        identifier: &str,
        lease: Duration,
    ) -> Result<u64> {
        let lease = chrono::Duration::from_std(lease)
            .map_err(|e| LedgerError::Persistence(anyhow::anyhow!("invalid lease: {e}")))?;
        let cutoff = Utc::now() - lease;
        let canceled = self.store.cancel_stale(data_type, identifier, cutoff).await?;

        if canceled > 0 {
            tracing::warn!(
                data_type,
                identifier,
                canceled,
                cutoff = %cutoff,
                "reclaimed stale running records"
            );
        }

        Ok(canceled)
    }

    async fn finish(&self, record: &mut VersionRecord, status: RunStatus) -> Result<()> {
        if !record.is_running() {
            return Err(LedgerError::NotRunning(record.id));
        }
        let modified = Utc::now();
        self.store.finish(record.id, status, modified).await?;
        record.status = status;
        record.modified = modified;

        tracing::debug!(
            record_id = %record.id,
            data_type = %record.data_type,
            identifier = %record.identifier,
            status = status.as_str(),
            "run finished"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::memory::InMemoryVersionStore;

    fn ledger() -> VersionLedger {
        VersionLedger::new(Arc::new(InMemoryVersionStore::new()))
    }

    #[tokio::test]
    async fn test_first_run_should_apply() {
        let ledger = ledger();
        assert!(ledger.should_apply("codeschemes", "jhs", "1").await.unwrap());
    }

    #[tokio::test]
    async fn test_same_version_is_skipped_after_success() {
        let ledger = ledger();
        let mut record = ledger
            .begin_run("codeschemes", "jhs", "internal", "1")
            .await
            .unwrap();
        ledger.mark_success(&mut record).await.unwrap();

        assert!(!ledger.should_apply("codeschemes", "jhs", "1").await.unwrap());
        assert!(ledger.should_apply("codeschemes", "jhs", "2").await.unwrap());
        assert!(ledger.should_apply("codeschemes", "other", "1").await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_run_does_not_count_as_applied() {
        let ledger = ledger();
        let mut record = ledger
            .begin_run("codeschemes", "jhs", "internal", "1")
            .await
            .unwrap();
        ledger.mark_failed(&mut record).await.unwrap();

        assert!(ledger.should_apply("codeschemes", "jhs", "1").await.unwrap());
        assert!(!ledger.has_running("codeschemes", "jhs").await.unwrap());
    }

    #[tokio::test]
    async fn test_terminal_record_cannot_be_marked_again() {
        let ledger = ledger();
        let mut record = ledger
            .begin_run("codeschemes", "jhs", "internal", "1")
            .await
            .unwrap();
        ledger.mark_success(&mut record).await.unwrap();

        let err = ledger.mark_failed(&mut record).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotRunning(_)));
        assert_eq!(record.status, RunStatus::Successful);
    }

    #[tokio::test]
    async fn test_current_version_tracks_latest_success() {
        let ledger = ledger();
        for version in ["1", "2"] {
            let mut record = ledger
                .begin_run("codeschemes", "jhs", "internal", version)
                .await
                .unwrap();
            ledger.mark_success(&mut record).await.unwrap();
        }
        let mut failed = ledger
            .begin_run("codeschemes", "jhs", "internal", "3")
            .await
            .unwrap();
        ledger.mark_failed(&mut failed).await.unwrap();

        let current = ledger.current_version("codeschemes", "jhs").await.unwrap();
        assert_eq!(current.unwrap().version, "2");
    }

    #[tokio::test]
    async fn test_zero_lease_reclaims_running_record() {
        let ledger = ledger();
        ledger
            .begin_run("coderegistry", "coderegistry", "internal", "g1")
            .await
            .unwrap();

        let reclaimed = ledger
            .reclaim_stale("coderegistry", "coderegistry", Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(reclaimed, 1);
        assert!(!ledger
            .has_running("coderegistry", "coderegistry")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_long_lease_keeps_running_record() {
        let ledger = ledger();
        ledger
            .begin_run("coderegistry", "coderegistry", "internal", "g1")
            .await
            .unwrap();

        let reclaimed = ledger
            .reclaim_stale("coderegistry", "coderegistry", Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(reclaimed, 0);
        assert!(ledger
            .has_running("coderegistry", "coderegistry")
            .await
            .unwrap());
    }
}
