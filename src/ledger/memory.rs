//! In-memory version store.
//!
//! Holds every record as append-mostly history behind one lock, so the
//! running-record check and the insert happen atomically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::ports::{LedgerError, Result, VersionStore};
use super::types::{RunStatus, VersionRecord};

#[derive(Default)]
pub struct InMemoryVersionStore {
    records: RwLock<Vec<VersionRecord>>,
}

impl InMemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record in insertion order.
    pub async fn records(&self) -> Vec<VersionRecord> {
        self.records.read().await.clone()
    }

    /// Records for one `(data_type, identifier)` pair in insertion order.
    pub async fn records_for(&self, data_type: &str, identifier: &str) -> Vec<VersionRecord> {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.data_type == data_type && r.identifier == identifier)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl VersionStore for InMemoryVersionStore {
    async fn insert_running(&self, record: &VersionRecord) -> Result<()> {
        let mut records = self.records.write().await;
        let conflict = records.iter().any(|r| {
            r.is_running() && r.data_type == record.data_type && r.identifier == record.identifier
        });
        if conflict {
            return Err(LedgerError::RunAlreadyActive {
                data_type: record.data_type.clone(),
                identifier: record.identifier.clone(),
            });
        }
        records.push(record.clone());
        Ok(())
    }

    async fn finish(&self, id: Uuid, status: RunStatus, modified: DateTime<Utc>) -> Result<()> {
        let mut records = self.records.write().await;
        match records.iter_mut().find(|r| r.id == id && r.is_running()) {
            Some(record) => {
                record.status = status;
                record.modified = modified;
                Ok(())
            }
            None => Err(LedgerError::NotRunning(id)),
        }
    }

    async fn has_running(&self, data_type: &str, identifier: &str) -> Result<bool> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .any(|r| r.is_running() && r.data_type == data_type && r.identifier == identifier))
    }

    async fn latest_successful(
        &self,
        data_type: &str,
        identifier: &str,
    ) -> Result<Option<VersionRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| {
                r.status == RunStatus::Successful
                    && r.data_type == data_type
                    && r.identifier == identifier
            })
            // Later inserts win ties on identical timestamps.
            .enumerate()
            .max_by_key(|(position, r)| (r.modified, *position))
            .map(|(_, r)| r.clone()))
    }

    async fn cancel_stale(
        &self,
        data_type: &str,
        identifier: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64> {
        let mut records = self.records.write().await;
        let now = Utc::now();
        let mut canceled = 0;
        for record in records.iter_mut().filter(|r| {
            r.is_running()
                && r.data_type == data_type
                && r.identifier == identifier
                && r.modified <= cutoff
        }) {
            record.status = RunStatus::Canceled;
            record.modified = now;
            canceled += 1;
        }
        Ok(canceled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_running_record_is_rejected() {
        let store = InMemoryVersionStore::new();
        let first = VersionRecord::running("coderegistry", "coderegistry", "internal", "a");
        let second = VersionRecord::running("coderegistry", "coderegistry", "internal", "b");

        store.insert_running(&first).await.unwrap();
        let err = store.insert_running(&second).await.unwrap_err();
        assert!(matches!(err, LedgerError::RunAlreadyActive { .. }));
        assert_eq!(store.records().await.len(), 1);
    }

    #[tokio::test]
    async fn test_running_records_for_other_pairs_do_not_conflict() {
        let store = InMemoryVersionStore::new();
        store
            .insert_running(&VersionRecord::running("coderegistry", "coderegistry", "internal", "a"))
            .await
            .unwrap();
        store
            .insert_running(&VersionRecord::running("codescheme", "codescheme", "internal", "a"))
            .await
            .unwrap();
        assert_eq!(store.records().await.len(), 2);
    }

    #[tokio::test]
    async fn test_finished_record_frees_the_pair() {
        let store = InMemoryVersionStore::new();
        let first = VersionRecord::running("coderegistry", "coderegistry", "internal", "a");
        store.insert_running(&first).await.unwrap();
        store
            .finish(first.id, RunStatus::Failed, Utc::now())
            .await
            .unwrap();

        let second = VersionRecord::running("coderegistry", "coderegistry", "internal", "b");
        store.insert_running(&second).await.unwrap();
        assert!(store.has_running("coderegistry", "coderegistry").await.unwrap());
    }

    #[tokio::test]
    async fn test_finish_unknown_record() {
        let store = InMemoryVersionStore::new();
        let err = store
            .finish(Uuid::new_v4(), RunStatus::Successful, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotRunning(_)));
    }
}
