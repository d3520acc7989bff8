//! Storage port for the version ledger.
//! Implemented by the in-memory and Postgres stores; the ledger service
//! depends only on this trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::types::{RunStatus, VersionRecord};

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors raised by ledger and generation persistence.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The store already holds a running record for this pair.
    #[error("a run is already active for {data_type}/{identifier}")]
    RunAlreadyActive {
        data_type: String,
        identifier: String,
    },

    #[error("version record {0} is not running")]
    NotRunning(Uuid),

    #[error("unknown index generation: {0}")]
    UnknownGeneration(String),

    #[error("ledger persistence failed: {0}")]
    Persistence(#[from] anyhow::Error),
}

/// Durable storage of version records.
///
/// `insert_running` must be atomic with respect to the single-running-record
/// constraint: two concurrent inserts for the same `(data_type, identifier)`
/// must not both succeed.
#[async_trait]
pub trait VersionStore: Send + Sync {
    /// Persist a new running record, or fail with `RunAlreadyActive`.
    async fn insert_running(&self, record: &VersionRecord) -> Result<()>;

    /// Move a running record to a terminal status.
    /// Fails with `NotRunning` if the record is unknown or already terminal.
    async fn finish(&self, id: Uuid, status: RunStatus, modified: DateTime<Utc>) -> Result<()>;

    async fn has_running(&self, data_type: &str, identifier: &str) -> Result<bool>;

    /// The most recently modified successful record for the pair.
    async fn latest_successful(
        &self,
        data_type: &str,
        identifier: &str,
    ) -> Result<Option<VersionRecord>>;

    /// Cancel running records last modified before `cutoff`.
    /// Returns the number of records canceled.
    async fn cancel_stale(
        &self,
        data_type: &str,
        identifier: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64>;
}
