//! Storage port for index generation tracking.

use async_trait::async_trait;

use super::types::{GenerationStatus, IndexGeneration};
use crate::ledger::ports::Result;

/// Durable record of every index generation built for each alias.
///
/// Shares the relational store (and its error type) with the version ledger.
#[async_trait]
pub trait GenerationStore: Send + Sync {
    async fn insert(&self, generation: &IndexGeneration) -> Result<()>;

    /// Fails with `UnknownGeneration` if no generation has this name.
    async fn set_status(&self, name: &str, status: GenerationStatus) -> Result<()>;

    /// Generations of an alias in a given status, oldest first.
    async fn list_by_status(
        &self,
        alias: &str,
        status: GenerationStatus,
    ) -> Result<Vec<IndexGeneration>>;

    /// The most recently modified successful generation of an alias.
    async fn latest_successful(&self, alias: &str) -> Result<Option<IndexGeneration>>;

    /// Name of the alias generation with the highest suffix, in any status.
    async fn newest_name(&self, alias: &str) -> Result<Option<String>>;
}
