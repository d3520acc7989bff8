//! Read port over the relational store.

use async_trait::async_trait;

use crate::search::SearchableEntity;

/// Errors reading entities from the relational store.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("failed to read {entity_type}: {source}")]
    Read {
        entity_type: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Read-only access to every current row of an entity type.
///
/// Implementations are shared by concurrent alias rebuilds.
#[async_trait]
pub trait EntitySource: Send + Sync {
    async fn fetch_all(&self, entity_type: &str) -> Result<Vec<SearchableEntity>, SourceError>;
}
