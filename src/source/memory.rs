//! Static in-memory entity source.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::traits::{EntitySource, SourceError};
use crate::search::SearchableEntity;

/// Entity collections held in memory, keyed by entity type.
///
/// Types never `put` are unknown; reads of a type marked with `fail_reads`
/// fail until `restore_reads`.
#[derive(Default)]
pub struct StaticEntitySource {
    collections: RwLock<HashMap<String, Vec<SearchableEntity>>>,
    failing: RwLock<HashSet<String>>,
}

impl StaticEntitySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the collection for `entity_type`.
    pub async fn put(&self, entity_type: &str, entities: Vec<SearchableEntity>) {
        self.collections
            .write()
            .await
            .insert(entity_type.to_string(), entities);
    }

    pub async fn fail_reads(&self, entity_type: &str) {
        self.failing.write().await.insert(entity_type.to_string());
    }

    pub async fn restore_reads(&self, entity_type: &str) {
        self.failing.write().await.remove(entity_type);
    }
}

#[async_trait]
impl EntitySource for StaticEntitySource {
    async fn fetch_all(&self, entity_type: &str) -> Result<Vec<SearchableEntity>, SourceError> {
        if self.failing.read().await.contains(entity_type) {
            return Err(SourceError::Read {
                entity_type: entity_type.to_string(),
                source: anyhow::anyhow!("connection reset (simulated)"),
            });
        }
        self.collections
            .read()
            .await
            .get(entity_type)
            .cloned()
            .ok_or_else(|| SourceError::UnknownEntityType(entity_type.to_string()))
    }
}
