//! In-memory generation store.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::ports::GenerationStore;
use crate::builder::naming::generation_suffix;
use super::types::{GenerationStatus, IndexGeneration};
use crate::ledger::ports::{LedgerError, Result};

#[derive(Default)]
pub struct InMemoryGenerationStore {
    generations: RwLock<Vec<IndexGeneration>>,
}

impl InMemoryGenerationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every generation of an alias in insertion order.
    pub async fn generations(&self, alias: &str) -> Vec<IndexGeneration> {
        self.generations
            .read()
            .await
            .iter()
            .filter(|g| g.alias == alias)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl GenerationStore for InMemoryGenerationStore {
    async fn insert(&self, generation: &IndexGeneration) -> Result<()> {
        let mut generations = self.generations.write().await;
        if generations.iter().any(|g| g.name == generation.name) {
            return Err(LedgerError::Persistence(anyhow::anyhow!(
                "generation {} already recorded",
                generation.name
            )));
        }
        generations.push(generation.clone());
        Ok(())
    }

    async fn set_status(&self, name: &str, status: GenerationStatus) -> Result<()> {
        let mut generations = self.generations.write().await;
        let generation = generations
            .iter_mut()
            .find(|g| g.name == name)
            .ok_or_else(|| LedgerError::UnknownGeneration(name.to_string()))?;
        generation.status = status;
        generation.modified = Utc::now();
        Ok(())
    }

    async fn list_by_status(
        &self,
        alias: &str,
        status: GenerationStatus,
    ) -> Result<Vec<IndexGeneration>> {
        let mut matching: Vec<IndexGeneration> = self
            .generations
            .read()
            .await
            .iter()
            .filter(|g| g.alias == alias && g.status == status)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created.cmp(&b.created));
        Ok(matching)
    }

    async fn latest_successful(&self, alias: &str) -> Result<Option<IndexGeneration>> {
        Ok(self
            .generations
            .read()
            .await
            .iter()
            .filter(|g| g.alias == alias && g.status == GenerationStatus::Successful)
            .enumerate()
            .max_by_key(|(position, g)| (g.modified, *position))
            .map(|(_, g)| g.clone()))
    }

    async fn newest_name(&self, alias: &str) -> Result<Option<String>> {
        Ok(self
            .generations
            .read()
            .await
            .iter()
            .filter(|g| g.alias == alias)
            .max_by_key(|g| generation_suffix(&g.name, alias))
            .map(|g| g.name.clone()))
    }
}
