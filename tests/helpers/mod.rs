//! Shared harness for the in-memory integration tests
//!
//! Wires an `IndexBuilder` to the in-memory ledger, generation store, search
//! engine and entity source, keeping handles to each so tests can seed state,
//! inject faults and inspect the result.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;

use refdata_indexer::config::{AliasConfig, EntityTypeConfig};
use refdata_indexer::generation::{GenerationStatus, GenerationStore, InMemoryGenerationStore, IndexGeneration};
use refdata_indexer::ledger::{InMemoryVersionStore, VersionLedger};
use refdata_indexer::search::{
    standard_mapping, AliasAction, IndexAdminTools, InMemorySearchEngine, SearchEngine,
    SearchableEntity,
};
use refdata_indexer::source::{EntitySource, SourceError, StaticEntitySource};
use refdata_indexer::IndexBuilder;

pub struct Harness {
    pub engine: Arc<InMemorySearchEngine>,
    pub source: Arc<StaticEntitySource>,
    pub versions: Arc<InMemoryVersionStore>,
    pub generations: Arc<InMemoryGenerationStore>,
    pub ledger: VersionLedger,
    pub admin: IndexAdminTools,
    pub aliases: Vec<AliasConfig>,
}

impl Harness {
    /// Aliases `coderegistry` (one type) and `code` (code plus an optional
    /// extension type).
    pub fn new() -> Self {
        Self::with_aliases(vec![
            alias("coderegistry", &[("coderegistry", false)]),
            alias("code", &[("code", false), ("extension", true)]),
        ])
    }

    pub fn with_aliases(aliases: Vec<AliasConfig>) -> Self {
        let engine = Arc::new(InMemorySearchEngine::new());
        let versions = Arc::new(InMemoryVersionStore::new());
        Self {
            admin: IndexAdminTools::new(engine.clone(), 10_000),
            engine,
            source: Arc::new(StaticEntitySource::new()),
            ledger: VersionLedger::new(versions.clone()),
            versions,
            generations: Arc::new(InMemoryGenerationStore::new()),
            aliases,
        }
    }

    pub fn builder(&self) -> Arc<IndexBuilder> {
        self.builder_with_source(self.source.clone())
    }

    pub fn builder_with_source(&self, source: Arc<dyn EntitySource>) -> Arc<IndexBuilder> {
        Arc::new(IndexBuilder::new(
            self.ledger.clone(),
            self.generations.clone(),
            self.admin.clone(),
            source,
            self.aliases.clone(),
        ))
    }

    /// Put `count` entities of `entity_type` into the source, ids `<type>-<n>`.
    pub async fn seed(&self, entity_type: &str, count: usize) {
        self.source
            .put(entity_type, entities(entity_type, count))
            .await;
    }

    /// Install an already-built, aliased and successful generation.
    pub async fn install_generation(&self, alias: &str, name: &str) {
        self.engine
            .create_index(name, &standard_mapping())
            .await
            .unwrap();
        self.engine
            .update_aliases(&[AliasAction::add(name, alias)])
            .await
            .unwrap();
        self.generations
            .insert(&IndexGeneration::running(name, alias))
            .await
            .unwrap();
        self.generations
            .set_status(name, GenerationStatus::Successful)
            .await
            .unwrap();
    }

    /// Indices `alias` resolves to right now.
    pub async fn resolve(&self, alias: &str) -> Vec<String> {
        self.engine.indices_for_alias(alias).await.unwrap()
    }

    /// Generations of `alias` that have not been deleted.
    pub async fn live_generations(&self, alias: &str) -> Vec<IndexGeneration> {
        self.generations
            .generations(alias)
            .await
            .into_iter()
            .filter(|g| g.status != GenerationStatus::Deleted)
            .collect()
    }
}

pub fn alias(name: &str, entity_types: &[(&str, bool)]) -> AliasConfig {
    AliasConfig {
        alias: name.to_string(),
        entity_types: entity_types
            .iter()
            .map(|(entity_type, allow_empty)| EntityTypeConfig {
                name: entity_type.to_string(),
                source_table: entity_type.to_string(),
                id_column: "id".to_string(),
                filter: None,
                allow_empty: *allow_empty,
            })
            .collect(),
    }
}

pub fn entities(entity_type: &str, count: usize) -> Vec<SearchableEntity> {
    (1..=count)
        .map(|n| {
            SearchableEntity::new(
                format!("{entity_type}-{n}"),
                entity_type,
                json!({ "codeValue": format!("{n:02}"), "prefLabel": { "en": format!("{entity_type} {n}") } }),
            )
        })
        .collect()
}

/// Entity source that parks every read until released.
pub struct GatedSource {
    inner: Arc<StaticEntitySource>,
    entered: Notify,
    release: Notify,
}

impl GatedSource {
    pub fn new(inner: Arc<StaticEntitySource>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            entered: Notify::new(),
            release: Notify::new(),
        })
    }

    /// Wait until a read is parked at the gate. Panics if none arrives.
    pub async fn wait_entered(&self) {
        self.wait_entered_within(Duration::from_secs(10)).await;
    }

    pub async fn wait_entered_within(&self, limit: Duration) {
        tokio::time::timeout(limit, self.entered.notified())
            .await
            .expect("no read reached the gate");
    }

    /// Let one parked read through.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl EntitySource for GatedSource {
    async fn fetch_all(&self, entity_type: &str) -> Result<Vec<SearchableEntity>, SourceError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.fetch_all(entity_type).await
    }
}
