//! Full rebuild of one alias with an atomic cutover.
//!
//! ```text
//! [idle] --start--> [guard-check] --(running record exists)--> [skip, idle]
//!                                 --(no running record)-------> [building]
//! [building] --(all entity types written, zero failures)--> [swapping]
//! [building] --(any type reports failures)-------------------> [failed]
//! [swapping] --(alias swap acknowledged)----------------------> [cleanup]
//! [swapping] --(swap not acknowledged / transport error)-------> [failed]
//! [cleanup]  --(old generations deleted)------------------------> [idle, success recorded]
//! [failed]   --(new, half-built generation deleted)-------------> [idle, failure recorded]
//! ```
//!
//! The lease is the ledger's running record for `(alias, alias)`, so the
//! guard also holds across processes sharing one database. Once a record is
//! started it always ends successful or failed, even when bookkeeping errors.
//! A stale lease, when configured, must outlast the longest rebuild: the
//! record is not refreshed while a build runs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;

use super::naming::{generation_suffix, GenerationNamer};
use super::outcome::{RebuildError, RebuildOutcome};
use crate::config::AliasConfig;
use crate::generation::{GenerationStatus, GenerationStore, IndexGeneration};
use crate::ledger::{LedgerError, VersionLedger, VersionRecord};
use crate::search::{standard_mapping, IndexAdminTools};
use crate::source::EntitySource;

/// Source tag on version records written by rebuilds.
pub const REBUILD_SOURCE: &str = "internal";

/// Why a build was abandoned before cutover.
struct BuildFailure {
    reason: String,
    items_written: usize,
}

impl BuildFailure {
    fn new(reason: impl Into<String>, items_written: usize) -> Self {
        Self {
            reason: reason.into(),
            items_written,
        }
    }
}

/// Observable state of one alias.
#[derive(Debug, Clone, Serialize)]
pub struct AliasStatus {
    pub alias: String,
    /// Indices the alias resolves to right now.
    pub resolves_to: Vec<String>,
    /// Latest generation recorded as successful.
    pub current_generation: Option<String>,
    pub rebuild_in_progress: bool,
}

/// Rebuilds aliases from the relational store.
pub struct IndexBuilder {
    ledger: VersionLedger,
    generations: Arc<dyn GenerationStore>,
    admin: IndexAdminTools,
    source: Arc<dyn EntitySource>,
    aliases: Vec<AliasConfig>,
    mapping: Value,
    stale_lease: Option<Duration>,
    namer: GenerationNamer,
}

impl IndexBuilder {
    pub fn new(
        ledger: VersionLedger,
        generations: Arc<dyn GenerationStore>,
        admin: IndexAdminTools,
        source: Arc<dyn EntitySource>,
        aliases: Vec<AliasConfig>,
    ) -> Self {
        Self {
            ledger,
            generations,
            admin,
            source,
            aliases,
            mapping: standard_mapping(),
            stale_lease: None,
            namer: GenerationNamer::new(),
        }
    }

    /// Reclaim running records older than `lease` before each rebuild.
    pub fn with_stale_lease(mut self, lease: Option<Duration>) -> Self {
        self.stale_lease = lease;
        self
    }

    pub fn with_mapping(mut self, mapping: Value) -> Self {
        self.mapping = mapping;
        self
    }

    /// Configured alias names, in configuration order.
    pub fn aliases(&self) -> Vec<&str> {
        self.aliases.iter().map(|a| a.alias.as_str()).collect()
    }

    pub async fn is_rebuild_in_progress(&self, alias: &str) -> Result<bool, RebuildError> {
        self.alias_config(alias)?;
        Ok(self.ledger.has_running(alias, alias).await?)
    }

    /// Rebuild every configured alias concurrently.
    ///
    /// Each alias is independent: an error rebuilding one is reported as a
    /// failed outcome for that alias and does not stop the others.
    pub async fn reindex_everything(&self) -> Vec<RebuildOutcome> {
        let rebuilds = self.aliases.iter().map(|config| async move {
            let started = Instant::now();
            match self.rebuild(&config.alias).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(alias = %config.alias, error = %e, "rebuild errored");
                    RebuildOutcome::failed(&config.alias, None, 0, started.elapsed(), e.to_string())
                }
            }
        });
        futures::future::join_all(rebuilds).await
    }

    /// Rebuild `alias` into a fresh generation and cut readers over to it.
    ///
    /// Returns a skipped outcome when another rebuild holds the lease and a
    /// failed outcome when the build or cutover did not complete; in both
    /// cases the generation readers see is untouched. Ledger errors are
    /// returned as `RebuildError::Ledger`.
    pub async fn rebuild(&self, alias: &str) -> Result<RebuildOutcome, RebuildError> {
        let started = Instant::now();
        let config = self.alias_config(alias)?;

        if let Some(lease) = self.stale_lease {
            self.ledger.reclaim_stale(alias, alias, lease).await?;
        }

        if self.ledger.has_running(alias, alias).await? {
            tracing::info!(alias, "rebuild already in progress, skipping");
            return Ok(RebuildOutcome::skipped(alias, started.elapsed()));
        }

        let floor = self
            .generations
            .newest_name(alias)
            .await?
            .and_then(|name| generation_suffix(&name, alias));
        let generation_name = self.namer.next_after(alias, floor);
        let mut record = match self
            .ledger
            .begin_run(alias, alias, REBUILD_SOURCE, &generation_name)
            .await
        {
            Ok(record) => record,
            Err(LedgerError::RunAlreadyActive { .. }) => {
                tracing::info!(alias, "rebuild started concurrently, skipping");
                return Ok(RebuildOutcome::skipped(alias, started.elapsed()));
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(alias, generation = %generation_name, "rebuild started");

        let result = self
            .run_generation(config, &generation_name, &mut record, started)
            .await;
        if result.is_err() && record.is_running() {
            if let Err(mark_err) = self.ledger.mark_failed(&mut record).await {
                tracing::error!(alias, error = %mark_err, "failed to record rebuild failure");
            }
        }
        result
    }

    /// Everything that happens while the lease is held. The caller marks the
    /// record failed if this returns an error before finishing it.
    async fn run_generation(
        &self,
        config: &AliasConfig,
        generation_name: &str,
        record: &mut VersionRecord,
        started: Instant,
    ) -> Result<RebuildOutcome, RebuildError> {
        let alias = config.alias.as_str();
        self.generations
            .insert(&IndexGeneration::running(generation_name, alias))
            .await?;

        match self.build_and_swap(config, generation_name).await {
            Ok(items_written) => {
                self.generations
                    .set_status(generation_name, GenerationStatus::Successful)
                    .await?;
                if let Err(e) = self.cleanup_previous(alias, generation_name).await {
                    tracing::warn!(alias, error = %e, "old generation cleanup failed, will retry");
                }
                self.ledger.mark_success(record).await?;

                let elapsed = started.elapsed();
                tracing::info!(
                    alias,
                    generation = %generation_name,
                    items_written,
                    duration_ms = elapsed.as_millis() as u64,
                    "rebuild complete"
                );
                Ok(RebuildOutcome::success(
                    alias,
                    generation_name,
                    items_written,
                    elapsed,
                ))
            }
            Err(failure) => {
                self.discard(generation_name).await;
                self.generations
                    .set_status(generation_name, GenerationStatus::Failed)
                    .await?;
                self.ledger.mark_failed(record).await?;

                let elapsed = started.elapsed();
                tracing::error!(
                    alias,
                    generation = %generation_name,
                    reason = %failure.reason,
                    duration_ms = elapsed.as_millis() as u64,
                    "rebuild failed, previous generation still serving"
                );
                Ok(RebuildOutcome::failed(
                    alias,
                    Some(generation_name),
                    failure.items_written,
                    elapsed,
                    failure.reason,
                ))
            }
        }
    }

    /// Current resolution and bookkeeping of one alias.
    pub async fn alias_status(&self, alias: &str) -> Result<AliasStatus, RebuildError> {
        self.alias_config(alias)?;
        let resolves_to = self.admin.resolve_alias(alias).await?;
        let current_generation = self
            .generations
            .latest_successful(alias)
            .await?
            .map(|g| g.name);
        let rebuild_in_progress = self.ledger.has_running(alias, alias).await?;

        Ok(AliasStatus {
            alias: alias.to_string(),
            resolves_to,
            current_generation,
            rebuild_in_progress,
        })
    }

    fn alias_config(&self, alias: &str) -> Result<&AliasConfig, RebuildError> {
        self.aliases
            .iter()
            .find(|a| a.alias == alias)
            .ok_or_else(|| RebuildError::UnknownAlias(alias.to_string()))
    }

    /// Create the generation, fill it from every entity type, then swap the
    /// alias onto it. Returns the number of documents written.
    async fn build_and_swap(
        &self,
        config: &AliasConfig,
        generation: &str,
    ) -> Result<usize, BuildFailure> {
        let created = self
            .admin
            .create_index(generation, &self.mapping)
            .await
            .map_err(|e| BuildFailure::new(format!("create index: {e}"), 0))?;
        if !created {
            return Err(BuildFailure::new("index creation not acknowledged", 0));
        }

        let mut written = 0;
        for entity_type in &config.entity_types {
            let entities = self
                .source
                .fetch_all(&entity_type.name)
                .await
                .map_err(|e| BuildFailure::new(e.to_string(), written))?;

            if entities.is_empty() {
                if entity_type.allow_empty {
                    tracing::debug!(
                        alias = %config.alias,
                        entity_type = %entity_type.name,
                        "no content to index, allowed empty"
                    );
                    continue;
                }
                return Err(BuildFailure::new(
                    format!("no content to index for {}", entity_type.name),
                    written,
                ));
            }

            let result = self
                .admin
                .bulk_write(generation, &entity_type.name, &entities)
                .await
                .map_err(|e| BuildFailure::new(format!("bulk write: {e}"), written))?;
            written += result.written;

            if !result.is_success() {
                return Err(BuildFailure::new(
                    format!(
                        "{} of {} {} documents rejected",
                        result.failed,
                        entities.len(),
                        entity_type.name
                    ),
                    written,
                ));
            }
        }

        match self.admin.swap_alias(&config.alias, generation).await {
            Ok(true) => Ok(written),
            Ok(false) => Err(BuildFailure::new("alias swap not acknowledged", written)),
            Err(e) => {
                // The swap may have been applied even though the response was
                // lost; deleting an aliased index would leave readers with
                // nothing, so check before treating it as a failure.
                match self.admin.resolve_alias(&config.alias).await {
                    Ok(indices) if indices.len() == 1 && indices[0] == generation => {
                        tracing::warn!(
                            alias = %config.alias,
                            generation,
                            error = %e,
                            "alias swap response lost but alias resolves to new generation"
                        );
                        Ok(written)
                    }
                    _ => Err(BuildFailure::new(format!("alias swap: {e}"), written)),
                }
            }
        }
    }

    /// Delete the physical indices of every superseded generation.
    ///
    /// Runs under the lease, so any other running generation of the alias
    /// belongs to a rebuild that died or was reclaimed. A deletion that fails
    /// leaves the record as it was so the next successful rebuild retries it.
    async fn cleanup_previous(&self, alias: &str, current: &str) -> Result<usize, LedgerError> {
        let mut stale = Vec::new();
        for status in [
            GenerationStatus::Successful,
            GenerationStatus::Failed,
            GenerationStatus::Running,
        ] {
            stale.extend(self.generations.list_by_status(alias, status).await?);
        }

        let mut deleted = 0;
        for generation in stale.iter().filter(|g| g.name != current) {
            match self.admin.delete_index(&generation.name).await {
                Ok(true) => {
                    self.generations
                        .set_status(&generation.name, GenerationStatus::Deleted)
                        .await?;
                    deleted += 1;
                }
                Ok(false) => {
                    tracing::warn!(
                        alias,
                        generation = %generation.name,
                        "old generation deletion not acknowledged, will retry"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        alias,
                        generation = %generation.name,
                        error = %e,
                        "failed to delete old generation, will retry"
                    );
                }
            }
        }

        if deleted > 0 {
            tracing::info!(alias, deleted, "old generations cleaned up");
        }
        Ok(deleted)
    }

    /// Remove a half-built generation. Failures are logged only; the next
    /// successful rebuild sweeps failed generations again.
    async fn discard(&self, generation: &str) {
        match self.admin.delete_index(generation).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(generation, "half-built generation deletion not acknowledged");
            }
            Err(e) => {
                tracing::warn!(generation, error = %e, "failed to delete half-built generation");
            }
        }
    }
}
