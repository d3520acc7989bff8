//! Startup sequencing: version-gated loads, then one full reindex.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use crate::builder::{IndexBuilder, RebuildOutcome};
use crate::ledger::{LedgerError, VersionLedger, VersionRecord};

pub const INITIALIZATION_DATA_TYPE: &str = "initialization";
pub const INITIALIZATION_IDENTIFIER: &str = "startup";

/// A versioned batch of source data applied at most once per version.
#[async_trait]
pub trait DataLoader: Send + Sync {
    fn data_type(&self) -> &str;

    fn identifier(&self) -> &str;

    fn source(&self) -> &str {
        "internal"
    }

    /// Version of the data this loader would apply right now.
    async fn version(&self) -> anyhow::Result<String>;

    async fn load(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum LoadStatus {
    /// Loaded and recorded as the current version.
    Applied,
    /// The current version is already applied.
    UpToDate,
    /// Another process is loading the same pair.
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadOutcome {
    pub data_type: String,
    pub identifier: String,
    pub version: Option<String>,
    #[serde(flatten)]
    pub status: LoadStatus,
    pub duration_ms: u64,
}

impl LoadOutcome {
    fn new(loader: &dyn DataLoader, version: Option<String>, status: LoadStatus, started: Instant) -> Self {
        Self {
            data_type: loader.data_type().to_string(),
            identifier: loader.identifier().to_string(),
            version,
            status,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, LoadStatus::Failed(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InitializationReport {
    /// Another process already holds the initialization record.
    pub skipped: bool,
    pub loads: Vec<LoadOutcome>,
    pub rebuilds: Vec<RebuildOutcome>,
}

impl InitializationReport {
    pub fn is_success(&self) -> bool {
        !self.skipped
            && !self.loads.iter().any(LoadOutcome::is_failed)
            && self.rebuilds.iter().all(|r| r.error.is_none())
    }
}

/// Runs the registered loaders in order, then rebuilds every alias once.
///
/// Progress is an `("initialization", "startup")` record in the ledger, so
/// any process sharing the database can ask whether startup is still running.
pub struct DataLoadOrchestrator {
    ledger: VersionLedger,
    builder: Arc<IndexBuilder>,
    loaders: Vec<Arc<dyn DataLoader>>,
}

impl DataLoadOrchestrator {
    pub fn new(ledger: VersionLedger, builder: Arc<IndexBuilder>) -> Self {
        Self {
            ledger,
            builder,
            loaders: Vec::new(),
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn DataLoader>) -> Self {
        self.loaders.push(loader);
        self
    }

    pub async fn is_initializing(&self) -> Result<bool, LedgerError> {
        self.ledger
            .has_running(INITIALIZATION_DATA_TYPE, INITIALIZATION_IDENTIFIER)
            .await
    }

    /// Apply every loader whose version changed, then reindex everything.
    ///
    /// The initialization record is marked failed if any loader failed.
    /// Rebuild failures are reported but leave it successful; the scheduler
    /// retries them.
    pub async fn initialize(&self) -> Result<InitializationReport, LedgerError> {
        let started_at = Utc::now().to_rfc3339();
        let mut record = match self
            .ledger
            .begin_run(
                INITIALIZATION_DATA_TYPE,
                INITIALIZATION_IDENTIFIER,
                "internal",
                &started_at,
            )
            .await
        {
            Ok(record) => record,
            Err(LedgerError::RunAlreadyActive { .. }) => {
                tracing::info!("initialization already running elsewhere, skipping");
                return Ok(InitializationReport {
                    skipped: true,
                    loads: Vec::new(),
                    rebuilds: Vec::new(),
                });
            }
            Err(e) => return Err(e),
        };

        tracing::info!(loaders = self.loaders.len(), "initialization started");

        match self.load_and_rebuild().await {
            Ok((loads, rebuilds)) => {
                let failed_loads = loads.iter().filter(|l| l.is_failed()).count();
                if failed_loads > 0 {
                    self.ledger.mark_failed(&mut record).await?;
                    tracing::error!(failed_loads, "initialization finished with failed loads");
                } else {
                    self.ledger.mark_success(&mut record).await?;
                    tracing::info!(
                        loads = loads.len(),
                        rebuilds = rebuilds.len(),
                        "initialization complete"
                    );
                }
                Ok(InitializationReport {
                    skipped: false,
                    loads,
                    rebuilds,
                })
            }
            Err(e) => {
                self.abandon(&mut record).await;
                Err(e)
            }
        }
    }

    async fn load_and_rebuild(
        &self,
    ) -> Result<(Vec<LoadOutcome>, Vec<RebuildOutcome>), LedgerError> {
        let mut loads = Vec::with_capacity(self.loaders.len());
        for loader in &self.loaders {
            loads.push(run_gated(&self.ledger, loader.as_ref()).await?);
        }
        let rebuilds = self.builder.reindex_everything().await;
        Ok((loads, rebuilds))
    }

    async fn abandon(&self, record: &mut VersionRecord) {
        if let Err(e) = self.ledger.mark_failed(record).await {
            tracing::error!(error = %e, "failed to record initialization failure");
        }
    }
}

/// Apply `loader` if the ledger says its current version is new.
///
/// Loader errors become a failed outcome; ledger errors are returned.
pub async fn run_gated(
    ledger: &VersionLedger,
    loader: &dyn DataLoader,
) -> Result<LoadOutcome, LedgerError> {
    let started = Instant::now();
    let data_type = loader.data_type();
    let identifier = loader.identifier();

    let version = match loader.version().await {
        Ok(version) => version,
        Err(e) => {
            tracing::error!(data_type, identifier, error = %e, "failed to determine load version");
            return Ok(LoadOutcome::new(
                loader,
                None,
                LoadStatus::Failed(format!("version: {e:#}")),
                started,
            ));
        }
    };

    if !ledger.should_apply(data_type, identifier, &version).await? {
        return Ok(LoadOutcome::new(loader, Some(version), LoadStatus::UpToDate, started));
    }

    let mut record = match ledger
        .begin_run(data_type, identifier, loader.source(), &version)
        .await
    {
        Ok(record) => record,
        Err(LedgerError::RunAlreadyActive { .. }) => {
            tracing::info!(data_type, identifier, "load already running, skipping");
            return Ok(LoadOutcome::new(loader, Some(version), LoadStatus::Skipped, started));
        }
        Err(e) => return Err(e),
    };

    match loader.load().await {
        Ok(()) => {
            ledger.mark_success(&mut record).await?;
            tracing::info!(data_type, identifier, version = %version, "load applied");
            Ok(LoadOutcome::new(loader, Some(version), LoadStatus::Applied, started))
        }
        Err(e) => {
            ledger.mark_failed(&mut record).await?;
            tracing::error!(data_type, identifier, version = %version, error = %e, "load failed");
            Ok(LoadOutcome::new(
                loader,
                Some(version),
                LoadStatus::Failed(format!("{e:#}")),
                started,
            ))
        }
    }
}
