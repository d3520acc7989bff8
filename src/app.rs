//! Process wiring: connect the Postgres and search adapters to the core.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::builder::IndexBuilder;
use crate::config::IndexerConfig;
use crate::generation::PgGenerationStore;
use crate::ledger::{PgVersionStore, VersionLedger};
use crate::loader::{DataLoadOrchestrator, SqlSeedLoader};
use crate::scheduler::{HttpUpstreamCheck, RebuildScheduler};
use crate::search::{ElasticsearchClient, IndexAdminTools};
use crate::source::PgEntitySource;

/// Fully wired components of a running indexer.
pub struct Indexer {
    pub config: IndexerConfig,
    pub pool: PgPool,
    pub ledger: VersionLedger,
    pub builder: Arc<IndexBuilder>,
    pub orchestrator: DataLoadOrchestrator,
    pub scheduler: RebuildScheduler,
}

impl Indexer {
    /// Connect to Postgres, apply migrations and build every component.
    pub async fn connect(config: IndexerConfig) -> Result<Self> {
        let database_url = config.database.connection_string()?;
        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect(&database_url)
            .await
            .context("Failed to connect to database")?;

        tracing::info!("Connected to database");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to apply migrations")?;

        let ledger = VersionLedger::new(Arc::new(PgVersionStore::new(pool.clone())));
        let search = Arc::new(ElasticsearchClient::new(&config.search)?);
        let admin = IndexAdminTools::new(search, config.search.max_result_window);

        let builder = Arc::new(
            IndexBuilder::new(
                ledger.clone(),
                Arc::new(PgGenerationStore::new(pool.clone())),
                admin,
                Arc::new(PgEntitySource::new(pool.clone(), &config.aliases)),
                config.aliases.clone(),
            )
            .with_stale_lease(config.ledger.stale_lease()),
        );

        let orchestrator = config.seeds.iter().fold(
            DataLoadOrchestrator::new(ledger.clone(), builder.clone()),
            |orchestrator, seed| {
                orchestrator.with_loader(Arc::new(SqlSeedLoader::new(pool.clone(), seed)))
            },
        );

        let mut scheduler =
            RebuildScheduler::new(builder.clone(), config.scheduler.reindex_interval());
        if let Some(upstream) = &config.upstream {
            let check = HttpUpstreamCheck::new(
                upstream.url.clone(),
                Duration::from_secs(config.search.request_timeout_secs),
            )?;
            scheduler = scheduler
                .with_upstream_check(Arc::new(check), config.scheduler.upstream_check_interval());
        }

        tracing::info!(
            aliases = config.aliases.len(),
            seeds = config.seeds.len(),
            upstream = config.upstream.is_some(),
            "indexer wired"
        );

        Ok(Self {
            config,
            pool,
            ledger,
            builder,
            orchestrator,
            scheduler,
        })
    }
}
