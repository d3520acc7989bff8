use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use super::orchestrator::DataLoader;
use crate::config::SeedConfig;

/// Hex SHA-256 of `bytes`.
pub fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Applies a SQL file whose version is the digest of its contents.
///
/// The file is executed in one transaction, so a failing statement leaves
/// the database as it was.
pub struct SqlSeedLoader {
    pool: PgPool,
    data_type: String,
    identifier: String,
    path: PathBuf,
}

impl SqlSeedLoader {
    pub fn new(pool: PgPool, config: &SeedConfig) -> Self {
        Self {
            pool,
            data_type: config.data_type.clone(),
            identifier: config.identifier.clone(),
            path: config.path.clone(),
        }
    }

    async fn read(&self) -> anyhow::Result<Vec<u8>> {
        tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read seed file {}", self.path.display()))
    }
}

#[async_trait]
impl DataLoader for SqlSeedLoader {
    fn data_type(&self) -> &str {
        &self.data_type
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn version(&self) -> anyhow::Result<String> {
        Ok(digest(&self.read().await?))
    }

    async fn load(&self) -> anyhow::Result<()> {
        let bytes = self.read().await?;
        let sql = String::from_utf8(bytes)
            .with_context(|| format!("Seed file {} is not UTF-8", self.path.display()))?;

        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let conn: &mut sqlx::PgConnection = &mut tx;
        sqlx::Executor::execute(conn, sqlx::raw_sql(&sql))
            .await
            .with_context(|| format!("Failed to apply seed file {}", self.path.display()))?;
        tx.commit().await.context("Failed to commit seed")?;

        tracing::info!(
            data_type = %self.data_type,
            identifier = %self.identifier,
            path = %self.path.display(),
            "seed file applied"
        );
        Ok(())
    }
}
