//! Postgres implementation of the generation store.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::ports::GenerationStore;
use super::types::{GenerationStatus, IndexGeneration};
use crate::ledger::ports::{LedgerError, Result};

#[derive(Debug, sqlx::FromRow)]
struct PgGenerationRow {
    name: String,
    alias: String,
    status: String,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
}

impl TryFrom<PgGenerationRow> for IndexGeneration {
    type Error = String;

    fn try_from(row: PgGenerationRow) -> std::result::Result<Self, Self::Error> {
        let status = GenerationStatus::parse(&row.status)
            .ok_or_else(|| format!("unknown index generation status: {}", row.status))?;
        Ok(Self {
            name: row.name,
            alias: row.alias,
            status,
            created: row.created,
            modified: row.modified,
        })
    }
}

fn into_generation(row: PgGenerationRow) -> Result<IndexGeneration> {
    row.try_into()
        .map_err(|e: String| LedgerError::Persistence(anyhow!(e)))
}

/// Postgres-backed generation store over `index_generation`.
pub struct PgGenerationStore {
    pool: PgPool,
}

impl PgGenerationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GenerationStore for PgGenerationStore {
    async fn insert(&self, generation: &IndexGeneration) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO index_generation (name, alias, status, created, modified)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&generation.name)
        .bind(&generation.alias)
        .bind(generation.status.as_str())
        .bind(generation.created)
        .bind(generation.modified)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        Ok(())
    }

    async fn set_status(&self, name: &str, status: GenerationStatus) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE index_generation
            SET status = $2, modified = now()
            WHERE name = $1
            "#,
        )
        .bind(name)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::UnknownGeneration(name.to_string()));
        }
        Ok(())
    }

    async fn list_by_status(
        &self,
        alias: &str,
        status: GenerationStatus,
    ) -> Result<Vec<IndexGeneration>> {
        let rows = sqlx::query_as::<_, PgGenerationRow>(
            r#"
            SELECT name, alias, status, created, modified
            FROM index_generation
            WHERE alias = $1 AND status = $2
            ORDER BY created ASC
            "#,
        )
        .bind(alias)
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        rows.into_iter().map(into_generation).collect()
    }

    async fn latest_successful(&self, alias: &str) -> Result<Option<IndexGeneration>> {
        let row = sqlx::query_as::<_, PgGenerationRow>(
            r#"
            SELECT name, alias, status, created, modified
            FROM index_generation
            WHERE alias = $1 AND status = 'successful'
            ORDER BY modified DESC
            LIMIT 1
            "#,
        )
        .bind(alias)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        row.map(into_generation).transpose()
    }

    async fn newest_name(&self, alias: &str) -> Result<Option<String>> {
        // Suffixes are decimal millis, so longer names sort higher.
        let name: Option<String> = sqlx::query_scalar(
            r#"
            SELECT name
            FROM index_generation
            WHERE alias = $1
            ORDER BY length(name) DESC, name DESC
            LIMIT 1
            "#,
        )
        .bind(alias)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        Ok(name)
    }
}
