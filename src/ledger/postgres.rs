//! Postgres implementation of the version store.
//!
//! All SQL is runtime-checked (sqlx::query, not sqlx::query!) to avoid a
//! compile-time database requirement. The single-running-record constraint is
//! the partial unique index `version_record_single_running`.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::ports::{LedgerError, Result, VersionStore};
use super::types::{RunStatus, VersionRecord};

/// Row shape of `version_record`.
#[derive(Debug, sqlx::FromRow)]
struct PgVersionRow {
    id: Uuid,
    data_type: String,
    identifier: String,
    source: String,
    version: String,
    status: String,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
}

impl TryFrom<PgVersionRow> for VersionRecord {
    type Error = String;

    fn try_from(row: PgVersionRow) -> std::result::Result<Self, Self::Error> {
        let status = RunStatus::parse(&row.status)
            .ok_or_else(|| format!("unknown version record status: {}", row.status))?;
        Ok(Self {
            id: row.id,
            data_type: row.data_type,
            identifier: row.identifier,
            source: row.source,
            version: row.version,
            status,
            created: row.created,
            modified: row.modified,
        })
    }
}

/// Postgres-backed version store.
pub struct PgVersionStore {
    pool: PgPool,
}

impl PgVersionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VersionStore for PgVersionStore {
    async fn insert_running(&self, record: &VersionRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO version_record
                (id, data_type, identifier, source, version, status, created, modified)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id)
        .bind(&record.data_type)
        .bind(&record.identifier)
        .bind(&record.source)
        .bind(&record.version)
        .bind(record.status.as_str())
        .bind(record.created)
        .bind(record.modified)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(LedgerError::RunAlreadyActive {
                    data_type: record.data_type.clone(),
                    identifier: record.identifier.clone(),
                })
            }
            Err(e) => Err(LedgerError::Persistence(anyhow!(e))),
        }
    }

    async fn finish(&self, id: Uuid, status: RunStatus, modified: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE version_record
            SET status = $2, modified = $3
            WHERE id = $1 AND status = 'running'
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(modified)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotRunning(id));
        }
        Ok(())
    }

    async fn has_running(&self, data_type: &str, identifier: &str) -> Result<bool> {
        let row = sqlx::query_as::<_, (bool,)>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM version_record
                WHERE data_type = $1 AND identifier = $2 AND status = 'running'
            )
            "#,
        )
        .bind(data_type)
        .bind(identifier)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        Ok(row.0)
    }

    async fn latest_successful(
        &self,
        data_type: &str,
        identifier: &str,
    ) -> Result<Option<VersionRecord>> {
        let row = sqlx::query_as::<_, PgVersionRow>(
            r#"
            SELECT id, data_type, identifier, source, version, status, created, modified
            FROM version_record
            WHERE data_type = $1 AND identifier = $2 AND status = 'successful'
            ORDER BY modified DESC
            LIMIT 1
            "#,
        )
        .bind(data_type)
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        row.map(|r| {
            r.try_into()
                .map_err(|e: String| LedgerError::Persistence(anyhow!(e)))
        })
        .transpose()
    }

    async fn cancel_stale(
        &self,
        data_type: &str,
        identifier: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE version_record
            SET status = 'canceled', modified = now()
            WHERE data_type = $1 AND identifier = $2
              AND status = 'running'
              AND modified <= $3
            "#,
        )
        .bind(data_type)
        .bind(identifier)
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;

        Ok(result.rows_affected())
    }
}
