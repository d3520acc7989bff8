//! Postgres entity source.
//!
//! Each configured entity type reads one table and serializes every row with
//! `to_jsonb`, so new entity types need configuration only.

use std::collections::HashMap;

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::PgPool;

use super::traits::{EntitySource, SourceError};
use crate::config::{AliasConfig, EntityTypeConfig};
use crate::search::SearchableEntity;

pub struct PgEntitySource {
    pool: PgPool,
    entity_types: HashMap<String, EntityTypeConfig>,
}

impl PgEntitySource {
    /// Build a source covering every entity type of the given aliases.
    pub fn new(pool: PgPool, aliases: &[AliasConfig]) -> Self {
        let entity_types = aliases
            .iter()
            .flat_map(|alias| alias.entity_types.iter())
            .map(|entity_type| (entity_type.name.clone(), entity_type.clone()))
            .collect();
        Self { pool, entity_types }
    }
}

/// The select statement for one entity type.
pub(crate) fn select_all_sql(config: &EntityTypeConfig) -> String {
    let mut sql = format!(
        "SELECT t.{id}::text AS id, to_jsonb(t) AS payload FROM {table} t",
        id = config.id_column,
        table = config.source_table,
    );
    if let Some(filter) = &config.filter {
        sql.push_str(" WHERE ");
        sql.push_str(filter);
    }
    sql.push_str(&format!(" ORDER BY t.{}", config.id_column));
    sql
}

#[async_trait]
impl EntitySource for PgEntitySource {
    async fn fetch_all(&self, entity_type: &str) -> Result<Vec<SearchableEntity>, SourceError> {
        let config = self
            .entity_types
            .get(entity_type)
            .ok_or_else(|| SourceError::UnknownEntityType(entity_type.to_string()))?;

        let sql = select_all_sql(config);
        let rows = sqlx::query_as::<_, (String, serde_json::Value)>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SourceError::Read {
                entity_type: entity_type.to_string(),
                source: anyhow!(e),
            })?;

        tracing::debug!(entity_type, rows = rows.len(), "entities fetched");

        Ok(rows
            .into_iter()
            .map(|(id, payload)| SearchableEntity::new(id, entity_type, payload))
            .collect())
    }
}
