//! Index administration primitives used by the rebuild protocol.

use std::sync::Arc;

use serde_json::Value;

use super::mapping::index_body;
use super::traits::{AliasAction, Result, SearchEngine, SearchableEntity};

/// Aggregate outcome of one bulk write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkResult {
    pub written: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl BulkResult {
    /// A batch is acceptable only when no document was rejected.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Create, fill, cut over and delete physical indices.
///
/// Operations that the engine acknowledges return that acknowledgement as a
/// `bool` in addition to failing on transport errors; callers check both.
#[derive(Clone)]
pub struct IndexAdminTools {
    engine: Arc<dyn SearchEngine>,
    max_result_window: u32,
}

impl IndexAdminTools {
    pub fn new(engine: Arc<dyn SearchEngine>, max_result_window: u32) -> Self {
        Self {
            engine,
            max_result_window,
        }
    }

    /// Create `name` with `mapping`. An existing index is left as is.
    pub async fn create_index(&self, name: &str, mapping: &Value) -> Result<bool> {
        if self.engine.index_exists(name).await? {
            tracing::debug!(index = name, "index already exists, not creating");
            return Ok(true);
        }

        let body = index_body(mapping, self.max_result_window);
        let acknowledged = self.engine.create_index(name, &body).await?;
        if acknowledged {
            tracing::info!(index = name, "index created");
        } else {
            tracing::warn!(index = name, "index creation not acknowledged");
        }
        Ok(acknowledged)
    }

    /// Submit `entities` to `index` in one batch.
    ///
    /// Rejected documents are collected into the result rather than failing
    /// the call.
    pub async fn bulk_write(
        &self,
        index: &str,
        entity_type: &str,
        entities: &[SearchableEntity],
    ) -> Result<BulkResult> {
        if entities.is_empty() {
            return Ok(BulkResult::default());
        }

        let documents: Vec<(String, Value)> = entities
            .iter()
            .map(|entity| (entity.id.clone(), entity.document()))
            .collect();

        let response = self.engine.bulk_index(index, &documents).await?;
        let failed = response.failures.len();
        let result = BulkResult {
            written: response.submitted.saturating_sub(failed),
            failed,
            errors: response
                .failures
                .iter()
                .map(|f| format!("{}: {}", f.id, f.reason))
                .collect(),
        };

        if result.is_success() {
            tracing::info!(
                index,
                entity_type,
                written = result.written,
                "bulk write complete"
            );
        } else {
            tracing::warn!(
                index,
                entity_type,
                written = result.written,
                failed = result.failed,
                first_error = result.errors.first().map(String::as_str),
                "bulk write had failures"
            );
        }

        Ok(result)
    }

    /// Move `alias` onto `new_index` in a single request.
    ///
    /// The alias is detached from every index holding it and attached to
    /// `new_index` in one atomic update, so readers never see it resolve to
    /// nothing.
    pub async fn swap_alias(&self, alias: &str, new_index: &str) -> Result<bool> {
        let actions = [
            AliasAction::remove_everywhere(alias),
            AliasAction::add(new_index, alias),
        ];

        let acknowledged = self.engine.update_aliases(&actions).await?;
        if acknowledged {
            tracing::info!(alias, new_index, "alias swapped");
        } else {
            tracing::warn!(alias, new_index, "alias swap not acknowledged");
        }
        Ok(acknowledged)
    }

    /// Delete `name` if it exists. A missing index is not an error.
    pub async fn delete_index(&self, name: &str) -> Result<bool> {
        match self.engine.delete_index(name).await? {
            Some(acknowledged) => {
                if acknowledged {
                    tracing::info!(index = name, "index deleted");
                } else {
                    tracing::warn!(index = name, "index deletion not acknowledged");
                }
                Ok(acknowledged)
            }
            None => {
                tracing::info!(index = name, "index not found, nothing to delete");
                Ok(true)
            }
        }
    }

    /// Indices `alias` currently resolves to.
    pub async fn resolve_alias(&self, alias: &str) -> Result<Vec<String>> {
        self.engine.indices_for_alias(alias).await
    }
}
