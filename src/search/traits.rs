//! Core traits and types for the search engine abstraction
//!
//! `SearchEngine` is the thin port over the engine's administrative API. The
//! Elasticsearch REST client and the in-memory engine used by tests both
//! implement it; `IndexAdminTools` builds the rebuild primitives on top.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Document field carrying the entity type of every indexed document.
pub const ENTITY_TYPE_FIELD: &str = "entityType";

/// A unit of indexed content read from the relational store.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchableEntity {
    pub id: String,
    /// Source collection tag, e.g. "coderegistry", "codescheme", "code".
    pub entity_type: String,
    /// Serialized document.
    pub payload: Value,
}

impl SearchableEntity {
    pub fn new(id: impl Into<String>, entity_type: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            payload,
        }
    }

    /// The document as written to the engine.
    ///
    /// Object payloads are stamped with [`ENTITY_TYPE_FIELD`] unless they
    /// already carry it; other payloads are written unchanged.
    pub fn document(&self) -> Value {
        let mut document = self.payload.clone();
        if let Value::Object(fields) = &mut document {
            fields
                .entry(ENTITY_TYPE_FIELD)
                .or_insert_with(|| Value::String(self.entity_type.clone()));
        }
        document
    }
}

/// One action of an atomic alias update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AliasAction {
    Add {
        index: String,
        alias: String,
    },
    Remove {
        index: String,
        alias: String,
        /// `Some(false)` tolerates an alias nothing holds yet.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        must_exist: Option<bool>,
    },
}

/// Index pattern matching every index.
pub const ALL_INDICES: &str = "*";

impl AliasAction {
    pub fn add(index: &str, alias: &str) -> Self {
        Self::Add {
            index: index.to_string(),
            alias: alias.to_string(),
        }
    }

    pub fn remove(index: &str, alias: &str) -> Self {
        Self::Remove {
            index: index.to_string(),
            alias: alias.to_string(),
            must_exist: None,
        }
    }

    /// Detach `alias` from whichever indices hold it, possibly none.
    pub fn remove_everywhere(alias: &str) -> Self {
        Self::Remove {
            index: ALL_INDICES.to_string(),
            alias: alias.to_string(),
            must_exist: Some(false),
        }
    }
}

/// A document the engine rejected within a bulk request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemFailure {
    pub id: String,
    pub reason: String,
}

/// Engine response to one bulk request.
#[derive(Debug, Clone, Default)]
pub struct BulkResponse {
    pub submitted: usize,
    pub failures: Vec<BulkItemFailure>,
}

/// Errors talking to the search engine.
#[derive(Debug, thiserror::Error)]
pub enum AdminToolsError {
    #[error("search engine unreachable: {0}")]
    Transport(String),

    #[error("search engine returned {status} for {operation}: {body}")]
    UnexpectedStatus {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("malformed search engine response to {operation}: {reason}")]
    Decode {
        operation: &'static str,
        reason: String,
    },

    #[error("invalid search engine configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AdminToolsError>;

/// Administrative operations against the search engine.
///
/// Implementations must be Send + Sync; one client is shared by every
/// concurrent alias rebuild.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    async fn index_exists(&self, name: &str) -> Result<bool>;

    /// Create an index from a full settings-and-mappings body.
    /// Returns the engine acknowledgement.
    async fn create_index(&self, name: &str, body: &Value) -> Result<bool>;

    /// Write `(id, document)` pairs into `index` in one request.
    async fn bulk_index(&self, index: &str, documents: &[(String, Value)]) -> Result<BulkResponse>;

    /// Indices the alias currently resolves to (empty if the alias is unknown).
    async fn indices_for_alias(&self, alias: &str) -> Result<Vec<String>>;

    /// Apply all actions in one atomic request. Returns the acknowledgement.
    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<bool>;

    /// Delete an index. `None` when the index does not exist, otherwise the
    /// engine acknowledgement.
    async fn delete_index(&self, name: &str) -> Result<Option<bool>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_stamps_entity_type() {
        let entity = SearchableEntity::new("r1", "coderegistry", json!({"codeValue": "jhs"}));
        let document = entity.document();
        assert_eq!(document["entityType"], "coderegistry");
        assert_eq!(document["codeValue"], "jhs");
        assert!(entity.payload.get("entityType").is_none());
    }

    #[test]
    fn test_document_keeps_existing_entity_type() {
        let entity = SearchableEntity::new("c1", "code", json!({"entityType": "member"}));
        assert_eq!(entity.document()["entityType"], "member");
    }

    #[test]
    fn test_non_object_payload_unchanged() {
        let entity = SearchableEntity::new("x", "code", json!("plain"));
        assert_eq!(entity.document(), json!("plain"));
    }

    #[test]
    fn test_alias_action_serde() {
        let actions = vec![
            AliasAction::remove("coderegistry_1", "coderegistry"),
            AliasAction::add("coderegistry_2", "coderegistry"),
        ];
        let body = serde_json::to_value(&actions).unwrap();
        assert_eq!(
            body,
            json!([
                {"remove": {"index": "coderegistry_1", "alias": "coderegistry"}},
                {"add": {"index": "coderegistry_2", "alias": "coderegistry"}}
            ])
        );

        let body = serde_json::to_value(AliasAction::remove_everywhere("coderegistry")).unwrap();
        assert_eq!(
            body,
            json!({"remove": {"index": "*", "alias": "coderegistry", "must_exist": false}})
        );
    }
}
