//! In-memory search engine.
//!
//! Keeps indices, documents and aliases in process memory with the same
//! alias semantics as the real engine: alias updates apply all actions under
//! one lock, and deleting an index drops it from every alias. Faults can be
//! injected to exercise the failure paths of the rebuild protocol.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::traits::{
    AdminToolsError, AliasAction, BulkItemFailure, BulkResponse, Result, SearchEngine,
    ALL_INDICES,
};

#[derive(Default)]
struct StoredIndex {
    body: Value,
    documents: BTreeMap<String, Value>,
}

#[derive(Default)]
struct EngineState {
    indices: BTreeMap<String, StoredIndex>,
    aliases: BTreeMap<String, BTreeSet<String>>,
    bulk_requests: usize,
    alias_updates: Vec<Vec<AliasAction>>,
}

#[derive(Default)]
struct Faults {
    rejected_ids: HashSet<String>,
    refuse_alias_updates: bool,
    lose_alias_update_responses: bool,
    refuse_index_creation: bool,
    unreachable: bool,
}

#[derive(Default)]
pub struct InMemorySearchEngine {
    state: RwLock<EngineState>,
    faults: RwLock<Faults>,
}

impl InMemorySearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject documents with these ids in every later bulk request.
    pub async fn reject_documents<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut faults = self.faults.write().await;
        faults.rejected_ids.extend(ids.into_iter().map(Into::into));
    }

    /// Answer alias updates with an unacknowledged response.
    pub async fn refuse_alias_updates(&self, refuse: bool) {
        self.faults.write().await.refuse_alias_updates = refuse;
    }

    /// Apply alias updates, then fail them with a transport error as if the
    /// response never arrived.
    pub async fn lose_alias_update_responses(&self, lose: bool) {
        self.faults.write().await.lose_alias_update_responses = lose;
    }

    /// Answer index creation with an unacknowledged response.
    pub async fn refuse_index_creation(&self, refuse: bool) {
        self.faults.write().await.refuse_index_creation = refuse;
    }

    /// Fail every operation with a transport error.
    pub async fn set_unreachable(&self, unreachable: bool) {
        self.faults.write().await.unreachable = unreachable;
    }

    pub async fn clear_faults(&self) {
        *self.faults.write().await = Faults::default();
    }

    /// Names of all physical indices, sorted.
    pub async fn index_names(&self) -> Vec<String> {
        self.state.read().await.indices.keys().cloned().collect()
    }

    /// The create-index body an index was created with.
    pub async fn index_settings(&self, name: &str) -> Option<Value> {
        self.state
            .read()
            .await
            .indices
            .get(name)
            .map(|index| index.body.clone())
    }

    /// Documents stored in an index, ordered by id.
    pub async fn documents(&self, name: &str) -> Vec<Value> {
        self.state
            .read()
            .await
            .indices
            .get(name)
            .map(|index| index.documents.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of bulk requests received so far.
    pub async fn bulk_requests(&self) -> usize {
        self.state.read().await.bulk_requests
    }

    /// Every alias update applied so far, in order.
    pub async fn alias_updates(&self) -> Vec<Vec<AliasAction>> {
        self.state.read().await.alias_updates.clone()
    }

    async fn check_reachable(&self) -> Result<()> {
        if self.faults.read().await.unreachable {
            return Err(AdminToolsError::Transport(
                "connection refused (simulated)".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SearchEngine for InMemorySearchEngine {
    async fn index_exists(&self, name: &str) -> Result<bool> {
        self.check_reachable().await?;
        Ok(self.state.read().await.indices.contains_key(name))
    }

    async fn create_index(&self, name: &str, body: &Value) -> Result<bool> {
        self.check_reachable().await?;
        if self.faults.read().await.refuse_index_creation {
            return Ok(false);
        }
        let mut state = self.state.write().await;
        if state.indices.contains_key(name) {
            return Err(AdminToolsError::UnexpectedStatus {
                operation: "create_index",
                status: 400,
                body: format!("resource_already_exists_exception: {name}"),
            });
        }
        state.indices.insert(
            name.to_string(),
            StoredIndex {
                body: body.clone(),
                documents: BTreeMap::new(),
            },
        );
        Ok(true)
    }

    async fn bulk_index(&self, index: &str, documents: &[(String, Value)]) -> Result<BulkResponse> {
        self.check_reachable().await?;
        let rejected = self.faults.read().await.rejected_ids.clone();
        let mut state = self.state.write().await;
        state.bulk_requests += 1;

        let mut failures = Vec::new();
        match state.indices.get_mut(index) {
            Some(stored) => {
                for (id, document) in documents {
                    if rejected.contains(id) {
                        failures.push(BulkItemFailure {
                            id: id.clone(),
                            reason: "mapper_parsing_exception (simulated)".to_string(),
                        });
                    } else {
                        stored.documents.insert(id.clone(), document.clone());
                    }
                }
            }
            None => {
                failures.extend(documents.iter().map(|(id, _)| BulkItemFailure {
                    id: id.clone(),
                    reason: format!("index_not_found_exception: {index}"),
                }));
            }
        }

        Ok(BulkResponse {
            submitted: documents.len(),
            failures,
        })
    }

    async fn indices_for_alias(&self, alias: &str) -> Result<Vec<String>> {
        self.check_reachable().await?;
        Ok(self
            .state
            .read()
            .await
            .aliases
            .get(alias)
            .map(|indices| indices.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<bool> {
        self.check_reachable().await?;
        if self.faults.read().await.refuse_alias_updates {
            return Ok(false);
        }

        let mut state = self.state.write().await;
        for action in actions {
            let (AliasAction::Add { index, .. } | AliasAction::Remove { index, .. }) = action;
            if index != ALL_INDICES && !state.indices.contains_key(index) {
                return Err(AdminToolsError::UnexpectedStatus {
                    operation: "update_aliases",
                    status: 404,
                    body: format!("index_not_found_exception: {index}"),
                });
            }
        }

        for action in actions {
            match action {
                AliasAction::Add { index, alias } => {
                    state
                        .aliases
                        .entry(alias.clone())
                        .or_default()
                        .insert(index.clone());
                }
                AliasAction::Remove { index, alias, .. } if index == ALL_INDICES => {
                    state.aliases.remove(alias);
                }
                AliasAction::Remove { index, alias, .. } => {
                    if let Some(indices) = state.aliases.get_mut(alias) {
                        indices.remove(index);
                    }
                }
            }
        }
        state.aliases.retain(|_, indices| !indices.is_empty());
        state.alias_updates.push(actions.to_vec());
        drop(state);

        if self.faults.read().await.lose_alias_update_responses {
            return Err(AdminToolsError::Transport(
                "connection reset after alias update (simulated)".to_string(),
            ));
        }
        Ok(true)
    }

    async fn delete_index(&self, name: &str) -> Result<Option<bool>> {
        self.check_reachable().await?;
        let mut state = self.state.write().await;
        if state.indices.remove(name).is_none() {
            return Ok(None);
        }
        for indices in state.aliases.values_mut() {
            indices.remove(name);
        }
        state.aliases.retain(|_, indices| !indices.is_empty());
        Ok(Some(true))
    }
}
