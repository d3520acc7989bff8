//! Elasticsearch REST client
//!
//! Implements the administrative subset of the engine API the rebuild
//! protocol needs: index existence, creation, `_bulk`, `_alias`/`_aliases`
//! and deletion.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use super::traits::{
    AdminToolsError, AliasAction, BulkItemFailure, BulkResponse, Result, SearchEngine,
};
use crate::config::SearchConfig;

/// Error type the engine reports when an index is created twice.
const ALREADY_EXISTS: &str = "resource_already_exists_exception";

#[derive(Debug, Deserialize)]
struct Acknowledged {
    #[serde(default)]
    acknowledged: bool,
}

#[derive(Debug, Deserialize)]
struct BulkBody {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    #[serde(rename = "_id")]
    id: Option<String>,
    status: u16,
    error: Option<Value>,
}

pub struct ElasticsearchClient {
    client: Client,
    base_url: Url,
}

impl ElasticsearchClient {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AdminToolsError::Config(format!("failed to create HTTP client: {e}")))?;

        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| AdminToolsError::Config(format!("invalid base url {base}: {e}")))?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| AdminToolsError::Config(format!("invalid path {path}: {e}")))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response> {
        request
            .send()
            .await
            .map_err(|e| AdminToolsError::Transport(e.to_string()))
    }

    async fn acknowledged(response: Response, operation: &'static str) -> Result<bool> {
        let response = Self::expect_success(response, operation).await?;
        let body: Acknowledged = response.json().await.map_err(|e| AdminToolsError::Decode {
            operation,
            reason: e.to_string(),
        })?;
        Ok(body.acknowledged)
    }

    async fn expect_success(response: Response, operation: &'static str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AdminToolsError::UnexpectedStatus {
            operation,
            status: status.as_u16(),
            body,
        })
    }
}

/// Newline-delimited `_bulk` body indexing every document into `index`.
pub(crate) fn bulk_payload(index: &str, documents: &[(String, Value)]) -> Result<String> {
    let mut payload = String::new();
    for (id, document) in documents {
        let action = json!({ "index": { "_index": index, "_id": id } });
        for line in [&action, document] {
            let encoded = serde_json::to_string(line).map_err(|e| AdminToolsError::Decode {
                operation: "bulk",
                reason: format!("document {id}: {e}"),
            })?;
            payload.push_str(&encoded);
            payload.push('\n');
        }
    }
    Ok(payload)
}

/// Collect rejected items from a `_bulk` response body.
pub(crate) fn bulk_failures(body: &Value) -> Result<Vec<BulkItemFailure>> {
    let parsed: BulkBody =
        serde_json::from_value(body.clone()).map_err(|e| AdminToolsError::Decode {
            operation: "bulk",
            reason: e.to_string(),
        })?;
    if !parsed.errors {
        return Ok(Vec::new());
    }

    Ok(parsed
        .items
        .into_iter()
        .flat_map(|item| item.into_values())
        .filter(|item| item.error.is_some() || item.status >= 300)
        .map(|item| BulkItemFailure {
            id: item.id.unwrap_or_default(),
            reason: item
                .error
                .map(|e| {
                    e.get("reason")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| e.to_string())
                })
                .unwrap_or_else(|| format!("status {}", item.status)),
        })
        .collect())
}

#[async_trait]
impl SearchEngine for ElasticsearchClient {
    async fn index_exists(&self, name: &str) -> Result<bool> {
        let response = self.send(self.client.head(self.url(name)?)).await?;
        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(AdminToolsError::UnexpectedStatus {
                operation: "index_exists",
                status: status.as_u16(),
                body: String::new(),
            }),
        }
    }

    async fn create_index(&self, name: &str, body: &Value) -> Result<bool> {
        let response = self.send(self.client.put(self.url(name)?).json(body)).await?;
        if response.status() == StatusCode::BAD_REQUEST {
            let text = response.text().await.unwrap_or_default();
            if text.contains(ALREADY_EXISTS) {
                tracing::debug!(index = name, "index created concurrently, treating as existing");
                return Ok(true);
            }
            return Err(AdminToolsError::UnexpectedStatus {
                operation: "create_index",
                status: StatusCode::BAD_REQUEST.as_u16(),
                body: text,
            });
        }
        Self::acknowledged(response, "create_index").await
    }

    async fn bulk_index(&self, index: &str, documents: &[(String, Value)]) -> Result<BulkResponse> {
        let payload = bulk_payload(index, documents)?;
        let response = self
            .send(
                self.client
                    .post(self.url("_bulk")?)
                    .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
                    .body(payload),
            )
            .await?;
        let response = Self::expect_success(response, "bulk").await?;
        let body: Value = response.json().await.map_err(|e| AdminToolsError::Decode {
            operation: "bulk",
            reason: e.to_string(),
        })?;

        Ok(BulkResponse {
            submitted: documents.len(),
            failures: bulk_failures(&body)?,
        })
    }

    async fn indices_for_alias(&self, alias: &str) -> Result<Vec<String>> {
        let response = self
            .send(self.client.get(self.url(&format!("_alias/{alias}"))?))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let response = Self::expect_success(response, "get_alias").await?;
        let body: HashMap<String, Value> =
            response.json().await.map_err(|e| AdminToolsError::Decode {
                operation: "get_alias",
                reason: e.to_string(),
            })?;

        let mut indices: Vec<String> = body.into_keys().collect();
        indices.sort();
        Ok(indices)
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<bool> {
        let body = json!({ "actions": actions });
        let response = self
            .send(self.client.post(self.url("_aliases")?).json(&body))
            .await?;
        Self::acknowledged(response, "update_aliases").await
    }

    async fn delete_index(&self, name: &str) -> Result<Option<bool>> {
        let response = self.send(self.client.delete(self.url(name)?)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::acknowledged(response, "delete_index").await.map(Some)
    }
}
