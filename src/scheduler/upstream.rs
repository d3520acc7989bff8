//! Upstream data change checks.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

/// Refreshes data from an external source and reports whether anything
/// changed since the previous refresh.
#[async_trait]
pub trait UpstreamCheck: Send + Sync {
    async fn refresh(&self) -> Result<bool>;
}

/// Remembers the last digest seen and reports when it changes.
///
/// The first observation only establishes the baseline.
#[derive(Debug, Default)]
pub struct DigestTracker {
    last: Option<String>,
}

impl DigestTracker {
    pub fn observe(&mut self, digest: String) -> bool {
        let changed = matches!(&self.last, Some(last) if *last != digest);
        self.last = Some(digest);
        changed
    }
}

/// Polls an HTTP endpoint and reports a change when the response body's
/// SHA-256 differs from the previous poll.
pub struct HttpUpstreamCheck {
    client: Client,
    url: String,
    tracker: Mutex<DigestTracker>,
}

impl HttpUpstreamCheck {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
            tracker: Mutex::new(DigestTracker::default()),
        })
    }
}

#[async_trait]
impl UpstreamCheck for HttpUpstreamCheck {
    async fn refresh(&self) -> Result<bool> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("Failed to poll {}", self.url))?
            .error_for_status()
            .with_context(|| format!("Upstream {} returned an error", self.url))?
            .bytes()
            .await
            .context("Failed to read upstream response")?;

        let digest = hex::encode(Sha256::digest(&body));
        let changed = self.tracker.lock().await.observe(digest);

        tracing::debug!(url = %self.url, bytes = body.len(), changed, "upstream polled");
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_observation_is_baseline() {
        let mut tracker = DigestTracker::default();
        assert!(!tracker.observe("a".to_string()));
    }

    #[test]
    fn test_change_reported_once() {
        let mut tracker = DigestTracker::default();
        tracker.observe("a".to_string());
        assert!(!tracker.observe("a".to_string()));
        assert!(tracker.observe("b".to_string()));
        assert!(!tracker.observe("b".to_string()));
    }
}
