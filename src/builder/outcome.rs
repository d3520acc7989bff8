use std::time::Duration;

use serde::Serialize;

use crate::ledger::LedgerError;
use crate::search::AdminToolsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RebuildStatus {
    /// The new generation is live and older generations were cleaned up.
    Success,
    /// The rebuild was abandoned; the previous generation keeps serving.
    Failed,
    /// Another rebuild of the alias holds the lease.
    Skipped,
}

/// Result of one rebuild invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RebuildOutcome {
    pub alias: String,
    pub status: RebuildStatus,
    /// The generation built by this invocation (absent when skipped).
    pub generation: Option<String>,
    pub items_written: usize,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl RebuildOutcome {
    pub fn success(alias: &str, generation: &str, items_written: usize, elapsed: Duration) -> Self {
        Self {
            alias: alias.to_string(),
            status: RebuildStatus::Success,
            generation: Some(generation.to_string()),
            items_written,
            duration_ms: millis(elapsed),
            error: None,
        }
    }

    pub fn failed(
        alias: &str,
        generation: Option<&str>,
        items_written: usize,
        elapsed: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            alias: alias.to_string(),
            status: RebuildStatus::Failed,
            generation: generation.map(str::to_string),
            items_written,
            duration_ms: millis(elapsed),
            error: Some(error.into()),
        }
    }

    pub fn skipped(alias: &str, elapsed: Duration) -> Self {
        Self {
            alias: alias.to_string(),
            status: RebuildStatus::Skipped,
            generation: None,
            items_written: 0,
            duration_ms: millis(elapsed),
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RebuildStatus::Success
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Errors a rebuild reports to its caller instead of a failed outcome.
#[derive(Debug, thiserror::Error)]
pub enum RebuildError {
    #[error("alias not configured: {0}")]
    UnknownAlias(String),

    /// Ledger or generation bookkeeping failed; the caller decides whether
    /// to retry.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Search(#[from] AdminToolsError),
}
