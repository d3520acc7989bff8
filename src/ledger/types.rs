//! Version record types shared by the ledger service and its stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a version record.
///
/// Records are created `Running` and move exactly once to a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Successful,
    Failed,
    /// A stale lease reclaimed after its holder stopped renewing it.
    Canceled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Successful => "successful",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "successful" => Some(Self::Successful),
            "failed" => Some(Self::Failed),
            "canceled" => Some(Self::Canceled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// One attempt to apply a versioned batch of data, or to rebuild an alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub id: Uuid,
    /// Dataset tag, e.g. "coderegistries", or the alias for rebuild leases.
    pub data_type: String,
    /// Sub-key within the data type (a registry code, or the alias again).
    pub identifier: String,
    /// Origin tag, e.g. "internal" or "scheduled".
    pub source: String,
    /// Opaque version string, compared for equality only.
    pub version: String,
    pub status: RunStatus,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl VersionRecord {
    /// A fresh `Running` record stamped with the current time.
    pub fn running(data_type: &str, identifier: &str, source: &str, version: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            data_type: data_type.to_string(),
            identifier: identifier.to_string(),
            source: source.to_string(),
            version: version.to_string(),
            status: RunStatus::Running,
            created: now,
            modified: now,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Running
    }
}
