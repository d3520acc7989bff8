use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of one physical index build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Running,
    Successful,
    Failed,
    Deleted,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Successful => "successful",
            Self::Failed => "failed",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "successful" => Some(Self::Successful),
            "failed" => Some(Self::Failed),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// One physical build of a search index behind an alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexGeneration {
    /// Physical index name: alias plus a monotonically increasing suffix.
    pub name: String,
    /// Logical name readers resolve.
    pub alias: String,
    pub status: GenerationStatus,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl IndexGeneration {
    pub fn running(name: &str, alias: &str) -> Self {
        let now = Utc::now();
        Self {
            name: name.to_string(),
            alias: alias.to_string(),
            status: GenerationStatus::Running,
            created: now,
            modified: now,
        }
    }
}
