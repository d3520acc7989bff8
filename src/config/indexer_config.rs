//! Indexer configuration parsing
//!
//! Loads the indexer configuration from YAML and provides strongly-typed
//! access to the alias and entity type definitions that drive rebuilds.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Errors loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("environment variable {0} is not set")]
    MissingEnv(String),
}

/// Root configuration structure for the indexer
#[derive(Debug, Clone, Deserialize)]
pub struct IndexerConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    pub search: SearchConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub upstream: Option<UpstreamConfig>,
    /// Version-gated SQL seed files applied at startup, in order.
    #[serde(default)]
    pub seeds: Vec<SeedConfig>,
    pub aliases: Vec<AliasConfig>,
}

/// Database connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Name of the environment variable holding the connection string
    #[serde(default = "default_connection_string_env")]
    pub connection_string_env: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            connection_string_env: default_connection_string_env(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// Resolve the connection string from the environment.
    pub fn connection_string(&self) -> Result<String, ConfigError> {
        std::env::var(&self.connection_string_env)
            .map_err(|_| ConfigError::MissingEnv(self.connection_string_env.clone()))
    }
}

fn default_connection_string_env() -> String {
    "DATABASE_URL".to_string()
}

fn default_max_connections() -> u32 {
    10
}

/// Search engine connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub base_url: String,
    /// Maximum page/window size configured on every created index
    #[serde(default = "default_max_result_window")]
    pub max_result_window: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_max_result_window() -> u32 {
    50_000
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// Startup mode for the initial load and rebuild
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StartupMode {
    /// Initialize in the background (schedulers start immediately)
    Async,
    /// Initialize before starting the schedulers
    #[default]
    Sync,
}

/// Configuration for the periodic rebuild triggers
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_reindex_interval_secs")]
    pub reindex_interval_secs: u64,
    #[serde(default = "default_upstream_check_interval_secs")]
    pub upstream_check_interval_secs: u64,
    #[serde(default)]
    pub startup_mode: StartupMode,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reindex_interval_secs: default_reindex_interval_secs(),
            upstream_check_interval_secs: default_upstream_check_interval_secs(),
            startup_mode: StartupMode::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn reindex_interval(&self) -> Duration {
        Duration::from_secs(self.reindex_interval_secs)
    }

    pub fn upstream_check_interval(&self) -> Duration {
        Duration::from_secs(self.upstream_check_interval_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_reindex_interval_secs() -> u64 {
    60
}

fn default_upstream_check_interval_secs() -> u64 {
    24 * 60 * 60
}

/// Ledger lease configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LedgerConfig {
    /// Running records idle for longer than this are reclaimed before a
    /// rebuild. Unset leaves stale records for an operator to clear. Must
    /// exceed the longest rebuild, which never refreshes its record.
    #[serde(default)]
    pub stale_lease_secs: Option<u64>,
}

impl LedgerConfig {
    pub fn stale_lease(&self) -> Option<Duration> {
        self.stale_lease_secs.map(Duration::from_secs)
    }
}

/// Upstream data source polled for changes
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    pub url: String,
}

/// A versioned SQL seed file
#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    pub data_type: String,
    pub identifier: String,
    pub path: PathBuf,
}

/// One logical index and the entity types rebuilt into it
#[derive(Debug, Clone, Deserialize)]
pub struct AliasConfig {
    pub alias: String,
    pub entity_types: Vec<EntityTypeConfig>,
}

/// Configuration for a single entity type
#[derive(Debug, Clone, Deserialize)]
pub struct EntityTypeConfig {
    /// Entity type tag written into every document (e.g., "codescheme")
    pub name: String,
    /// Fully qualified table name
    pub source_table: String,
    /// Column holding the document id
    #[serde(default = "default_id_column")]
    pub id_column: String,
    /// Optional WHERE clause filter (e.g., "t.status <> 'RETIRED'")
    #[serde(default)]
    pub filter: Option<String>,
    /// Whether an empty collection is a legitimate rebuild input
    #[serde(default)]
    pub allow_empty: bool,
}

impl EntityTypeConfig {
    /// Whether both configs read the same rows. `allow_empty` may differ.
    pub fn same_source(&self, other: &EntityTypeConfig) -> bool {
        self.source_table == other.source_table
            && self.id_column == other.id_column
            && self.filter == other.filter
    }
}

fn default_id_column() -> String {
    "id".to_string()
}

impl IndexerConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: IndexerConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get an alias configuration by name
    pub fn alias(&self, name: &str) -> Option<&AliasConfig> {
        self.aliases.iter().find(|a| a.alias == name)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.aliases.is_empty() {
            return Err(ConfigError::Invalid("no aliases configured".to_string()));
        }

        let mut seen = HashSet::new();
        let mut sources: HashMap<&str, &EntityTypeConfig> = HashMap::new();
        for alias in &self.aliases {
            if alias.alias.is_empty() {
                return Err(ConfigError::Invalid("alias name is empty".to_string()));
            }
            if !seen.insert(alias.alias.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "alias {} configured twice",
                    alias.alias
                )));
            }
            if alias.entity_types.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "alias {} has no entity types",
                    alias.alias
                )));
            }
            // Entity types are read by name, so one name maps to one source.
            for entity_type in &alias.entity_types {
                let previous = *sources
                    .entry(entity_type.name.as_str())
                    .or_insert(entity_type);
                if !previous.same_source(entity_type) {
                    return Err(ConfigError::Invalid(format!(
                        "entity type {} configured with different sources",
                        entity_type.name
                    )));
                }
            }
        }

        if self.scheduler.reindex_interval_secs == 0
            || self.scheduler.upstream_check_interval_secs == 0
        {
            return Err(ConfigError::Invalid(
                "scheduler intervals must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
