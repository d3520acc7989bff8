//! Configuration for the indexer service.

pub mod indexer_config;

pub use indexer_config::{
    AliasConfig, ConfigError, DatabaseConfig, EntityTypeConfig, IndexerConfig, LedgerConfig,
    SchedulerConfig, SearchConfig, SeedConfig, StartupMode, UpstreamConfig,
};
