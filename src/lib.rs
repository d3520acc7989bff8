//! Refdata Indexer - Search index maintenance for the reference-data catalog
//!
//! Keeps a search index synchronized with the authoritative relational
//! store. Every alias is rebuilt into a fresh generation and readers are cut
//! over in one alias swap, so they never see a partial or empty index. A
//! version ledger makes versioned loads idempotent and doubles as the lease
//! that keeps two rebuilds of one alias from overlapping.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Triggers: RebuildScheduler, DataLoadOrchestrator, CLI          │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      IndexBuilder                               │
//! │     lease check -> build generation -> swap alias -> cleanup    │
//! └─────────────────────────────────────────────────────────────────┘
//!          │                    │                       │
//!          ▼                    ▼                       ▼
//! ┌─────────────────┐ ┌───────────────────┐ ┌───────────────────────┐
//! │  VersionLedger  │ │   EntitySource    │ │    IndexAdminTools    │
//! │ GenerationStore │ │  (Postgres rows)  │ │ (Elasticsearch REST)  │
//! └─────────────────┘ └───────────────────┘ └───────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use refdata_indexer::{Indexer, IndexerConfig};
//!
//! let config = IndexerConfig::from_file("config/indexer.yaml")?;
//! let indexer = Indexer::connect(config).await?;
//!
//! indexer.orchestrator.initialize().await?;
//! let handles = indexer.scheduler.spawn(shutdown_rx);
//! ```

pub mod app;
pub mod builder;
pub mod config;
pub mod generation;
pub mod ledger;
pub mod loader;
pub mod scheduler;
pub mod search;
pub mod source;

// Re-export main types
pub use app::Indexer;
pub use builder::{AliasStatus, IndexBuilder, RebuildError, RebuildOutcome, RebuildStatus};
pub use config::{ConfigError, IndexerConfig, StartupMode};
pub use generation::{GenerationStatus, GenerationStore, IndexGeneration};
pub use ledger::{LedgerError, RunStatus, VersionLedger, VersionRecord, VersionStore};
pub use loader::{DataLoadOrchestrator, DataLoader, InitializationReport, LoadOutcome, LoadStatus};
pub use scheduler::{HttpUpstreamCheck, RebuildScheduler, UpstreamCheck};
pub use search::{AdminToolsError, IndexAdminTools, SearchEngine, SearchableEntity};
pub use source::{EntitySource, SourceError};
