//! Version-gated data loading at startup

pub mod orchestrator;
pub mod seed;

pub use orchestrator::{
    run_gated, DataLoadOrchestrator, DataLoader, InitializationReport, LoadOutcome, LoadStatus,
    INITIALIZATION_DATA_TYPE, INITIALIZATION_IDENTIFIER,
};
pub use seed::{digest, SqlSeedLoader};
