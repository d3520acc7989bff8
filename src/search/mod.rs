//! Search engine abstraction
//!
//! This module provides the `SearchEngine` port, its Elasticsearch and
//! in-memory implementations, the standard catalog mapping, and the
//! `IndexAdminTools` primitives the rebuild protocol is built from.

pub mod admin;
pub mod elasticsearch;
pub mod mapping;
pub mod memory;
pub mod traits;

pub use admin::{BulkResult, IndexAdminTools};
pub use elasticsearch::ElasticsearchClient;
pub use mapping::standard_mapping;
pub use memory::InMemorySearchEngine;
pub use traits::{
    AdminToolsError, AliasAction, BulkItemFailure, BulkResponse, SearchEngine, SearchableEntity,
};
