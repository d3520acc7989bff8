//! Version ledger
//!
//! Durable history of versioned load and rebuild attempts. A successful
//! record marks a version as applied; a running record doubles as the lease
//! that keeps two attempts on the same `(data_type, identifier)` from
//! overlapping, across processes sharing one database.

pub mod memory;
pub mod ports;
pub mod postgres;
pub mod service;
pub mod types;

pub use memory::InMemoryVersionStore;
pub use ports::{LedgerError, VersionStore};
pub use postgres::PgVersionStore;
pub use service::VersionLedger;
pub use types::{RunStatus, VersionRecord};
