//! Rebuild scheduling
//!
//! Two periodic triggers share one loop abstraction: an unconditional
//! reindex on a short cadence and an upstream check on a long one.

pub mod periodic;
pub mod schedules;
pub mod upstream;

pub use periodic::run_periodic;
pub use schedules::RebuildScheduler;
pub use upstream::{DigestTracker, HttpUpstreamCheck, UpstreamCheck};
