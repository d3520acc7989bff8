//! Index builder
//!
//! Rebuilds each alias into a new physical generation, swaps the alias onto
//! it in one request, and deletes superseded generations. Readers keep the
//! previous generation until the swap, and keep it for good if anything
//! before the swap fails.

pub mod naming;
pub mod outcome;
pub mod rebuild;

pub use naming::GenerationNamer;
pub use outcome::{RebuildError, RebuildOutcome, RebuildStatus};
pub use rebuild::{AliasStatus, IndexBuilder, REBUILD_SOURCE};
