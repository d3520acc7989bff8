//! Index generation tracking
//!
//! Every rebuild writes into a fresh physical index (a generation) and only
//! then moves the alias onto it. The generation records let the builder find
//! superseded generations to delete after a cutover.

pub mod memory;
pub mod ports;
pub mod postgres;
pub mod types;

pub use memory::InMemoryGenerationStore;
pub use ports::GenerationStore;
pub use postgres::PgGenerationStore;
pub use types::{GenerationStatus, IndexGeneration};
