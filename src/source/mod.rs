//! Entity sources the rebuild reads from.

pub mod memory;
pub mod postgres;
pub mod traits;

pub use memory::StaticEntitySource;
pub use postgres::PgEntitySource;
pub use traits::{EntitySource, SourceError};
