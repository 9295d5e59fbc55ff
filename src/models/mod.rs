pub mod execution;
pub mod query;
pub mod record;

pub use execution::*;
pub use query::*;
pub use record::*;
