// Remote query engine abstraction
pub mod adapter;
pub mod athena;

pub use adapter::QueryEngine;
pub use athena::AthenaHttpEngine;
