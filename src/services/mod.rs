pub mod bindings;
pub mod connection;
pub mod engine; // Remote query engine clients
pub mod executor;
pub mod materializer;
pub mod pagination;
pub mod translator;

pub use bindings::*;
pub use connection::*;
pub use executor::*;
pub use materializer::*;
pub use pagination::*;
pub use translator::*;
