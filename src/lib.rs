pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use error::AthenaError;
pub use models::*;
pub use services::*;
pub use validation::*;
