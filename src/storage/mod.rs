pub mod object_store;
pub mod s3;

pub use object_store::ObjectStore;
pub use s3::S3HttpStore;
