use tokio::io::AsyncWrite;

use crate::error::AthenaError;

/// Object storage holding query result artifacts, scoped to one bucket
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stream the object at `path` into `dest`, returning the bytes written
    async fn download(
        &self,
        path: &str,
        dest: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64, AthenaError>;

    fn bucket(&self) -> &str;
}
