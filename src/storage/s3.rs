// S3 object reads over plain HTTP, path-style addressing
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use url::Url;

use crate::error::AthenaError;
use crate::storage::object_store::ObjectStore;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Longest silence allowed between body chunks. Large artifacts are not
/// capped as a whole.
const READ_TIMEOUT: Duration = Duration::from_secs(60);

pub struct S3HttpStore {
    endpoint: Url,
    bucket: String,
    client: Client,
}

impl S3HttpStore {
    pub fn new(endpoint: &str, bucket: impl Into<String>) -> Result<Self, AthenaError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| AthenaError::Config(format!("Invalid S3 endpoint: {}", e)))?;

        if endpoint.scheme() != "http" && endpoint.scheme() != "https" {
            return Err(AthenaError::Config(
                "S3 endpoint must use http:// or https://".to_string(),
            ));
        }

        let bucket = bucket.into();
        if bucket.is_empty() {
            return Err(AthenaError::Config("S3 bucket must not be empty".to_string()));
        }

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(READ_TIMEOUT)
            .build()
            .map_err(|e| AthenaError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            endpoint,
            bucket,
            client,
        })
    }

    /// `<endpoint>/<bucket>/<key>` with each key segment percent-encoded
    pub fn object_url(&self, path: &str) -> Result<Url, AthenaError> {
        let mut url = self.endpoint.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| AthenaError::Config("S3 endpoint cannot be a base URL".to_string()))?;
            segments.pop_if_empty();
            segments.push(&self.bucket);
            segments.extend(path.split('/').filter(|segment| !segment.is_empty()));
        }
        Ok(url)
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3HttpStore {
    async fn download(
        &self,
        path: &str,
        dest: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64, AthenaError> {
        let url = self.object_url(path)?;

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AthenaError::Storage(format!("GET {} failed: {}", url, e)))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(AthenaError::Storage(format!(
                    "Object {} not found in bucket {}",
                    path, self.bucket
                )));
            }
            status => {
                let error_body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(AthenaError::Storage(format!(
                    "GET {} failed ({}): {}",
                    url, status, error_body
                )));
            }
        }

        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| AthenaError::Storage(format!("Reading {} failed: {}", url, e)))?
        {
            dest.write_all(&chunk)
                .await
                .map_err(|e| AthenaError::Storage(format!("Writing {} failed: {}", path, e)))?;
            written += chunk.len() as u64;
        }
        dest.flush()
            .await
            .map_err(|e| AthenaError::Storage(format!("Writing {} failed: {}", path, e)))?;

        tracing::debug!("Downloaded {} bytes from s3://{}{}", written, self.bucket, path);

        Ok(written)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
