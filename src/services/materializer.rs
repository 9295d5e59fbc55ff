// Result Materialization
//
// Turns a succeeded execution into rows: resolve the artifact, stage it
// locally, parse it as CSV and zip each row against the header.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::AthenaError;
use crate::models::{ExecutionDescriptor, ResultRecord};
use crate::storage::ObjectStore;

/// Result artifact as addressed in the bucket and on local disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocation {
    /// `/<output_folder>/<file_name>` under the configured bucket
    pub object_path: String,
    pub file_name: String,
}

impl ArtifactLocation {
    pub fn from_result_uri(result_uri: &str, output_folder: &str) -> Result<Self, AthenaError> {
        let file_name = result_uri
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty() && !name.contains(':'))
            .ok_or_else(|| {
                AthenaError::Internal(format!("Result location {} has no file name", result_uri))
            })?
            .to_string();

        let folder = output_folder.trim_matches('/');
        let object_path = if folder.is_empty() {
            format!("/{}", file_name)
        } else {
            format!("/{}/{}", folder, file_name)
        };

        Ok(Self {
            object_path,
            file_name,
        })
    }

    pub fn from_descriptor(
        descriptor: &ExecutionDescriptor,
        output_folder: &str,
    ) -> Result<Self, AthenaError> {
        let uri = descriptor.result_location.as_deref().ok_or_else(|| {
            AthenaError::Internal(format!(
                "Query {} ({}) reported no result location",
                descriptor.execution_id, descriptor.state
            ))
        })?;
        Self::from_result_uri(uri, output_folder)
    }
}

/// Local copy of a result artifact, removed when dropped
#[derive(Debug)]
pub struct StagingFile {
    path: PathBuf,
}

impl StagingFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagingFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed staging file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove staging file {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

pub struct ResultMaterializer {
    store: Arc<dyn ObjectStore>,
    output_folder: String,
    staging_dir: PathBuf,
}

impl ResultMaterializer {
    pub fn new(store: Arc<dyn ObjectStore>, output_folder: impl Into<String>, staging_dir: PathBuf) -> Self {
        Self {
            store,
            output_folder: output_folder.into(),
            staging_dir,
        }
    }

    pub fn locate(&self, descriptor: &ExecutionDescriptor) -> Result<ArtifactLocation, AthenaError> {
        ArtifactLocation::from_descriptor(descriptor, &self.output_folder)
    }

    /// Download, parse and clean up the artifact of a succeeded execution
    pub async fn materialize(
        &self,
        descriptor: &ExecutionDescriptor,
    ) -> Result<Vec<ResultRecord>, AthenaError> {
        let location = self.locate(descriptor)?;
        let staging = self.download(&location).await?;

        let path = staging.path().to_path_buf();
        let rows = tokio::task::spawn_blocking(move || read_rows(&path))
            .await
            .map_err(|e| AthenaError::Internal(format!("CSV parser task failed: {}", e)))??;

        drop(staging);

        Ok(zip_with_header(rows))
    }

    /// Stage the artifact locally. The guard is created before the file so a
    /// partial download never outlives the call.
    pub async fn download(&self, location: &ArtifactLocation) -> Result<StagingFile, AthenaError> {
        tokio::fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(|e| AthenaError::download(&location.object_path, e))?;

        let staging = StagingFile::new(self.staging_dir.join(&location.file_name));

        let mut file = tokio::fs::File::create(staging.path())
            .await
            .map_err(|e| AthenaError::download(&location.object_path, e))?;

        let bytes = self
            .store
            .download(&location.object_path, &mut file)
            .await
            .map_err(|e| AthenaError::download(&location.object_path, e))?;

        file.sync_all()
            .await
            .map_err(|e| AthenaError::download(&location.object_path, e))?;

        tracing::debug!(
            "Staged {} bytes from s3://{}{} at {}",
            bytes,
            self.store.bucket(),
            location.object_path,
            staging.path().display()
        );

        Ok(staging)
    }
}

/// Read every physical row of a CSV file as a list of fields
pub fn read_rows(path: &Path) -> Result<Vec<Vec<String>>, AthenaError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| AthenaError::ResultParse(format!("{}: {}", path.display(), e)))?;

    reader
        .records()
        .map(|record| {
            record
                .map(|record| record.iter().map(str::to_string).collect())
                .map_err(|e| AthenaError::ResultParse(format!("{}: {}", path.display(), e)))
        })
        .collect()
}

/// First row is the header; every later row keeps only the positions present
/// in both the header and the row.
pub fn zip_with_header(rows: Vec<Vec<String>>) -> Vec<ResultRecord> {
    let mut rows = rows.into_iter();
    let Some(header) = rows.next() else {
        return Vec::new();
    };

    rows.map(|row| header.iter().cloned().zip(row).collect())
        .collect()
}
