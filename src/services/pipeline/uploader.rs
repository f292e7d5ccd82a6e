use super::classifier::Orientation;
use super::error::PipelineError;
use crate::services::storage::{StorageError, StorageService};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Object key for an uploaded artifact: `<orientation>/<id>.<ext>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn for_video(orientation: Orientation, id: Uuid, extension: &str) -> Self {
        Self(format!("{}{}.{}", orientation.key_prefix(), id, extension))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an artifact lives in the object store. This, not a URL, is the
/// durable result of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObjectRef {
    pub bucket: String,
    pub key: String,
}

impl StoredObjectRef {
    /// Persisted form: `bucket,key`.
    pub fn to_record_value(&self) -> String {
        format!("{},{}", self.bucket, self.key)
    }

    pub fn parse(value: &str) -> Result<Self, PipelineError> {
        match value.split_once(',') {
            Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok(Self {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            _ => Err(PipelineError::MalformedObjectRef(value.to_string())),
        }
    }
}

/// Pushes finished artifacts to the configured bucket.
pub struct ObjectUploader {
    storage: Arc<dyn StorageService>,
    bucket: String,
}

impl ObjectUploader {
    pub fn new(storage: Arc<dyn StorageService>, bucket: impl Into<String>) -> Self {
        Self {
            storage,
            bucket: bucket.into(),
        }
    }

    /// Uploads the file at `path`. The local file is not deleted.
    pub async fn upload(
        &self,
        path: &Path,
        key: &StorageKey,
        content_type: &str,
    ) -> Result<StoredObjectRef, PipelineError> {
        self.storage
            .put_object_from_path(&self.bucket, key.as_str(), path, content_type)
            .await
            .map_err(|e| match e {
                StorageError::Io(e) => PipelineError::IoFault(e),
                other => PipelineError::UploadRejected(other.to_string()),
            })?;

        Ok(StoredObjectRef {
            bucket: self.bucket.clone(),
            key: key.as_str().to_string(),
        })
    }
}
