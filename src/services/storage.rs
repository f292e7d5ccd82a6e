use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object store rejected the request: {0}")]
    Rejected(String),

    #[error("Presigning failed: {0}")]
    Signing(String),
}

/// The object store operations the pipeline needs.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Uploads the file at `path` under `bucket/key`, replacing any existing object.
    async fn put_object_from_path(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Generates a time-limited GET URL for `bucket/key`.
    async fn presigned_get_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError>;

    async fn health_check(&self, bucket: &str) -> bool;
}

pub struct S3StorageService {
    client: Client,
}

impl S3StorageService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl StorageService for S3StorageService {
    async fn put_object_from_path(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let start = std::time::Instant::now();
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::Io(std::io::Error::other(e)))?;

        let res = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await;

        if let Err(e) = res {
            tracing::error!(
                bucket,
                key,
                error = %DisplayErrorContext(&e),
                "S3 put_object failed"
            );
            return Err(StorageError::Rejected(DisplayErrorContext(&e).to_string()));
        }

        tracing::info!(
            bucket,
            key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );
        Ok(())
    }

    async fn presigned_get_url(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        tracing::debug!(bucket, key, ?expires_in, "Generating presigned URL");

        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::Signing(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Signing(DisplayErrorContext(&e).to_string()))?;

        Ok(request.uri().to_string())
    }

    async fn health_check(&self, bucket: &str) -> bool {
        self.client.head_bucket().bucket(bucket).send().await.is_ok()
    }
}
