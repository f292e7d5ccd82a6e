use super::error::PipelineError;
use super::uploader::StoredObjectRef;
use crate::services::storage::StorageService;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DEFAULT_SIGNED_URL_TTL: Duration = Duration::from_secs(15 * 60);

/// How a stored object is turned into a URL callers can fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlPolicy {
    /// Public objects: `{base_url}/{bucket}/{key}`, persisted as-is.
    Direct { base_url: String },
    /// Private objects: the record keeps `bucket,key` and every read is
    /// presigned for `expires_in`.
    Signed { expires_in: Duration },
}

pub struct UrlResolver {
    policy: UrlPolicy,
    signer: Option<Arc<dyn StorageService>>,
}

impl UrlResolver {
    pub fn new(policy: UrlPolicy, signer: Option<Arc<dyn StorageService>>) -> Self {
        Self { policy, signer }
    }

    pub async fn resolve(&self, object: &StoredObjectRef) -> Result<String, PipelineError> {
        match &self.policy {
            UrlPolicy::Direct { base_url } => direct_url(base_url, object),
            UrlPolicy::Signed { expires_in } => {
                let signer = self
                    .signer
                    .as_ref()
                    .ok_or(PipelineError::SigningUnavailable)?;
                tracing::debug!(bucket = %object.bucket, key = %object.key, "Signing video URL");
                signer
                    .presigned_get_url(&object.bucket, &object.key, *expires_in)
                    .await
                    .map_err(|e| PipelineError::SigningFailed(e.to_string()))
            }
        }
    }

    /// The value written to the record after a successful upload. Signed URLs
    /// expire, so only the object reference is kept under that policy.
    pub fn persistable(&self, object: &StoredObjectRef) -> Result<String, PipelineError> {
        match &self.policy {
            UrlPolicy::Direct { base_url } => direct_url(base_url, object),
            UrlPolicy::Signed { .. } => Ok(object.to_record_value()),
        }
    }

    /// Turns a persisted `video_url` value into the URL returned to the caller.
    pub async fn present(&self, stored: Option<&str>) -> Result<Option<String>, PipelineError> {
        let Some(stored) = stored else {
            return Ok(None);
        };
        match &self.policy {
            UrlPolicy::Direct { .. } => Ok(Some(stored.to_string())),
            UrlPolicy::Signed { .. } => {
                let object = StoredObjectRef::parse(stored)?;
                self.resolve(&object).await.map(Some)
            }
        }
    }
}

fn direct_url(base_url: &str, object: &StoredObjectRef) -> Result<String, PipelineError> {
    let mut url = Url::parse(base_url)
        .map_err(|e| PipelineError::ConfigInvalid(format!("direct URL base {base_url:?}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(PipelineError::ConfigInvalid(format!(
            "direct URL base must be http(s): {base_url}"
        )));
    }

    url.path_segments_mut()
        .map_err(|_| PipelineError::ConfigInvalid(format!("direct URL base cannot carry a path: {base_url}")))?
        .pop_if_empty()
        .push(&object.bucket)
        .extend(object.key.split('/'));

    Ok(url.into())
}
