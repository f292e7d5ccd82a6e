use crate::entities::videos;
use crate::services::pipeline::staging::StagingStore;
use crate::services::pipeline::{PipelineError, authorize_owner, validate_media_type};
use crate::services::record_store::RecordStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncRead;
use uuid::Uuid;

pub const THUMBNAIL_MEDIA_TYPES: &[&str] = &["image/jpeg", "image/png"];

/// File extension a thumbnail is stored under.
pub fn thumbnail_extension(essence: &str) -> Option<&'static str> {
    match essence.to_ascii_lowercase().as_str() {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        _ => None,
    }
}

/// Stores thumbnails under the local assets directory served at `/assets`.
pub struct ThumbnailService {
    assets_root: PathBuf,
    public_base_url: String,
    records: Arc<dyn RecordStore>,
}

impl ThumbnailService {
    pub fn new(
        assets_root: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            assets_root: assets_root.into(),
            public_base_url: public_base_url.into(),
            records,
        }
    }

    pub fn public_url(&self, file_name: &str) -> String {
        format!(
            "{}/assets/{}",
            self.public_base_url.trim_end_matches('/'),
            file_name
        )
    }

    /// Validates, checks ownership, then writes `<assets_root>/<id>.<ext>` and
    /// points the record's `thumbnail_url` at it. Nothing is written for a
    /// caller that does not own the record.
    pub async fn save<R>(
        &self,
        body: R,
        content_type: &str,
        video_id: Uuid,
        requester: Uuid,
        max_bytes: u64,
    ) -> Result<videos::Model, PipelineError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let media_type = validate_media_type(content_type, THUMBNAIL_MEDIA_TYPES)?;
        let extension = thumbnail_extension(media_type.essence_str())
            .ok_or_else(|| PipelineError::UnsupportedMediaType(content_type.to_string()))?;

        let mut video = authorize_owner(self.records.as_ref(), video_id, requester).await?;

        tokio::fs::create_dir_all(&self.assets_root).await?;
        let staging = StagingStore::new(&self.assets_root).with_suffix(format!(".{extension}"));
        let staged = staging.stage(body, max_bytes).await?;

        let file_name = format!("{video_id}.{extension}");
        staged.persist(&self.assets_root.join(&file_name)).await?;

        video.thumbnail_url = Some(self.public_url(&file_name));
        let video = self.records.update_video(video).await?;

        tracing::info!(%video_id, file = %file_name, "Thumbnail stored");
        Ok(video)
    }
}
