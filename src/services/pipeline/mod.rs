//! Upload-to-storage pipeline.
//!
//! An upload moves through
//! `Received → Validated → Staged → Probed → Remuxed → Classified → Uploaded → Resolved → Completed`
//! and stops at the first failure. Every scratch file created along the way is
//! removed before [`UploadPipeline::run`] returns, whatever the outcome.

pub mod classifier;
pub mod error;
pub mod prober;
pub mod remuxer;
pub mod resolver;
pub mod staging;
pub mod uploader;

use crate::entities::videos;
use crate::services::process::ToolRunner;
use crate::services::record_store::{RecordError, RecordStore};
use crate::services::storage::StorageService;
use classifier::{Orientation, classify};
use error::ErrorKind;
use prober::{MediaProber, ProbeResult};
use remuxer::Remuxer;
use resolver::{UrlPolicy, UrlResolver};
use staging::{StagedFile, StagingStore};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use uploader::{ObjectUploader, StorageKey, StoredObjectRef};
use uuid::Uuid;

pub use error::PipelineError;

pub const VIDEO_MEDIA_TYPES: &[&str] = &["video/mp4"];

const VIDEO_EXTENSION: &str = "mp4";

/// Everything the pipeline needs, passed in rather than read from the
/// environment so tests can run several configurations side by side.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub staging_dir: PathBuf,
    pub ffprobe_path: String,
    pub ffmpeg_path: String,
    pub probe_timeout: Duration,
    pub remux_timeout: Duration,
    pub bucket: String,
    pub url_policy: UrlPolicy,
}

pub struct UploadRequest<R> {
    pub body: R,
    pub content_type: String,
    pub video_id: Uuid,
    pub requester: Uuid,
    pub max_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    /// The updated record, with `video_url` already presented for the caller
    pub video: videos::Model,
    pub object: StoredObjectRef,
    pub orientation: Orientation,
    pub probe: ProbeResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    Validated,
    Staged,
    Probed,
    Remuxed,
    Classified,
    Uploaded,
    Resolved,
    Completed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Received => "received",
            PipelineStage::Validated => "validated",
            PipelineStage::Staged => "staged",
            PipelineStage::Probed => "probed",
            PipelineStage::Remuxed => "remuxed",
            PipelineStage::Classified => "classified",
            PipelineStage::Uploaded => "uploaded",
            PipelineStage::Resolved => "resolved",
            PipelineStage::Completed => "completed",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a declared content type and checks its essence (parameters such as
/// `codecs=` are ignored) against `allowed`.
pub fn validate_media_type(declared: &str, allowed: &[&str]) -> Result<mime::Mime, PipelineError> {
    let parsed: mime::Mime = declared
        .trim()
        .parse()
        .map_err(|_| PipelineError::UnsupportedMediaType(declared.to_string()))?;

    if allowed
        .iter()
        .any(|candidate| parsed.essence_str().eq_ignore_ascii_case(candidate))
    {
        Ok(parsed)
    } else {
        Err(PipelineError::UnsupportedMediaType(declared.to_string()))
    }
}

/// Checks that `requester` owns the record and returns it.
pub async fn authorize_owner(
    records: &dyn RecordStore,
    video_id: Uuid,
    requester: Uuid,
) -> Result<videos::Model, PipelineError> {
    let video = records.get_video(video_id).await.map_err(PipelineError::from)?;
    if video.user_id != requester {
        return Err(PipelineError::NotOwner);
    }
    Ok(video)
}

impl From<RecordError> for PipelineError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::NotFound(id) => PipelineError::RecordNotFound(id),
            RecordError::Database(e) => PipelineError::RecordStore(e.to_string()),
        }
    }
}

pub struct UploadPipeline {
    staging: StagingStore,
    prober: MediaProber,
    remuxer: Remuxer,
    uploader: ObjectUploader,
    resolver: Arc<UrlResolver>,
    records: Arc<dyn RecordStore>,
}

impl UploadPipeline {
    pub fn new(
        config: PipelineConfig,
        runner: Arc<dyn ToolRunner>,
        storage: Arc<dyn StorageService>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            staging: StagingStore::new(config.staging_dir),
            prober: MediaProber::new(runner.clone(), config.ffprobe_path, config.probe_timeout),
            remuxer: Remuxer::new(runner, config.ffmpeg_path, config.remux_timeout),
            uploader: ObjectUploader::new(storage.clone(), config.bucket),
            resolver: Arc::new(UrlResolver::new(config.url_policy, Some(storage))),
            records,
        }
    }

    /// The resolver the pipeline presents URLs with; record reads use the
    /// same one so both paths agree on the policy.
    pub fn resolver(&self) -> Arc<UrlResolver> {
        self.resolver.clone()
    }

    pub async fn run<R>(&self, request: UploadRequest<R>) -> Result<UploadOutcome, PipelineError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let video_id = request.video_id;
        let mut stage = PipelineStage::Received;
        let mut scratch: Vec<StagedFile> = Vec::new();

        let result = self.execute(request, &mut stage, &mut scratch).await;

        for file in scratch {
            let path = file.path().to_path_buf();
            if let Err(e) = file.remove().await {
                tracing::warn!(%video_id, path = %path.display(), error = %e, "Failed to remove scratch file");
            }
        }

        match &result {
            Ok(outcome) => tracing::info!(
                %video_id,
                key = %outcome.object.key,
                orientation = %outcome.orientation,
                "Video upload completed"
            ),
            Err(e) if e.kind() == ErrorKind::Validation => {
                tracing::warn!(%video_id, %stage, error = %e, "Video upload rejected")
            }
            Err(e) => tracing::error!(%video_id, %stage, error = %e, "Video upload failed"),
        }

        result
    }

    async fn execute<R>(
        &self,
        request: UploadRequest<R>,
        stage: &mut PipelineStage,
        scratch: &mut Vec<StagedFile>,
    ) -> Result<UploadOutcome, PipelineError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let video_id = request.video_id;
        let mut advance = |next: PipelineStage| {
            *stage = next;
            tracing::debug!(%video_id, stage = %next, "Upload pipeline advanced");
        };

        let media_type = validate_media_type(&request.content_type, VIDEO_MEDIA_TYPES)?;
        let mut video =
            authorize_owner(self.records.as_ref(), video_id, request.requester).await?;
        advance(PipelineStage::Validated);

        let staged = self.staging.stage(request.body, request.max_bytes).await?;
        let input = staged.path().to_path_buf();
        scratch.push(staged);
        advance(PipelineStage::Staged);

        let probe = self.prober.probe(&input).await?;
        advance(PipelineStage::Probed);

        let processed = self.remuxer.remux_fast_start(&input).await?;
        let output = processed.path().to_path_buf();
        scratch.push(processed);
        advance(PipelineStage::Remuxed);

        let orientation = classify(probe.width, probe.height)?;
        let key = StorageKey::for_video(orientation, video_id, VIDEO_EXTENSION);
        advance(PipelineStage::Classified);

        let object = self
            .uploader
            .upload(&output, &key, media_type.essence_str())
            .await?;
        advance(PipelineStage::Uploaded);

        let presented = self.resolver.resolve(&object).await?;
        video.video_url = Some(self.resolver.persistable(&object)?);
        advance(PipelineStage::Resolved);

        let mut video = self.records.update_video(video).await?;
        video.video_url = Some(presented);
        advance(PipelineStage::Completed);

        Ok(UploadOutcome {
            video,
            object,
            orientation,
            probe,
        })
    }
}
