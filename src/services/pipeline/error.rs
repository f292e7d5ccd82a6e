use thiserror::Error;
use uuid::Uuid;

/// Failure category, used to pick the HTTP status and the log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller error: bad content type, identifier, ownership or size
    Validation,
    /// Local disk I/O or record store failure
    Resource,
    /// ffprobe/ffmpeg could not run or reported failure
    ExternalTool,
    /// Object store upload or signing failure
    Storage,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Media type not allowed: {0}")]
    UnsupportedMediaType(String),

    #[error("Video {0} not found")]
    RecordNotFound(Uuid),

    #[error("You don't own this video")]
    NotOwner,

    #[error("Upload exceeds the {limit} byte limit")]
    SizeExceeded { limit: u64 },

    #[error("I/O error: {0}")]
    IoFault(#[from] std::io::Error),

    #[error("ffprobe unavailable: {0}")]
    ProbeUnavailable(String),

    #[error("ffprobe failed: {0}")]
    ProbeFailed(String),

    #[error("ffprobe output malformed: {0}")]
    ProbeOutputMalformed(String),

    #[error("No streams found in the video file")]
    NoStreamData,

    #[error("Invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("ffmpeg unavailable: {0}")]
    RemuxUnavailable(String),

    #[error("ffmpeg error: {0}")]
    RemuxFailed(String),

    #[error("Upload rejected by object store: {0}")]
    UploadRejected(String),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Signing client is not initialized")]
    SigningUnavailable,

    #[error("Couldn't create presigned URL: {0}")]
    SigningFailed(String),

    #[error("Invalid video URL format: {0}")]
    MalformedObjectRef(String),

    #[error("Record store error: {0}")]
    RecordStore(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::UnsupportedMediaType(_)
            | PipelineError::RecordNotFound(_)
            | PipelineError::NotOwner
            | PipelineError::SizeExceeded { .. } => ErrorKind::Validation,
            PipelineError::IoFault(_) | PipelineError::RecordStore(_) => ErrorKind::Resource,
            PipelineError::ProbeUnavailable(_)
            | PipelineError::ProbeFailed(_)
            | PipelineError::ProbeOutputMalformed(_)
            | PipelineError::NoStreamData
            | PipelineError::InvalidDimensions { .. }
            | PipelineError::RemuxUnavailable(_)
            | PipelineError::RemuxFailed(_) => ErrorKind::ExternalTool,
            PipelineError::UploadRejected(_)
            | PipelineError::ConfigInvalid(_)
            | PipelineError::SigningUnavailable
            | PipelineError::SigningFailed(_)
            | PipelineError::MalformedObjectRef(_) => ErrorKind::Storage,
        }
    }

    /// Message safe to show the caller for server-side failures.
    pub fn public_message(&self) -> String {
        match self {
            PipelineError::IoFault(_) => "Failed to stage the upload".to_string(),
            PipelineError::RecordStore(_) => "Failed to update video record".to_string(),
            PipelineError::ProbeUnavailable(_)
            | PipelineError::ProbeFailed(_)
            | PipelineError::ProbeOutputMalformed(_)
            | PipelineError::NoStreamData
            | PipelineError::InvalidDimensions { .. } => {
                "Failed to determine aspect ratio".to_string()
            }
            PipelineError::RemuxUnavailable(_) | PipelineError::RemuxFailed(_) => {
                "Failed to process video for fast start".to_string()
            }
            PipelineError::UploadRejected(_) => "Failed to upload to object store".to_string(),
            PipelineError::ConfigInvalid(_)
            | PipelineError::SigningUnavailable
            | PipelineError::SigningFailed(_)
            | PipelineError::MalformedObjectRef(_) => "Failed to generate video URL".to_string(),
            other => other.to_string(),
        }
    }
}
