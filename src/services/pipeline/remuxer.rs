use super::error::PipelineError;
use super::staging::StagedFile;
use crate::services::process::{ToolError, ToolRunner};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Rewrites an MP4 so the moov atom precedes the media data ("fast start"),
/// copying every stream without re-encoding.
pub struct Remuxer {
    runner: Arc<dyn ToolRunner>,
    program: String,
    timeout: Duration,
}

/// Output lands next to the input: `<input>.processing`.
pub fn processing_path(input: &Path) -> PathBuf {
    let mut path = input.as_os_str().to_owned();
    path.push(".processing");
    PathBuf::from(path)
}

impl Remuxer {
    pub fn new(runner: Arc<dyn ToolRunner>, program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            runner,
            program: program.into(),
            timeout,
        }
    }

    /// Returns the remuxed artifact as a new scratch file. The input is left
    /// untouched; a partial output is removed if ffmpeg fails.
    pub async fn remux_fast_start(&self, input: &Path) -> Result<StagedFile, PipelineError> {
        let output = StagedFile::owned(processing_path(input));
        tracing::debug!(
            input = %input.display(),
            output = %output.path().display(),
            "Remuxing for fast start"
        );

        let args: Vec<OsString> = vec![
            "-nostdin".into(),
            "-y".into(),
            "-v".into(),
            "error".into(),
            "-i".into(),
            input.as_os_str().to_owned(),
            "-c".into(),
            "copy".into(),
            "-movflags".into(),
            "faststart".into(),
            "-f".into(),
            "mp4".into(),
            output.path().as_os_str().to_owned(),
        ];

        let result = self
            .runner
            .run(&self.program, &args, self.timeout)
            .await
            .map_err(|e| match e {
                ToolError::Launch { .. } => PipelineError::RemuxUnavailable(e.to_string()),
                ToolError::TimedOut { .. } => PipelineError::RemuxFailed(e.to_string()),
            })?;

        if !result.success {
            let stderr = result.stderr_lossy();
            tracing::error!(exit_code = ?result.exit_code, %stderr, "ffmpeg remux failed");
            return Err(PipelineError::RemuxFailed(format!(
                "exit code {:?}: {}",
                result.exit_code, stderr
            )));
        }

        if tokio::fs::metadata(output.path()).await.is_err() {
            return Err(PipelineError::RemuxFailed(
                "ffmpeg reported success but produced no output".to_string(),
            ));
        }

        tracing::info!(output = %output.path().display(), "Processed video for fast start");
        Ok(output)
    }
}
