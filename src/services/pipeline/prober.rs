use super::error::PipelineError;
use crate::services::process::ToolRunner;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Pixel dimensions of the first video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

/// Parses `ffprobe -print_format json -show_streams` output.
///
/// Audio and data streams carry no dimensions, so the first stream that has
/// both a non-zero width and height wins.
pub fn parse_probe_output(stdout: &[u8]) -> Result<ProbeResult, PipelineError> {
    if stdout.iter().all(u8::is_ascii_whitespace) {
        return Err(PipelineError::NoStreamData);
    }

    let output: FfprobeOutput = serde_json::from_slice(stdout)
        .map_err(|e| PipelineError::ProbeOutputMalformed(e.to_string()))?;

    output
        .streams
        .iter()
        .find_map(|stream| match (stream.width, stream.height) {
            (Some(width), Some(height)) if width > 0 && height > 0 => {
                Some(ProbeResult { width, height })
            }
            _ => None,
        })
        .ok_or(PipelineError::NoStreamData)
}

/// Reads frame dimensions from a staged file with ffprobe.
pub struct MediaProber {
    runner: Arc<dyn ToolRunner>,
    program: String,
    timeout: Duration,
}

impl MediaProber {
    pub fn new(runner: Arc<dyn ToolRunner>, program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            runner,
            program: program.into(),
            timeout,
        }
    }

    pub async fn probe(&self, path: &Path) -> Result<ProbeResult, PipelineError> {
        let args: Vec<OsString> = vec![
            "-v".into(),
            "error".into(),
            "-print_format".into(),
            "json".into(),
            "-show_streams".into(),
            path.as_os_str().to_owned(),
        ];

        let output = self
            .runner
            .run(&self.program, &args, self.timeout)
            .await
            .map_err(|e| PipelineError::ProbeUnavailable(e.to_string()))?;

        if !output.success {
            let stderr = output.stderr_lossy();
            tracing::error!(exit_code = ?output.exit_code, %stderr, "ffprobe failed");
            return Err(PipelineError::ProbeFailed(stderr));
        }

        let result = parse_probe_output(&output.stdout)?;
        tracing::debug!(width = result.width, height = result.height, "Probed video dimensions");
        Ok(result)
    }
}
