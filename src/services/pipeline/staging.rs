use super::error::PipelineError;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

/// A local scratch file produced by one pipeline stage.
///
/// While `owned` is set the file is deleted on drop, so a request that is
/// cancelled mid-flight still leaves nothing behind. The orchestrator removes
/// files explicitly through [`StagedFile::remove`] on the normal path.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    owned: bool,
}

impl StagedFile {
    pub fn owned(path: PathBuf) -> Self {
        Self { path, owned: true }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Opens a fresh handle positioned at the start of the file.
    #[cfg(test)]
    pub async fn open(&self) -> Result<File, PipelineError> {
        Ok(File::open(&self.path).await?)
    }

    #[cfg(test)]
    pub async fn len(&self) -> Result<u64, PipelineError> {
        Ok(tokio::fs::metadata(&self.path).await?.len())
    }

    /// Moves the file to `dest` and gives up ownership of it. On failure the
    /// scratch file is still removed on drop.
    pub async fn persist(mut self, dest: &Path) -> Result<(), PipelineError> {
        tokio::fs::rename(&self.path, dest).await?;
        self.owned = false;
        Ok(())
    }

    /// Deletes the file. A file that is already gone counts as removed.
    pub async fn remove(mut self) -> std::io::Result<()> {
        if !self.owned {
            return Ok(());
        }
        self.owned = false;
        match tokio::fs::remove_file(&self.path).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.owned {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Materializes inbound byte streams into scratch files.
#[derive(Debug, Clone)]
pub struct StagingStore {
    dir: PathBuf,
    suffix: String,
}

impl StagingStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            suffix: ".mp4".to_string(),
        }
    }

    /// Extension given to scratch file names (default `.mp4`).
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Copies `reader` into a new scratch file, failing with `SizeExceeded`
    /// once more than `max_bytes` arrive.
    pub async fn stage<R>(&self, reader: R, max_bytes: u64) -> Result<StagedFile, PipelineError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let temp = tempfile::Builder::new()
            .prefix("tubely-upload-")
            .suffix(&self.suffix)
            .tempfile_in(&self.dir)?;
        let (std_file, temp_path) = temp.into_parts();
        let path = temp_path
            .keep()
            .map_err(|e| PipelineError::IoFault(e.error))?;
        let staged = StagedFile::owned(path);

        let mut file = File::from_std(std_file);
        let mut limited = reader.take(max_bytes.saturating_add(1));
        let copied = tokio::io::copy(&mut limited, &mut file).await?;

        if copied > max_bytes {
            tracing::warn!(limit = max_bytes, "Upload exceeded size ceiling while staging");
            return Err(PipelineError::SizeExceeded { limit: max_bytes });
        }

        file.flush().await?;
        tracing::debug!(path = %staged.path().display(), bytes = copied, "Upload staged");

        Ok(staged)
    }
}
