use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::session::EncodedArtifact;

/// The download step: takes ownership of a finished artifact and saves it
#[async_trait::async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Save the artifact and return where it went
    async fn save(&self, artifact: EncodedArtifact) -> Result<PathBuf>;
}

/// Writes artifacts into a directory under their generated file name
pub struct FileSink {
    output_dir: PathBuf,
}

impl FileSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[async_trait::async_trait]
impl ArtifactSink for FileSink {
    async fn save(&self, artifact: EncodedArtifact) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .with_context(|| format!("Failed to create output directory: {:?}", self.output_dir))?;

        let path = self.output_dir.join(artifact.file_name());
        tokio::fs::write(&path, artifact.data())
            .await
            .with_context(|| format!("Failed to write recording: {:?}", path))?;

        info!("Saved recording to {:?} ({})", path, artifact.size_label());

        Ok(path)
    }
}
