//! Review movie derivation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use shotvault_common::{Frame, Result};
use tokio_util::sync::CancellationToken;

use crate::command::ToolCommand;
use crate::tools::{ToolRegistry, FFMPEG};

/// A printf-style image sequence pattern and its first frame number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePattern {
    /// e.g. `/plates/GEN63_SC_48_SH_0160_main_plate_v001_%04d_f4448x3096.exr`
    pub pattern: PathBuf,
    pub start: Frame,
}

impl FramePattern {
    pub fn new(pattern: impl Into<PathBuf>, start: Frame) -> Self {
        Self {
            pattern: pattern.into(),
            start,
        }
    }
}

/// Encodes a frame sequence into a single review movie.
#[async_trait]
pub trait MovieDeriver: Send + Sync {
    async fn derive(
        &self,
        input: &FramePattern,
        output: &Path,
        fps: u32,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// [`MovieDeriver`] encoding 10-bit ProRes with `ffmpeg`.
#[derive(Debug, Clone)]
pub struct FfmpegMovieDeriver {
    registry: ToolRegistry,
}

impl FfmpegMovieDeriver {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// Arguments passed to ffmpeg, without the program itself.
    pub fn arguments(input: &FramePattern, output: &Path, fps: u32) -> Vec<String> {
        vec![
            "-y".into(),
            "-framerate".into(),
            fps.to_string(),
            "-start_number".into(),
            input.start.to_string(),
            "-i".into(),
            input.pattern.to_string_lossy().to_string(),
            "-c:v".into(),
            "prores_ks".into(),
            "-pix_fmt".into(),
            "yuv422p10le".into(),
            output.to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl MovieDeriver for FfmpegMovieDeriver {
    async fn derive(
        &self,
        input: &FramePattern,
        output: &Path,
        fps: u32,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let tool = self.registry.require(FFMPEG)?;

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tracing::info!(
            pattern = %input.pattern.display(),
            output = %output.display(),
            fps,
            "Generating review movie"
        );

        ToolCommand::new(tool.path.clone())
            .args(Self::arguments(input, output, fps))
            .timeout(tool.timeout)
            .cancel_on(cancel.clone())
            .execute()
            .await?;

        Ok(())
    }
}
