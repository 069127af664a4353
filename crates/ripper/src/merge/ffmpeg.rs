use std::path::{Path, PathBuf};

use tokio::process::Command;

use super::{locate, run_tool, Muxer};
use crate::error::RipperResult;

/// Muxes with the ffmpeg CLI, mapping every stream of both inputs and copying codecs.
#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    program: PathBuf,
}

impl FfmpegMuxer {
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfmpegMuxer {
    fn default() -> Self {
        Self::with_program("ffmpeg")
    }
}

impl Muxer for FfmpegMuxer {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> RipperResult<()> {
        tracing::debug!("Muxing with ffmpeg CLI...");

        let mut command = Command::new(locate(&self.program)?);
        command
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .arg("-i")
            .arg(video)
            .arg("-i")
            .arg(audio)
            .args(["-map", "0", "-map", "1", "-c", "copy"])
            .arg(output);

        run_tool(command, &[0]).await
    }
}
