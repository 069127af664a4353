mod ffmpeg;
mod mkvmerge;

pub use ffmpeg::FfmpegMuxer;
pub use mkvmerge::MkvMergeMuxer;

use std::{
    ffi::OsStr,
    future::Future,
    path::{Path, PathBuf},
    process::Stdio,
};

use tokio::process::Command;

use crate::error::{RipperError, RipperResult};

/// Combines a reassembled video track and audio track into one container.
pub trait Muxer: Send + Sync {
    /// Stream-copy `video` and `audio` into `output`.
    ///
    /// Both inputs must be complete. Nothing is re-encoded.
    fn mux(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
    ) -> impl Future<Output = RipperResult<()>> + Send;
}

/// Uses ffmpeg when it can be found on `PATH`, mkvmerge otherwise.
#[derive(Debug, Clone, Default)]
pub struct AutoMuxer;

impl Muxer for AutoMuxer {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> RipperResult<()> {
        match which::which("ffmpeg") {
            Ok(program) => FfmpegMuxer::with_program(program).mux(video, audio, output).await,
            Err(_) => {
                tracing::debug!("ffmpeg not found, falling back to mkvmerge");
                MkvMergeMuxer::default().mux(video, audio, output).await
            }
        }
    }
}

pub enum RipperMuxer {
    Auto(AutoMuxer),
    Ffmpeg(FfmpegMuxer),
    MkvMerge(MkvMergeMuxer),
}

impl RipperMuxer {
    pub fn auto() -> Self {
        Self::Auto(AutoMuxer)
    }

    pub fn ffmpeg() -> Self {
        Self::Ffmpeg(FfmpegMuxer::default())
    }

    pub fn mkvmerge() -> Self {
        Self::MkvMerge(MkvMergeMuxer::default())
    }
}

impl Default for RipperMuxer {
    fn default() -> Self {
        Self::auto()
    }
}

impl Muxer for RipperMuxer {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> RipperResult<()> {
        match self {
            Self::Auto(muxer) => muxer.mux(video, audio, output).await,
            Self::Ffmpeg(muxer) => muxer.mux(video, audio, output).await,
            Self::MkvMerge(muxer) => muxer.mux(video, audio, output).await,
        }
    }
}

/// Resolve `program` to an executable path. Paths are used as they are.
fn locate(program: &Path) -> RipperResult<PathBuf> {
    if program.components().count() > 1 {
        return Ok(program.to_path_buf());
    }
    Ok(which::which(program)?)
}

/// Run `command` to completion, treating any exit code outside `success` as a merge error.
async fn run_tool(mut command: Command, success: &[i32]) -> RipperResult<()> {
    let program = command.as_std().get_program().to_owned();
    let name = Path::new(&program)
        .file_name()
        .unwrap_or(OsStr::new("muxer"))
        .to_string_lossy()
        .to_string();

    tracing::debug!("Running {:?}", command.as_std());
    let output = command
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| RipperError::Merge(format!("failed to start {name}: {e}")))?;

    match output.status.code() {
        Some(code) if success.contains(&code) => {
            if code != 0 {
                tracing::warn!(
                    "{name} finished with warnings: {}",
                    String::from_utf8_lossy(&output.stdout).trim()
                );
            }
            Ok(())
        }
        _ => Err(RipperError::Merge(format!(
            "{name} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ))),
    }
}
