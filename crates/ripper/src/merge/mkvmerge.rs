use std::path::{Path, PathBuf};

use tokio::process::Command;

use super::{locate, run_tool, Muxer};
use crate::error::RipperResult;

#[derive(Debug, Clone)]
pub struct MkvMergeMuxer {
    program: PathBuf,
}

impl MkvMergeMuxer {
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for MkvMergeMuxer {
    fn default() -> Self {
        Self::with_program("mkvmerge")
    }
}

impl Muxer for MkvMergeMuxer {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> RipperResult<()> {
        tracing::debug!("Muxing with mkvmerge...");

        let mut command = Command::new(locate(&self.program)?);
        command.arg("-q").arg("-o").arg(output).arg(video).arg(audio);

        // mkvmerge exits with 1 when it only emitted warnings
        run_tool(command, &[0, 1]).await
    }
}
