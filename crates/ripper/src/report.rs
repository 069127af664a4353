use std::path::Path;

use crate::{manifest::MediaType, pipeline::PipelineStage};

/// Receiver of progress events.
///
/// Components get a reporter handed in explicitly instead of writing to a
/// global console. Every method has an empty default.
pub trait Reporter: Send + Sync {
    fn stage(&self, _media: MediaType, _stage: PipelineStage) {}

    /// A segment reached a terminal state. `done` counts both successes and failures.
    fn segment_finished(&self, _media: MediaType, _done: usize, _total: usize, _ok: bool) {}

    fn merging(&self, _output: &Path) {}

    /// A non-fatal problem, e.g. a temporary directory that could not be removed.
    fn warning(&self, _message: &str) {}
}

/// Reports everything through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn stage(&self, media: MediaType, stage: PipelineStage) {
        tracing::info!("[{media}] {stage:?}");
    }

    fn segment_finished(&self, media: MediaType, done: usize, total: usize, ok: bool) {
        let percentage = if total == 0 {
            0.
        } else {
            done as f32 / total as f32 * 100.
        };
        if ok {
            tracing::info!("[{media}] {done} / {total} segments ({percentage:.2}%)");
        } else {
            tracing::error!("[{media}] segment failed ({done} / {total})");
        }
    }

    fn merging(&self, output: &Path) {
        tracing::info!("Merging tracks into {}", output.display());
    }

    fn warning(&self, message: &str) {
        tracing::warn!("{message}");
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl Reporter for SilentReporter {}
