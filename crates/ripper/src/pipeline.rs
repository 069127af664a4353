use std::{
    num::NonZeroU32,
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
    download::{DownloadScheduler, DownloadTask},
    error::{RipperError, RipperResult, SegmentFailure},
    fetch::SegmentFetch,
    manifest::{MediaType, Rendition},
    reassemble::{ordered_paths, StreamReassembler},
    report::{Reporter, SilentReporter},
    util::{path::segment_path, url::resolve_segment_urls},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    ResolveUrls,
    Download,
    Reassemble,
    Cleanup,
    Done,
    Failed,
}

/// Where a rendition is downloaded to and reassembled into.
#[derive(Debug, Clone)]
pub struct RenditionTarget {
    /// Absolute base url of the rendition's segments.
    pub base_url: Url,
    /// Temporary directory holding the downloaded segments.
    pub segments_dir: PathBuf,
    /// Reassembled output file.
    pub output: PathBuf,
}

/// Downloads one rendition and reassembles it into a single file.
///
/// `ResolveUrls -> Download -> Reassemble -> Cleanup -> Done`. Any error moves
/// the pipeline to `Failed` and is returned; a failure while cleaning up is
/// only reported as a warning.
pub struct RenditionPipeline<F> {
    media: MediaType,
    fetcher: Arc<F>,
    concurrency: NonZeroU32,
    keep_segments: bool,
    token: CancellationToken,
    reporter: Arc<dyn Reporter>,
}

impl<F> RenditionPipeline<F>
where
    F: SegmentFetch,
{
    pub fn new(media: MediaType, fetcher: Arc<F>) -> Self {
        Self {
            media,
            fetcher,
            concurrency: NonZeroU32::new(5).unwrap_or(NonZeroU32::MIN),
            keep_segments: false,
            token: CancellationToken::new(),
            reporter: Arc::new(SilentReporter),
        }
    }

    pub fn concurrency(mut self, concurrency: NonZeroU32) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn keep_segments(mut self, keep_segments: bool) -> Self {
        self.keep_segments = keep_segments;
        self
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub async fn run(
        &self,
        rendition: &Rendition,
        target: &RenditionTarget,
    ) -> RipperResult<PathBuf> {
        match self.run_stages(rendition, target).await {
            Ok(()) => {
                self.enter(PipelineStage::Done);
                Ok(target.output.clone())
            }
            Err(e) => {
                self.enter(PipelineStage::Failed);
                tracing::error!("Processing {} failed: {e}", self.media);
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        rendition: &Rendition,
        target: &RenditionTarget,
    ) -> RipperResult<()> {
        let media = self.media;

        self.enter(PipelineStage::ResolveUrls);
        let init = rendition.init_segment(media)?;
        let tasks: Vec<_> = resolve_segment_urls(&target.base_url, &rendition.segments)?
            .into_iter()
            .enumerate()
            .map(|(sequence, url)| DownloadTask {
                destination: segment_path(sequence, &url, &target.segments_dir),
                url,
                sequence,
            })
            .collect();
        let total = tasks.len();
        tokio::fs::create_dir_all(&target.segments_dir).await?;

        self.enter(PipelineStage::Download);
        let scheduler = DownloadScheduler::new(media, self.concurrency)
            .with_token(self.token.clone())
            .with_reporter(self.reporter.clone());
        let results = scheduler.run(self.fetcher.clone(), tasks).await?;

        let (succeeded, failed): (Vec<_>, Vec<_>) =
            results.into_iter().partition(|result| result.is_success());
        if !failed.is_empty() {
            let failures = failed
                .into_iter()
                .filter_map(|result| match result.outcome {
                    Err(error) => Some(SegmentFailure {
                        sequence: result.sequence,
                        destination: result.destination,
                        error,
                    }),
                    Ok(_) => None,
                })
                .collect();
            return Err(RipperError::SegmentFetch {
                media,
                total,
                failures,
            });
        }

        let paths = ordered_paths(
            total,
            succeeded
                .into_iter()
                .map(|result| (result.sequence, result.destination)),
        )
        .map_err(|missing| RipperError::IncompleteBatch { media, missing })?;

        self.enter(PipelineStage::Reassemble);
        StreamReassembler::new(self.keep_segments)
            .reassemble(init.as_deref(), &paths, &target.output)
            .await?;

        self.enter(PipelineStage::Cleanup);
        if !self.keep_segments {
            self.remove_segments_dir(&target.segments_dir).await;
        }

        Ok(())
    }

    async fn remove_segments_dir(&self, dir: &Path) {
        if let Err(e) = tokio::fs::remove_dir_all(dir).await {
            self.reporter.warning(&format!(
                "Failed to remove {} segment directory {}: {e}",
                self.media,
                dir.display()
            ));
        }
    }

    fn enter(&self, stage: PipelineStage) {
        tracing::debug!("{} pipeline entered {stage:?}", self.media);
        self.reporter.stage(self.media, stage);
    }
}
