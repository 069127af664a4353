use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use reqwest::header::HeaderMap;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
    config::RipperConfig,
    error::{RipperError, RipperResult},
    fetch::{HttpSegmentFetcher, SegmentFetch},
    manifest::{fetch_manifest, Manifest, MediaType},
    merge::{Muxer, RipperMuxer},
    pipeline::{RenditionPipeline, RenditionTarget},
    report::{Reporter, TracingReporter},
    util::{http::HttpClient, path::RipperPathExt, url::rendition_base_url},
};

pub struct RipJobBuilder<M = RipperMuxer> {
    config: RipperConfig,
    client: Option<HttpClient>,
    muxer: M,
    token: CancellationToken,
    reporter: Arc<dyn Reporter>,
}

impl RipJobBuilder {
    pub fn new() -> Self {
        Self {
            config: RipperConfig::default(),
            client: None,
            muxer: RipperMuxer::default(),
            token: CancellationToken::new(),
            reporter: Arc::new(TracingReporter),
        }
    }
}

impl Default for RipJobBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> RipJobBuilder<M>
where
    M: Muxer,
{
    pub fn config(mut self, config: RipperConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a preconfigured client instead of building one from the config.
    pub fn client(mut self, client: HttpClient) -> Self {
        self.client = Some(client);
        self
    }

    pub fn muxer<M2>(self, muxer: M2) -> RipJobBuilder<M2>
    where
        M2: Muxer,
    {
        RipJobBuilder {
            config: self.config,
            client: self.client,
            muxer,
            token: self.token,
            reporter: self.reporter,
        }
    }

    /// Cancelling `token` aborts both renditions and the merge.
    pub fn token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn build(mut self) -> RipperResult<RipJob<HttpSegmentFetcher, M>> {
        let client = match self.client.take() {
            Some(client) => client,
            None => HttpClient::with_options(self.config.timeout(), HeaderMap::new())?,
        };
        let fetcher = HttpSegmentFetcher::new(client.clone())
            .max_attempts(self.config.max_attempts)
            .retry_delay(self.config.retry_delay());

        Ok(self.build_with_fetcher(client, fetcher))
    }

    /// Build a job that downloads segments through `fetcher`.
    /// `client` is still used for the manifest.
    pub fn build_with_fetcher<F>(self, client: HttpClient, fetcher: F) -> RipJob<F, M>
    where
        F: SegmentFetch,
    {
        RipJob {
            client,
            fetcher: Arc::new(fetcher),
            muxer: self.muxer,
            config: self.config,
            token: self.token,
            reporter: self.reporter,
        }
    }
}

/// Rips one clip: fetch the manifest, download and reassemble the best video
/// and audio renditions side by side, then mux them into the output file.
pub struct RipJob<F = HttpSegmentFetcher, M = RipperMuxer> {
    client: HttpClient,
    fetcher: Arc<F>,
    muxer: M,
    config: RipperConfig,
    token: CancellationToken,
    reporter: Arc<dyn Reporter>,
}

impl<F, M> RipJob<F, M>
where
    F: SegmentFetch,
    M: Muxer,
{
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Rip the clip described by the manifest at `manifest_url` into `output`.
    ///
    /// `output` is relative to the configured output directory and gets an
    /// `.mp4` extension unless it already names a container. Returns the path of the muxed file.
    pub async fn run(
        &self,
        manifest_url: &str,
        output: impl AsRef<Path>,
    ) -> RipperResult<PathBuf> {
        let (manifest, manifest_url) = fetch_manifest(&self.client, manifest_url).await?;
        self.run_manifest(&manifest, &manifest_url, output).await
    }

    /// Same as [RipJob::run] for a manifest that was already fetched from `manifest_url`.
    pub async fn run_manifest(
        &self,
        manifest: &Manifest,
        manifest_url: &Url,
        output: impl AsRef<Path>,
    ) -> RipperResult<PathBuf> {
        let clip_id = validate_clip_id(&manifest.clip_id)?;
        let output_dir = &self.config.output_dir;
        let mut output = output_dir.join(output);
        output.ensure_extension("mp4");

        let video = manifest.best_rendition(MediaType::Video)?;
        let audio = manifest.best_rendition(MediaType::Audio)?;
        tracing::info!(
            "Selected renditions of {clip_id}: video {} bps, audio {} bps",
            video.bitrate,
            audio.bitrate
        );

        let clip_dir = output_dir.join(clip_id);
        let target = |media: MediaType, rendition_base: &str| -> RipperResult<RenditionTarget> {
            Ok(RenditionTarget {
                base_url: rendition_base_url(manifest_url, &manifest.base_url, rendition_base)?,
                segments_dir: clip_dir.join(media.as_str()),
                output: output_dir.join(format!("{clip_id}.{}", media.as_ext())),
            })
        };
        let video_target = target(MediaType::Video, &video.base_url)?;
        let audio_target = target(MediaType::Audio, &audio.base_url)?;

        let video_pipeline = self.pipeline(MediaType::Video);
        let audio_pipeline = self.pipeline(MediaType::Audio);
        let (video_result, audio_result) = tokio::join!(
            video_pipeline.run(video, &video_target),
            audio_pipeline.run(audio, &audio_target),
        );
        let (video_file, audio_file) = match (video_result, audio_result) {
            (Ok(video), Ok(audio)) => (video, audio),
            (Err(e), Ok(_)) | (Ok(_), Err(e)) => return Err(e),
            (Err(video_error), Err(audio_error)) => {
                tracing::error!("Audio failed as well: {audio_error}");
                return Err(video_error);
            }
        };

        if !self.config.keep_segments {
            if let Err(e) = tokio::fs::remove_dir(&clip_dir).await {
                self.warn(format!(
                    "Failed to remove temporary directory {}: {e}",
                    clip_dir.display()
                ));
            }
        }

        if self.token.is_cancelled() {
            return Err(RipperError::Cancelled);
        }
        self.reporter.merging(&output);
        tokio::select! {
            _ = self.token.cancelled() => return Err(RipperError::Cancelled),
            result = self.muxer.mux(&video_file, &audio_file, &output) => result?,
        }

        for intermediate in [&video_file, &audio_file] {
            if let Err(e) = tokio::fs::remove_file(intermediate).await {
                self.warn(format!(
                    "Failed to remove intermediate file {}: {e}",
                    intermediate.display()
                ));
            }
        }

        tracing::info!(
            "All finished. Please checkout your files at {}",
            output.display()
        );
        Ok(output)
    }

    fn pipeline(&self, media: MediaType) -> RenditionPipeline<F> {
        RenditionPipeline::new(media, self.fetcher.clone())
            .concurrency(self.config.concurrency)
            .keep_segments(self.config.keep_segments)
            .with_token(self.token.clone())
            .with_reporter(self.reporter.clone())
    }

    fn warn(&self, message: String) {
        self.reporter.warning(&message);
    }
}

/// The clip id names files and directories, so it must be a single plain path component.
fn validate_clip_id(clip_id: &str) -> RipperResult<&str> {
    let mut components = Path::new(clip_id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(clip_id),
        _ => Err(RipperError::InvalidClipId(clip_id.to_string())),
    }
}
