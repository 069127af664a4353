use std::{
    num::NonZeroU32,
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use tokio::{sync::Semaphore, task::JoinSet};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
    error::{RipperError, RipperResult},
    fetch::{FetchError, SegmentFetch},
    manifest::MediaType,
    report::{Reporter, SilentReporter},
    task::AsyncTask,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub url: Url,
    pub destination: PathBuf,
    /// Position of the segment in the manifest.
    pub sequence: usize,
}

#[derive(Debug)]
pub struct DownloadResult {
    pub sequence: usize,
    pub destination: PathBuf,
    /// Bytes written on success.
    pub outcome: Result<u64, FetchError>,
}

impl DownloadResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Runs a batch of segment downloads with at most `concurrency` in flight.
pub struct DownloadScheduler {
    media: MediaType,
    concurrency: NonZeroU32,
    token: CancellationToken,
    reporter: Arc<dyn Reporter>,
}

impl DownloadScheduler {
    pub fn new(media: MediaType, concurrency: NonZeroU32) -> Self {
        Self {
            media,
            concurrency,
            token: CancellationToken::new(),
            reporter: Arc::new(SilentReporter),
        }
    }

    /// Cancelling `token` stops admission and cancels every running fetch.
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Download every task and wait until all of them reached a terminal state.
    ///
    /// Tasks are started in submission order. A failed segment does not stop
    /// its siblings, so the returned batch, sorted by sequence, may contain
    /// failures. If the scheduler was cancelled the whole batch is reported as
    /// [RipperError::Cancelled] once the running fetches have wound down.
    pub async fn run<F>(
        &self,
        fetcher: Arc<F>,
        tasks: Vec<DownloadTask>,
    ) -> RipperResult<Vec<DownloadResult>>
    where
        F: SegmentFetch,
    {
        let media = self.media;
        let total = tasks.len();
        tracing::info!(
            "Start downloading {total} {media} segments with {} thread(s).",
            self.concurrency.get()
        );

        let permits = Arc::new(Semaphore::new(self.concurrency.get() as usize));
        let finished = Arc::new(AtomicUsize::new(0));
        let mut workers = JoinSet::new();
        let mut results = Vec::with_capacity(total);

        for task in tasks {
            let async_task = AsyncTask::with_token(self.token.child_token());

            let permit = tokio::select! {
                biased;
                _ = self.token.cancelled() => None,
                permit = permits.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                // never started: Pending -> Finished
                async_task.cancel();
                async_task.start();
                results.push(DownloadResult {
                    sequence: task.sequence,
                    destination: task.destination,
                    outcome: Err(FetchError::Cancelled),
                });
                continue;
            };

            let fetcher = fetcher.clone();
            let reporter = self.reporter.clone();
            let finished = finished.clone();
            workers.spawn(async move {
                let DownloadTask {
                    url,
                    destination,
                    sequence,
                } = task;

                let (fetcher, url_ref, destination_ref) = (&fetcher, &url, &destination);
                let outcome = async_task
                    .run(move |token| async move {
                        fetcher.fetch(url_ref, destination_ref, &token).await
                    })
                    .await
                    .unwrap_or(Err(FetchError::Cancelled));

                // the semaphore only limits fetches, release it before reporting
                drop(permit);

                if !matches!(outcome, Err(FetchError::Cancelled)) {
                    let done = finished.fetch_add(1, Ordering::Relaxed) + 1;
                    reporter.segment_finished(media, done, total, outcome.is_ok());
                }

                DownloadResult {
                    sequence,
                    destination,
                    outcome,
                }
            });
        }

        // wait for all tasks to finish
        while let Some(result) = workers.join_next().await {
            results.push(result?);
        }

        if self.token.is_cancelled() {
            tracing::warn!("Downloading {media} segments cancelled.");
            return Err(RipperError::Cancelled);
        }

        results.sort_by_key(|result| result.sequence);

        let failed: Vec<_> = results.iter().filter(|r| !r.is_success()).collect();
        if !failed.is_empty() {
            tracing::error!("Failed to download {} {media} segments:", failed.len());
            for result in failed {
                tracing::error!("  - #{} {}", result.sequence, result.destination.display());
            }
        }

        Ok(results)
    }
}
