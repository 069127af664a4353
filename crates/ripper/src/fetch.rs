use std::{
    future::Future,
    path::{Path, PathBuf},
    time::Duration,
};

use bytes::Bytes;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::util::http::HttpClient;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("{url}: gave up after {attempts} attempt(s): {source}")]
    ExhaustedRetries {
        url: Url,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Fetch cancelled")]
    Cancelled,
}

/// Why a single attempt failed.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Status(reqwest::StatusCode),

    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

/// Something that can bring one segment to disk.
pub trait SegmentFetch: Send + Sync + 'static {
    /// Download `url` into `destination`, returning the number of bytes written.
    ///
    /// Implementations must not leave a file at `destination` unless it is complete,
    /// and must return [FetchError::Cancelled] promptly once `token` is cancelled.
    fn fetch(
        &self,
        url: &Url,
        destination: &Path,
        token: &CancellationToken,
    ) -> impl Future<Output = Result<u64, FetchError>> + Send;
}

pub struct HttpSegmentFetcher {
    client: HttpClient,
    max_attempts: u32,
    retry_delay: Duration,
}

impl HttpSegmentFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            max_attempts: 5,
            retry_delay: Duration::from_millis(500),
        }
    }

    /// Total number of requests made for one segment, at least 1.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    async fn get(&self, url: &Url) -> Result<Bytes, TransportError> {
        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status()));
        }
        Ok(response.bytes().await?)
    }

    async fn download(&self, url: &Url, token: &CancellationToken) -> Result<Bytes, FetchError> {
        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            if token.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            // dropping the request future aborts the connection
            let result = tokio::select! {
                _ = token.cancelled() => return Err(FetchError::Cancelled),
                result = self.get(url) => result,
            };

            match result {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    if attempt < self.max_attempts {
                        tracing::warn!(
                            "Fetching {url} failed ({attempt}/{}), retry later. {e}",
                            self.max_attempts
                        );
                        if !self.retry_delay.is_zero() {
                            tokio::select! {
                                _ = token.cancelled() => return Err(FetchError::Cancelled),
                                _ = tokio::time::sleep(self.retry_delay) => {}
                            }
                        }
                    }
                    last_error = Some(e);
                }
            }
        }

        let source = match last_error {
            Some(e) => e,
            None => return Err(FetchError::Cancelled),
        };
        tracing::error!("Fetching {url} failed, max retries exceed. {source}");
        Err(FetchError::ExhaustedRetries {
            url: url.clone(),
            attempts: self.max_attempts,
            source,
        })
    }
}

impl SegmentFetch for HttpSegmentFetcher {
    async fn fetch(
        &self,
        url: &Url,
        destination: &Path,
        token: &CancellationToken,
    ) -> Result<u64, FetchError> {
        let bytes = self.download(url, token).await?;
        write_atomic(destination, &bytes)
            .await
            .map_err(|source| FetchError::Io {
                path: destination.to_path_buf(),
                source,
            })?;
        tracing::debug!("{} bytes written to {}", bytes.len(), destination.display());
        Ok(bytes.len() as u64)
    }
}

/// Write `data` to `path` so that `path` either holds all of it or does not exist.
///
/// Data goes to a hidden temporary file next to `path` first, which is synced
/// and then renamed over `path`. The temporary file is removed on every error path.
/// Creating and renaming the temporary file block, so both run on the blocking pool.
pub async fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&parent).await?;

    let (file, temp_path) = tokio::task::spawn_blocking(move || {
        tempfile::Builder::new()
            .prefix(".ripper")
            .suffix(".part")
            .tempfile_in(&parent)
            .map(tempfile::NamedTempFile::into_parts)
    })
    .await
    .map_err(std::io::Error::other)??;

    let mut file = tokio::fs::File::from_std(file);
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);

    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || temp_path.persist(path).map_err(|e| e.error))
        .await
        .map_err(std::io::Error::other)??;
    Ok(())
}
