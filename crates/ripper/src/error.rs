use std::path::PathBuf;

use thiserror::Error;

use crate::{fetch::FetchError, manifest::MediaType};

/// A segment that did not make it to disk.
#[derive(Debug)]
pub struct SegmentFailure {
    pub sequence: usize,
    pub destination: PathBuf,
    pub error: FetchError,
}

#[derive(Error, Debug)]
pub enum RipperError {
    #[error("Invalid manifest url {url}: {source}")]
    InvalidManifestUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to fetch manifest: {0}")]
    ManifestFetch(#[source] reqwest::Error),

    #[error("Manifest request failed with HTTP status {0}")]
    ManifestStatus(reqwest::StatusCode),

    #[error("Failed to decode manifest: {0}")]
    ManifestDecode(#[from] serde_json::Error),

    #[error("Invalid clip id {0:?}")]
    InvalidClipId(String),

    #[error("No {0} rendition found in manifest")]
    NoRendition(MediaType),

    #[error("Invalid {media} init segment: {source}")]
    InitSegment {
        media: MediaType,
        #[source]
        source: base64::DecodeError,
    },

    #[error("{} of {total} {media} segments failed to download", failures.len())]
    SegmentFetch {
        media: MediaType,
        total: usize,
        failures: Vec<SegmentFailure>,
    },

    #[error("{media} segments {missing:?} missing from a finished batch")]
    IncompleteBatch { media: MediaType, missing: Vec<usize> },

    #[error("Failed to reassemble {}: {source}", path.display())]
    Reassembly {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Merge error: {0}")]
    Merge(String),

    #[error(transparent)]
    MissingExecutable(#[from] which::Error),

    #[error("Download cancelled")]
    Cancelled,

    #[error("Download worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    #[error(transparent)]
    RequestError(#[from] reqwest::Error),
}

pub type RipperResult<T> = Result<T, RipperError>;
