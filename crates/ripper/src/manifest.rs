use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use url::Url;

use crate::{
    error::{RipperError, RipperResult},
    util::http::HttpClient,
};

/// Query pair asking the server to inline init segments as base64.
const BASE64_INIT_QUERY: (&str, &str) = ("base64_init", "1");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Video,
    Audio,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }

    /// Extension of the reassembled intermediate file.
    pub fn as_ext(&self) -> &'static str {
        match self {
            Self::Video => "m4v",
            Self::Audio => "m4a",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Segment {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Rendition {
    pub base_url: String,
    /// Base64 encoded container initialization data.
    #[serde(default)]
    pub init_segment: String,
    pub segments: Vec<Segment>,
    pub bitrate: u64,
}

impl Rendition {
    /// Decoded init segment, `None` when the manifest carries none.
    pub fn init_segment(&self, media: MediaType) -> RipperResult<Option<Vec<u8>>> {
        if self.init_segment.is_empty() {
            return Ok(None);
        }

        STANDARD
            .decode(self.init_segment.as_bytes())
            .map(Some)
            .map_err(|source| RipperError::InitSegment { media, source })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub clip_id: String,
    pub base_url: String,
    #[serde(default)]
    pub video: Vec<Rendition>,
    #[serde(default)]
    pub audio: Vec<Rendition>,
}

impl Manifest {
    pub fn from_slice(data: &[u8]) -> RipperResult<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn renditions(&self, media: MediaType) -> &[Rendition] {
        match media {
            MediaType::Video => &self.video,
            MediaType::Audio => &self.audio,
        }
    }

    /// The rendition with the highest bitrate. Ties keep the first listed.
    pub fn best_rendition(&self, media: MediaType) -> RipperResult<&Rendition> {
        self.renditions(media)
            .iter()
            .reduce(|best, r| if r.bitrate > best.bitrate { r } else { best })
            .ok_or(RipperError::NoRendition(media))
    }
}

/// Normalize the manifest url, making sure init segments are requested inline.
pub fn manifest_url(url: &str) -> RipperResult<Url> {
    let mut url = Url::parse(url).map_err(|source| RipperError::InvalidManifestUrl {
        url: url.to_string(),
        source,
    })?;

    let (key, value) = BASE64_INIT_QUERY;
    if !url.query_pairs().any(|(k, _)| k == key) {
        url.query_pairs_mut().append_pair(key, value);
    }
    Ok(url)
}

/// Download and decode the manifest at `url`.
///
/// Returns the parsed manifest together with the url it was requested from,
/// which is the root for resolving every relative url inside it.
pub async fn fetch_manifest(client: &HttpClient, url: &str) -> RipperResult<(Manifest, Url)> {
    let url = manifest_url(url)?;
    tracing::debug!("Fetching manifest from {url}");

    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(RipperError::ManifestFetch)?;
    if !response.status().is_success() {
        return Err(RipperError::ManifestStatus(response.status()));
    }

    let body = response.bytes().await.map_err(RipperError::ManifestFetch)?;
    let manifest = Manifest::from_slice(&body)?;
    tracing::info!(
        "Manifest {} loaded: {} video / {} audio renditions",
        manifest.clip_id,
        manifest.video.len(),
        manifest.audio.len()
    );

    Ok((manifest, url))
}
