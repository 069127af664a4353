use url::Url;

use crate::{error::RipperResult, manifest::Segment};

/// Base url of a rendition.
///
/// The rendition base is relative to the manifest base, which itself is
/// relative to the location the manifest was fetched from. Each step is a
/// plain RFC 3986 reference resolution, so absolute references at any level
/// replace everything before them.
pub fn rendition_base_url(
    manifest_url: &Url,
    manifest_base: &str,
    rendition_base: &str,
) -> RipperResult<Url> {
    Ok(manifest_url.join(manifest_base)?.join(rendition_base)?)
}

/// Absolute urls of `segments`, in manifest order.
pub fn resolve_segment_urls(base: &Url, segments: &[Segment]) -> RipperResult<Vec<Url>> {
    segments
        .iter()
        .map(|segment| Ok(base.join(&segment.url)?))
        .collect()
}
