use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use url::Url;

/// File name of a downloaded segment.
///
/// The zero padded sequence keeps every name distinct and sortable; the tail
/// of the url is only there to make the cache directory readable.
pub fn segment_file_name(sequence: usize, url: &Url) -> String {
    let name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .unwrap_or("segment");
    let name: String = name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect();
    format!("{sequence:06}_{name}")
}

pub fn segment_path<P>(sequence: usize, url: &Url, cwd: P) -> PathBuf
where
    P: AsRef<Path>,
{
    cwd.as_ref().join(segment_file_name(sequence, url))
}

/// Extensions muxers can pick a container from.
const CONTAINER_EXTENSIONS: &[&str] = &["mp4", "m4v", "mov", "mkv", "webm", "ts"];

pub trait RipperPathExt {
    /// Append `.{ext}` unless the path already ends with a container extension.
    ///
    /// Anything else after the last dot is part of the name, so `Episode 1.5`
    /// becomes `Episode 1.5.mp4`.
    fn ensure_extension<T: AsRef<OsStr>>(&mut self, ext: T);
}

impl RipperPathExt for PathBuf {
    fn ensure_extension<T: AsRef<OsStr>>(&mut self, ext: T) {
        let is_container = self
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|e| CONTAINER_EXTENSIONS.iter().any(|c| c.eq_ignore_ascii_case(e)));
        if is_container {
            return;
        }

        let mut file_name = self.file_name().map(OsStr::to_os_string).unwrap_or_default();
        file_name.push(".");
        file_name.push(ext);
        self.set_file_name(file_name);
    }
}
