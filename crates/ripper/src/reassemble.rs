use std::path::{Path, PathBuf};

use tokio::{
    fs::File,
    io::{AsyncWriteExt, BufWriter},
};

use crate::error::{RipperError, RipperResult};

/// Concatenates an init payload and downloaded segments into one file.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamReassembler {
    /// Keep segment files after they were appended.
    keep_segments: bool,
}

impl StreamReassembler {
    pub fn new(keep_segments: bool) -> Self {
        Self { keep_segments }
    }

    /// Write `init` followed by every file of `segments` into `destination`.
    ///
    /// `segments` must already be in manifest order; no sorting happens here.
    /// Each segment file is removed right after it was appended, unless
    /// `keep_segments` is set. On error `destination` is left partially
    /// written and must be discarded by the caller.
    ///
    /// Returns the number of bytes written.
    pub async fn reassemble<P>(
        &self,
        init: Option<&[u8]>,
        segments: &[P],
        destination: &Path,
    ) -> RipperResult<u64>
    where
        P: AsRef<Path>,
    {
        let on_output = |source| RipperError::Reassembly {
            path: destination.to_path_buf(),
            source,
        };

        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(on_output)?;
            }
        }

        let mut output = BufWriter::new(File::create(destination).await.map_err(on_output)?);
        let mut written = 0;

        if let Some(init) = init {
            output.write_all(init).await.map_err(on_output)?;
            written += init.len() as u64;
        }

        for segment in segments {
            let segment = segment.as_ref();
            let on_segment = |source| RipperError::Reassembly {
                path: segment.to_path_buf(),
                source,
            };

            let mut input = File::open(segment).await.map_err(on_segment)?;
            written += tokio::io::copy(&mut input, &mut output)
                .await
                .map_err(on_output)?;
            drop(input);

            if !self.keep_segments {
                tokio::fs::remove_file(segment).await.map_err(on_segment)?;
            }
            tracing::trace!("Appended {}", segment.display());
        }

        output.flush().await.map_err(on_output)?;
        output.get_ref().sync_all().await.map_err(on_output)?;

        tracing::debug!("{written} bytes reassembled into {}", destination.display());
        Ok(written)
    }
}

/// Ordered segment paths of a finished batch, or the indexes of the missing ones.
pub fn ordered_paths<I>(total: usize, paths: I) -> Result<Vec<PathBuf>, Vec<usize>>
where
    I: IntoIterator<Item = (usize, PathBuf)>,
{
    let mut slots: Vec<Option<PathBuf>> = vec![None; total];
    for (sequence, path) in paths {
        if let Some(slot) = slots.get_mut(sequence) {
            *slot = Some(path);
        }
    }

    let missing: Vec<_> = slots
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.is_none())
        .map(|(sequence, _)| sequence)
        .collect();
    if !missing.is_empty() {
        return Err(missing);
    }

    Ok(slots.into_iter().flatten().collect())
}
