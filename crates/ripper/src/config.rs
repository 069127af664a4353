use std::{num::NonZeroU32, path::PathBuf, time::Duration};

use serde::Deserialize;

/// Tunables of a rip job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RipperConfig {
    /// Maximum number of segment fetches in flight per rendition.
    pub concurrency: NonZeroU32,
    /// Total requests made for one segment before giving up.
    pub max_attempts: u32,
    /// Pause between two attempts of the same segment.
    pub retry_delay_ms: u64,
    /// Timeout of a single HTTP request.
    pub timeout_secs: u64,
    /// Keep downloaded segments after reassembly.
    pub keep_segments: bool,
    /// Directory holding the intermediate files and the final output.
    pub output_dir: PathBuf,
}

impl RipperConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RipperConfig {
    fn default() -> Self {
        Self {
            concurrency: NonZeroU32::new(5).unwrap_or(NonZeroU32::MIN),
            max_attempts: 5,
            retry_delay_ms: 500,
            timeout_secs: 30,
            keep_segments: false,
            output_dir: PathBuf::from("."),
        }
    }
}
