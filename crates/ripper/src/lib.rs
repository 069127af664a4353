pub mod config;
pub mod download;
pub mod error;
pub mod fetch;
pub mod job;
pub mod manifest;
pub mod merge;
pub mod pipeline;
pub mod reassemble;
pub mod report;
pub mod task;
mod util;

/// ┌──────────────┐   best video   ┌──────────────────────┐   clip.m4v
/// │              ├────────────────►  RenditionPipeline   ├─────────────┐
/// │              │                │  [Semaphore x K]     │             │
/// │   Manifest   │                └──────────────────────┘       ┌─────▼─────┐
/// │  (base64     │                                               │   Muxer   ├──► output.mp4
/// │   init=1)    │   best audio   ┌──────────────────────┐       └─────▲─────┘
/// │              ├────────────────►  RenditionPipeline   ├─────────────┘
/// └──────────────┘                │  [Semaphore x K]     │   clip.m4a
///                                 └──────────────────────┘
pub use job::{RipJob, RipJobBuilder};

pub use config::RipperConfig;
pub use error::{RipperError, RipperResult};
pub use manifest::{Manifest, MediaType, Rendition, Segment};
pub use util::{http::HttpClient, path::RipperPathExt};

// re-export
pub use reqwest;
pub use tokio_util::sync::CancellationToken;
