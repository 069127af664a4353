mod config;

use std::{num::NonZeroU32, path::PathBuf, str::FromStr, sync::Arc};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use ripper::{
    manifest::manifest_url, merge::RipperMuxer, report::TracingReporter, CancellationToken,
    HttpClient, RipJobBuilder, RipperConfig,
};

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
enum MuxerKind {
    /// ffmpeg if it is on PATH, mkvmerge otherwise
    #[default]
    Auto,
    Ffmpeg,
    Mkvmerge,
}

impl From<MuxerKind> for RipperMuxer {
    fn from(kind: MuxerKind) -> Self {
        match kind {
            MuxerKind::Auto => RipperMuxer::auto(),
            MuxerKind::Ffmpeg => RipperMuxer::ffmpeg(),
            MuxerKind::Mkvmerge => RipperMuxer::mkvmerge(),
        }
    }
}

/// Download a segmented clip and mux its best video and audio renditions.
#[derive(Parser, Debug, Clone)]
#[clap(name = "ripper", version)]
pub struct RipperArgs {
    /// Debug output
    #[clap(long, alias = "debug")]
    verbose: bool,

    /// TOML config file. Command line options take precedence over it.
    #[clap(long, env = "RIPPER_CONFIG")]
    config: Option<PathBuf>,

    /// Segment downloads in flight per rendition [default: 5]
    #[clap(long, env = "RIPPER_CONCURRENCY")]
    concurrency: Option<NonZeroU32>,

    /// Attempts per segment before giving up [default: 5]
    #[clap(long, env = "RIPPER_RETRIES")]
    retries: Option<u32>,

    /// Delay between two attempts, in milliseconds [default: 500]
    #[clap(long, env = "RIPPER_RETRY_DELAY")]
    retry_delay: Option<u64>,

    /// HTTP request timeout, in seconds [default: 30]
    #[clap(long, env = "RIPPER_TIMEOUT")]
    timeout: Option<u64>,

    /// Keep downloaded segments after reassembly
    #[clap(long, env = "RIPPER_KEEP_SEGMENTS")]
    keep_segments: bool,

    /// Directory for temporary files and the output [default: .]
    #[clap(long, env = "RIPPER_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Tool used to combine video and audio
    #[clap(long, value_enum, default_value_t, env = "RIPPER_MUXER")]
    muxer: MuxerKind,

    /// Cookies sent to the manifest host, separated by `;`
    #[clap(long, env = "RIPPER_COOKIES")]
    cookies: Option<String>,

    /// HTTP Header used to download
    ///
    /// Custom header. eg. "Referer: https://example.com/".
    #[clap(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Manifest url
    manifest: String,

    /// Output file, `.mp4` is appended if it has no extension
    output: PathBuf,
}

impl RipperArgs {
    fn config(&self) -> anyhow::Result<RipperConfig> {
        let mut config = config::load(self.config.as_deref())?;
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(retries) = self.retries {
            config.max_attempts = retries;
        }
        if let Some(retry_delay) = self.retry_delay {
            config.retry_delay_ms = retry_delay;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }
        config.keep_segments |= self.keep_segments;
        Ok(config)
    }

    fn client(&self, config: &RipperConfig) -> anyhow::Result<HttpClient> {
        let mut headers = HeaderMap::new();
        for header in &self.headers {
            let (key, value) = header
                .split_once(':')
                .with_context(|| format!("Invalid header: {header}"))?;
            headers.insert(
                HeaderName::from_str(key.trim())
                    .with_context(|| format!("Invalid header name: {key}"))?,
                HeaderValue::from_str(value.trim())
                    .with_context(|| format!("Invalid header value: {value}"))?,
            );
        }

        let client = HttpClient::with_options(config.timeout(), headers)?;
        if let Some(cookies) = &self.cookies {
            let cookies = cookies
                .split(';')
                .map(str::trim)
                .filter(|cookie| !cookie.is_empty())
                .map(str::to_string)
                .collect();
            client.add_cookies(cookies, manifest_url(&self.manifest)?)?;
        }
        Ok(client)
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing_subscriber::filter::LevelFilter::DEBUG
    } else {
        tracing_subscriber::filter::LevelFilter::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// The first Ctrl-C cancels the job, the second one exits immediately.
fn spawn_ctrlc_handler(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::info!("Ctrl-C received, stopping downloader.");
        token.cancel();

        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::info!("Ctrl-C received again, force exit.");
        std::process::exit(1);
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = RipperArgs::parse();
    init_logging(args.verbose);

    let config = args.config()?;
    let client = args.client(&config)?;

    let token = CancellationToken::new();
    spawn_ctrlc_handler(token.clone());

    let job = RipJobBuilder::new()
        .config(config)
        .client(client)
        .muxer(RipperMuxer::from(args.muxer))
        .token(token)
        .reporter(Arc::new(TracingReporter))
        .build()?;

    job.run(&args.manifest, &args.output).await?;
    Ok(())
}
