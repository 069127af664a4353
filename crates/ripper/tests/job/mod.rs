use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use ripper::{
    merge::Muxer,
    report::{Reporter, SilentReporter},
    HttpClient, MediaType, RipJobBuilder, RipperConfig, RipperError, RipperResult,
};
use serde_json::json;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use crate::{init_test_tracing, RipperMock};

/// Captures what it was asked to mux, then writes a marker as output.
#[derive(Default, Clone)]
struct RecordingMuxer {
    calls: Arc<Mutex<Vec<MuxCall>>>,
}

struct MuxCall {
    video: Vec<u8>,
    audio: Vec<u8>,
    output: PathBuf,
}

impl Muxer for RecordingMuxer {
    async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> RipperResult<()> {
        let call = MuxCall {
            video: tokio::fs::read(video).await?,
            audio: tokio::fs::read(audio).await?,
            output: output.to_path_buf(),
        };
        tokio::fs::write(output, b"muxed").await?;
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

#[derive(Default)]
struct WarningCollector {
    warnings: Mutex<Vec<String>>,
}

impl Reporter for WarningCollector {
    fn warning(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }
}

async fn mount_manifest(server: &MockServer, manifest: serde_json::Value) -> String {
    Mock::given(method("GET"))
        .and(path("/master.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(manifest))
        .expect(1)
        .mount(server)
        .await;
    format!("{}/master.json", server.uri())
}

fn config(output_dir: &Path) -> RipperConfig {
    RipperConfig {
        retry_delay_ms: 0,
        output_dir: output_dir.to_path_buf(),
        ..Default::default()
    }
}

#[tokio::test]
async fn rip_single_clip() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    let manifest_url = mount_manifest(
        &server,
        json!({
            "clip_id": "c1",
            "base_url": "clip/",
            "video": [{
                "base_url": "v/",
                "init_segment": "AAA=",
                "bitrate": 1000,
                "segments": [{ "url": "a" }, { "url": "b" }, { "url": "c" }]
            }],
            "audio": [{
                "base_url": "a/",
                "init_segment": "",
                "bitrate": 128,
                "segments": [{ "url": "x.m4s" }, { "url": "y.m4s" }]
            }]
        }),
    )
    .await;
    server
        .mock_segment("/clip/v/a", b"A", Some(1))
        .await
        .mock_segment("/clip/v/b", b"BB", Some(1))
        .await
        .mock_segment("/clip/v/c", b"CCC", Some(1))
        .await
        .mock_segment("/clip/a/x.m4s", b"x", Some(1))
        .await
        .mock_segment("/clip/a/y.m4s", b"y", Some(1))
        .await;

    let dir = tempfile::tempdir()?;
    let muxer = RecordingMuxer::default();
    let job = RipJobBuilder::new()
        .config(config(dir.path()))
        .client(HttpClient::default())
        .muxer(muxer.clone())
        .reporter(Arc::new(SilentReporter))
        .build()?;

    let output = job.run(&manifest_url, "clip").await?;

    assert_eq!(output, dir.path().join("clip.mp4"));
    assert_eq!(tokio::fs::read(&output).await?, b"muxed");

    let calls = muxer.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].video, b"\0\0ABBCCC");
    assert_eq!(calls[0].audio, b"xy");
    assert_eq!(calls[0].output, output);

    // only the final file is left
    assert!(!dir.path().join("c1").exists());
    assert!(!dir.path().join("c1.m4v").exists());
    assert!(!dir.path().join("c1.m4a").exists());
    Ok(())
}

#[tokio::test]
async fn failed_video_segment_aborts_merge() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    let manifest_url = mount_manifest(
        &server,
        json!({
            "clip_id": "c2",
            "base_url": "/",
            "video": [{
                "base_url": "v/",
                "init_segment": "AAA=",
                "bitrate": 1000,
                "segments": [{ "url": "a" }, { "url": "b" }, { "url": "c" }]
            }],
            "audio": [{
                "base_url": "a/",
                "bitrate": 128,
                "segments": [{ "url": "x" }]
            }]
        }),
    )
    .await;
    server
        .mock_segment("/v/a", b"A", Some(1))
        .await
        .mock_broken("/v/b", 5)
        .await
        .mock_segment("/v/c", b"C", Some(1))
        .await
        .mock_segment("/a/x", b"x", Some(1))
        .await;

    let dir = tempfile::tempdir()?;
    let muxer = RecordingMuxer::default();
    let job = RipJobBuilder::new()
        .config(config(dir.path()))
        .client(HttpClient::default())
        .muxer(muxer.clone())
        .reporter(Arc::new(SilentReporter))
        .build()?;

    let result = job.run(&manifest_url, "clip.mkv").await;

    match result {
        Err(RipperError::SegmentFetch {
            media,
            total,
            failures,
        }) => {
            assert_eq!(media, MediaType::Video);
            assert_eq!(total, 3);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].sequence, 1);
        }
        other => panic!("unexpected result: {other:?}"),
    }

    // video was never reassembled, audio ran to completion
    assert!(!dir.path().join("c2.m4v").exists());
    assert_eq!(tokio::fs::read(dir.path().join("c2.m4a")).await?, b"x");
    assert!(muxer.calls.lock().unwrap().is_empty());
    assert!(!dir.path().join("clip.mkv").exists());
    Ok(())
}

#[tokio::test]
async fn highest_bitrate_is_downloaded() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    let manifest_url = mount_manifest(
        &server,
        json!({
            "clip_id": "c3",
            "base_url": "/",
            "video": [
                { "base_url": "low/", "bitrate": 500, "segments": [{ "url": "s" }] },
                { "base_url": "high/", "bitrate": 1200, "segments": [{ "url": "s" }] }
            ],
            "audio": [
                { "base_url": "audio/", "bitrate": 128, "segments": [{ "url": "s" }] }
            ]
        }),
    )
    .await;
    server
        .mock_segment("/low/s", b"low", Some(0))
        .await
        .mock_segment("/high/s", b"high", Some(1))
        .await
        .mock_segment("/audio/s", b"audio", Some(1))
        .await;

    let dir = tempfile::tempdir()?;
    let muxer = RecordingMuxer::default();
    let job = RipJobBuilder::new()
        .config(config(dir.path()))
        .client(HttpClient::default())
        .muxer(muxer.clone())
        .reporter(Arc::new(SilentReporter))
        .build()?;

    let output = job.run(&manifest_url, "Episode 1.5").await?;
    assert_eq!(output, dir.path().join("Episode 1.5.mp4"));

    let calls = muxer.calls.lock().unwrap();
    assert_eq!(calls[0].output, output);
    assert_eq!(calls[0].video, b"high");
    assert_eq!(calls[0].audio, b"audio");
    Ok(())
}

#[tokio::test]
async fn keep_segments_leaves_cache() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    let manifest_url = mount_manifest(
        &server,
        json!({
            "clip_id": "c4",
            "base_url": "/",
            "video": [{ "base_url": "v/", "bitrate": 1, "segments": [{ "url": "a" }] }],
            "audio": [{ "base_url": "a/", "bitrate": 1, "segments": [{ "url": "b" }] }]
        }),
    )
    .await;
    server
        .mock_segment("/v/a", b"v", Some(1))
        .await
        .mock_segment("/a/b", b"a", Some(1))
        .await;

    let dir = tempfile::tempdir()?;
    let job = RipJobBuilder::new()
        .config(RipperConfig {
            keep_segments: true,
            ..config(dir.path())
        })
        .client(HttpClient::default())
        .muxer(RecordingMuxer::default())
        .reporter(Arc::new(SilentReporter))
        .build()?;

    job.run(&manifest_url, "clip").await?;

    assert!(dir.path().join("c4/video/000000_a").exists());
    assert!(dir.path().join("c4/audio/000000_b").exists());
    Ok(())
}

#[tokio::test]
async fn cancelled_job_does_not_merge() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    let manifest_url = mount_manifest(
        &server,
        json!({
            "clip_id": "c5",
            "base_url": "/",
            "video": [{ "base_url": "v/", "bitrate": 1, "segments": [{ "url": "a" }] }],
            "audio": [{ "base_url": "a/", "bitrate": 1, "segments": [{ "url": "b" }] }]
        }),
    )
    .await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir()?;
    let muxer = RecordingMuxer::default();
    let job = RipJobBuilder::new()
        .config(config(dir.path()))
        .client(HttpClient::default())
        .muxer(muxer.clone())
        .reporter(Arc::new(SilentReporter))
        .build()?;

    let token = job.token().clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        token.cancel();
    });

    let result = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        job.run(&manifest_url, "clip"),
    )
    .await?;

    assert!(matches!(result, Err(RipperError::Cancelled)));
    assert!(muxer.calls.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn cleanup_failure_is_only_a_warning() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    let manifest_url = mount_manifest(
        &server,
        json!({
            "clip_id": "c9",
            "base_url": "/",
            "video": [{ "base_url": "v/", "bitrate": 1, "segments": [{ "url": "a" }] }],
            "audio": [{ "base_url": "a/", "bitrate": 1, "segments": [{ "url": "b" }] }]
        }),
    )
    .await;
    server
        .mock_segment("/v/a", b"v", Some(1))
        .await
        .mock_segment("/a/b", b"a", Some(1))
        .await;

    // a foreign file keeps the clip directory from being removed
    let dir = tempfile::tempdir()?;
    let clip_dir = dir.path().join("c9");
    tokio::fs::create_dir_all(&clip_dir).await?;
    tokio::fs::write(clip_dir.join("stray"), b"stray").await?;

    let reporter = Arc::new(WarningCollector::default());
    let muxer = RecordingMuxer::default();
    let job = RipJobBuilder::new()
        .config(config(dir.path()))
        .client(HttpClient::default())
        .muxer(muxer.clone())
        .reporter(reporter.clone())
        .build()?;

    let result = job.run(&manifest_url, "clip").await;

    assert!(result.is_ok());
    assert_eq!(muxer.calls.lock().unwrap().len(), 1);
    let warnings = reporter.warnings.lock().unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("c9"));
    assert!(clip_dir.join("stray").exists());
    assert!(!clip_dir.join("video").exists());
    Ok(())
}
