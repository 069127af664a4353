use std::time::Duration;

use ripper::{
    fetch::{FetchError, HttpSegmentFetcher, SegmentFetch, TransportError},
    reqwest::StatusCode,
    CancellationToken, HttpClient,
};
use url::Url;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use crate::{init_test_tracing, RipperMock};

fn fetcher(max_attempts: u32) -> HttpSegmentFetcher {
    HttpSegmentFetcher::new(HttpClient::default())
        .max_attempts(max_attempts)
        .retry_delay(Duration::ZERO)
}

#[tokio::test]
async fn fetch_writes_segment() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    server.mock_segment("/seg/a.m4s", b"segment-a", Some(1)).await;

    let dir = tempfile::tempdir()?;
    let destination = dir.path().join("video/000000_a.m4s");
    let url = Url::parse(&format!("{}/seg/a.m4s", server.uri()))?;

    let written = fetcher(5)
        .fetch(&url, &destination, &CancellationToken::new())
        .await?;

    assert_eq!(written, 9);
    assert_eq!(tokio::fs::read(&destination).await?, b"segment-a");
    Ok(())
}

#[tokio::test]
async fn retry_bound_is_exact() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    server.mock_broken("/seg/broken.m4s", 5).await;

    let dir = tempfile::tempdir()?;
    let destination = dir.path().join("000000_broken.m4s");
    let url = Url::parse(&format!("{}/seg/broken.m4s", server.uri()))?;

    let result = fetcher(5)
        .fetch(&url, &destination, &CancellationToken::new())
        .await;

    match result {
        Err(FetchError::ExhaustedRetries {
            url: failed,
            attempts,
            source: TransportError::Status(status),
        }) => {
            assert_eq!(failed, url);
            assert_eq!(attempts, 5);
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(!destination.exists());
    Ok(())
}

#[tokio::test]
async fn retry_stops_after_success() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/seg/flaky.m4s"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    server.mock_segment("/seg/flaky.m4s", b"ok", Some(1)).await;

    let dir = tempfile::tempdir()?;
    let destination = dir.path().join("000000_flaky.m4s");
    let url = Url::parse(&format!("{}/seg/flaky.m4s", server.uri()))?;

    fetcher(5)
        .fetch(&url, &destination, &CancellationToken::new())
        .await?;
    assert_eq!(tokio::fs::read(&destination).await?, b"ok");
    Ok(())
}

#[tokio::test]
async fn cancel_aborts_inflight_request() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/seg/slow.m4s"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir()?;
    let destination = dir.path().join("000000_slow.m4s");
    let url = Url::parse(&format!("{}/seg/slow.m4s", server.uri()))?;

    let token = CancellationToken::new();
    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        })
    };

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        fetcher(5).fetch(&url, &destination, &token),
    )
    .await?;
    canceller.await?;

    assert!(matches!(result, Err(FetchError::Cancelled)));
    assert!(!destination.exists());
    Ok(())
}
