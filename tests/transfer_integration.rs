//! Integration tests for resumable transfers against mock HTTP servers.

use std::time::Duration;

use tempfile::TempDir;
use vidgrab_core::download::{DownloadError, TransferClient, TransferSettings};
use vidgrab_core::retry::RetryPolicy;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BODY: &[u8] = b"0123456789";

fn client() -> TransferClient {
    TransferClient::new(TransferSettings {
        timeout: Duration::from_secs(10),
        retry: RetryPolicy::new(3, Duration::ZERO),
        ..TransferSettings::default()
    })
    .expect("transfer client should build")
}

#[tokio::test]
async fn test_fresh_transfer_writes_destination_and_removes_staging() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/v.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(BODY))
        .expect(1)
        .mount(&server)
        .await;

    let client = client();
    let target = client.target(
        format!("{}/v.mp4", server.uri()),
        temp_dir.path().join("v.mp4"),
    );

    let outcome = client.transfer(&target).await.expect("transfer should succeed");

    assert_eq!(std::fs::read(&target.destination).unwrap(), BODY);
    assert!(!target.partial.exists(), "staging file should be renamed away");
    assert_eq!(outcome.bytes_total, 10);
    assert_eq!(outcome.bytes_fetched, 10);
    assert!(!outcome.resumed);

    let requests = server.received_requests().await.unwrap();
    assert!(
        !requests[0].headers.contains_key("range"),
        "fresh transfer must not send a Range header"
    );
}

#[tokio::test]
async fn test_interrupted_transfer_resumes_from_staged_offset() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/v.mp4"))
        .and(header("range", "bytes=4-"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "bytes 4-9/10")
                .set_body_bytes(&BODY[4..]),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client();
    let target = client.target(
        format!("{}/v.mp4", server.uri()),
        temp_dir.path().join("v.mp4"),
    );
    std::fs::write(&target.partial, &BODY[..4]).unwrap();

    let outcome = client.transfer(&target).await.expect("resume should succeed");

    assert_eq!(std::fs::read(&target.destination).unwrap(), BODY);
    assert!(!target.partial.exists());
    assert_eq!(outcome.bytes_fetched, 6);
    assert_eq!(outcome.bytes_total, 10);
    assert!(outcome.resumed);
}

#[tokio::test]
async fn test_server_error_keeps_staging_file() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/v.mp4"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client();
    let target = client.target(
        format!("{}/v.mp4", server.uri()),
        temp_dir.path().join("v.mp4"),
    );
    std::fs::write(&target.partial, &BODY[..4]).unwrap();

    let result = client.transfer(&target).await;

    assert!(
        matches!(result, Err(DownloadError::HttpStatus { status: 500, .. })),
        "expected HTTP 500, got {result:?}"
    );
    assert!(!target.destination.exists());
    assert_eq!(std::fs::read(&target.partial).unwrap(), &BODY[..4]);
}

#[tokio::test]
async fn test_ignored_range_restarts_from_zero() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/v.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(BODY))
        .mount(&server)
        .await;

    let client = client();
    let target = client.target(
        format!("{}/v.mp4", server.uri()),
        temp_dir.path().join("v.mp4"),
    );
    std::fs::write(&target.partial, b"xxxx").unwrap();

    let outcome = client.transfer(&target).await.expect("restart should succeed");

    assert_eq!(std::fs::read(&target.destination).unwrap(), BODY);
    assert!(!outcome.resumed);
    assert_eq!(outcome.bytes_fetched, 10);
}

#[tokio::test]
async fn test_range_not_satisfiable_on_complete_staging_finalizes() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/v.mp4"))
        .and(header("range", "bytes=10-"))
        .respond_with(ResponseTemplate::new(416).insert_header("content-range", "bytes */10"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client();
    let target = client.target(
        format!("{}/v.mp4", server.uri()),
        temp_dir.path().join("v.mp4"),
    );
    std::fs::write(&target.partial, BODY).unwrap();

    let outcome = client.transfer(&target).await.expect("complete staging should finalize");

    assert_eq!(std::fs::read(&target.destination).unwrap(), BODY);
    assert!(!target.partial.exists());
    assert_eq!(outcome.bytes_fetched, 0);
}

#[tokio::test]
async fn test_range_not_satisfiable_on_oversize_staging_discards_it() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/v.mp4"))
        .and(header("range", "bytes=12-"))
        .respond_with(ResponseTemplate::new(416).insert_header("content-range", "bytes */10"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(BODY))
        .mount(&server)
        .await;

    let client = client();
    let target = client.target(
        format!("{}/v.mp4", server.uri()),
        temp_dir.path().join("v.mp4"),
    );
    std::fs::write(&target.partial, b"0123456789ab").unwrap();

    let result = client.transfer(&target).await;

    assert!(
        matches!(
            result,
            Err(DownloadError::Integrity {
                expected_bytes: 10,
                actual_bytes: 12,
                ..
            })
        ),
        "expected integrity failure, got {result:?}"
    );
    assert!(!target.partial.exists(), "oversize staging file should be removed");

    client
        .transfer_with_retry(&target)
        .await
        .expect("fresh transfer after discard should succeed");
    assert_eq!(std::fs::read(&target.destination).unwrap(), BODY);
}

#[tokio::test]
async fn test_partial_content_at_wrong_offset_is_rejected() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/v.mp4"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "bytes 0-9/10")
                .set_body_bytes(BODY),
        )
        .mount(&server)
        .await;

    let client = client();
    let target = client.target(
        format!("{}/v.mp4", server.uri()),
        temp_dir.path().join("v.mp4"),
    );
    std::fs::write(&target.partial, &BODY[..4]).unwrap();

    let result = client.transfer(&target).await;

    assert!(
        matches!(
            result,
            Err(DownloadError::RangeMismatch {
                expected: 4,
                actual: Some(0),
                ..
            })
        ),
        "expected range mismatch, got {result:?}"
    );
    assert_eq!(std::fs::read(&target.partial).unwrap(), &BODY[..4]);
}

#[tokio::test]
async fn test_short_body_keeps_progress_for_next_attempt() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/v.mp4"))
        .and(header("range", "bytes=4-"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "bytes 4-19/20")
                .set_body_bytes(&BODY[4..]),
        )
        .mount(&server)
        .await;

    let client = client();
    let target = client.target(
        format!("{}/v.mp4", server.uri()),
        temp_dir.path().join("v.mp4"),
    );
    std::fs::write(&target.partial, &BODY[..4]).unwrap();

    let result = client.transfer(&target).await;

    assert!(
        matches!(
            result,
            Err(DownloadError::Integrity {
                expected_bytes: 20,
                actual_bytes: 10,
                ..
            })
        ),
        "expected integrity failure, got {result:?}"
    );
    assert!(!target.destination.exists());
    assert_eq!(std::fs::read(&target.partial).unwrap(), BODY);
}

#[tokio::test]
async fn test_transfer_with_retry_recovers_after_failure() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/v.mp4"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(BODY))
        .mount(&server)
        .await;

    let client = client();
    let target = client.target(
        format!("{}/v.mp4", server.uri()),
        temp_dir.path().join("v.mp4"),
    );

    client
        .transfer_with_retry(&target)
        .await
        .expect("second attempt should succeed");

    assert_eq!(std::fs::read(&target.destination).unwrap(), BODY);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_transfer_with_retry_surfaces_last_error() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/v.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .expect(3)
        .mount(&server)
        .await;

    let client = client();
    let target = client.target(
        format!("{}/v.mp4", server.uri()),
        temp_dir.path().join("v.mp4"),
    );

    let result = client.transfer_with_retry(&target).await;

    assert!(matches!(
        result,
        Err(DownloadError::HttpStatus { status: 404, .. })
    ));
    assert!(!target.destination.exists());
}
