use draftly_runtime::{probe_preview, RuntimeError};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_probe_succeeds_for_serving_preview() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let status = probe_preview(&format!("{}/", server.uri()), Duration::from_secs(2))
        .await
        .unwrap();

    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_probe_rejects_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let err = probe_preview(&server.uri(), Duration::from_secs(2))
        .await
        .unwrap_err();

    match err {
        RuntimeError::PreviewUnreachable { url, reason } => {
            assert_eq!(url, server.uri());
            assert!(reason.contains("502"));
        }
        other => panic!("expected PreviewUnreachable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_probe_times_out_on_slow_preview() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let err = probe_preview(&server.uri(), Duration::from_millis(100))
        .await
        .unwrap_err();

    assert!(matches!(err, RuntimeError::PreviewUnreachable { .. }));
}
