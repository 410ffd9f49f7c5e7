use super::*;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn test_default_http_client_builds() {
    let _client = default_http_client();
    let _short = http_client_with_timeout(Duration::from_secs(2));
}

async fn get_response(server: &MockServer) -> Response {
    Client::new().get(server.uri()).send().await.unwrap()
}

#[tokio::test]
async fn test_limited_body_under_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello world"))
        .mount(&server)
        .await;
    let resp = get_response(&server).await;
    let (result, truncated) = limited_body(resp, 1024).await.unwrap();
    assert_eq!(result, b"hello world");
    assert!(!truncated);
}

#[tokio::test]
async fn test_limited_body_rejects_large_content_length() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 200]))
        .mount(&server)
        .await;
    let resp = get_response(&server).await;
    let err = limited_body(resp, 100).await.unwrap_err();
    assert!(err.to_string().contains("too large"));
}

#[tokio::test]
async fn test_limited_text_decodes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("該当なし"))
        .mount(&server)
        .await;
    let resp = get_response(&server).await;
    assert_eq!(limited_text(resp, 1024).await.unwrap(), "該当なし");
}

#[test]
fn test_error_message_line_shape() {
    let body = r#"{"message":"Invalid reply token"}"#;
    assert_eq!(error_message_from_body(body), "Invalid reply token");
}

#[test]
fn test_error_message_google_shape() {
    let body = r#"{"error":{"code":403,"message":"Permission denied","status":"PERMISSION_DENIED"}}"#;
    assert_eq!(error_message_from_body(body), "Permission denied");
}

#[test]
fn test_error_message_plain_text() {
    assert_eq!(error_message_from_body("  bad gateway \n"), "bad gateway");
}
