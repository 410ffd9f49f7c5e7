use super::*;
use crate::collaborators::{CallPolicy, DisabledSearch, SearchResult, SearchService};
use crate::dispatch::{FixedClock, Matcher, RequestContext, TextHandler, TextRoute};
use crate::errors::ShiftlineResult;
use crate::line::signature::sign;
use crate::line::{ReplyPayload, ReplySender, ReplyToken};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use chrono::NaiveDate;
use serde_json::json;
use std::sync::Mutex;
use tower::ServiceExt;

const SECRET: &str = "channel-secret";

#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<(String, ReplyPayload)>>,
}

#[async_trait]
impl ReplySender for RecordingSender {
    async fn reply(&self, token: ReplyToken, payload: ReplyPayload) -> ShiftlineResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push((token.as_str().to_string(), payload));
        Ok(())
    }
}

struct PanickingHandler;

#[async_trait]
impl TextHandler for PanickingHandler {
    fn intent(&self) -> &'static str {
        "panic"
    }

    async fn handle(&self, _text: &str, _ctx: &RequestContext) -> ShiftlineResult<ReplyPayload> {
        panic!("handler bug");
    }
}

struct EchoSearch;

#[async_trait]
impl SearchService for EchoSearch {
    async fn search(&self, query: &str) -> ShiftlineResult<SearchResult> {
        Ok(SearchResult {
            summary_text: Some(format!("echo: {}", query)),
        })
    }
}

fn clock() -> Arc<dyn Clock> {
    let local = NaiveDate::from_ymd_opt(2024, 12, 5)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap();
    Arc::new(FixedClock::at_local(chrono_tz::Asia::Tokyo, local))
}

fn app_with(dispatcher: Dispatcher) -> Router {
    build_router(GatewayState::new(SECRET, Arc::new(dispatcher), clock()))
}

fn app(sender: Arc<RecordingSender>) -> Router {
    app_with(Dispatcher::new(
        sender,
        Arc::new(EchoSearch),
        CallPolicy::default(),
    ))
}

fn text_event(token: &str, text: &str) -> serde_json::Value {
    json!({
        "type": "message",
        "replyToken": token,
        "source": {"type": "user", "userId": "U1"},
        "message": {"type": "text", "id": "1", "text": text}
    })
}

fn callback_body(events: Vec<serde_json::Value>) -> Vec<u8> {
    serde_json::to_vec(&json!({"destination": "Ubot", "events": events})).unwrap()
}

fn signed_request(body: Vec<u8>) -> Request<Body> {
    let signature = sign(&body, SECRET.as_bytes());
    Request::builder()
        .method("POST")
        .uri("/callback")
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint_returns_json() {
    let app = app(Arc::new(RecordingSender::default()));

    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let resp: axum::http::Response<_> = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = axum::body::to_bytes(resp.into_body(), 4096).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], crate::VERSION);
}

#[tokio::test]
async fn test_valid_callback_dispatches_and_returns_ok() {
    let sender = Arc::new(RecordingSender::default());
    let resp = app(sender.clone())
        .oneshot(signed_request(callback_body(vec![text_event(
            "tok-1",
            "シフトを表示してください",
        )])))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), 64).await.unwrap();
    assert_eq!(&body[..], b"OK");

    let sent = sender.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "tok-1");
    // clock is 2024-12-05, so the schedule is January 2025
    let text = sent[0].1.as_text().unwrap();
    assert_eq!(text.lines().count(), 31);
    assert!(text.starts_with("1月1日 (水)"));
}

#[tokio::test]
async fn test_bad_signature_rejected_without_dispatch() {
    let sender = Arc::new(RecordingSender::default());
    let body = callback_body(vec![text_event("tok-1", "hi")]);
    let signature = sign(&body, b"another-secret");
    let req = Request::builder()
        .method("POST")
        .uri("/callback")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body))
        .unwrap();

    let resp = app(sender.clone()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(sender.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_signature_rejected() {
    let sender = Arc::new(RecordingSender::default());
    let req = Request::builder()
        .method("POST")
        .uri("/callback")
        .body(Body::from(callback_body(vec![])))
        .unwrap();

    let resp = app(sender.clone()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_tampered_body_rejected() {
    let sender = Arc::new(RecordingSender::default());
    let body = callback_body(vec![text_event("tok-1", "hi")]);
    let signature = sign(&body, SECRET.as_bytes());
    let tampered = callback_body(vec![text_event("tok-1", "ho")]);
    let req = Request::builder()
        .method("POST")
        .uri("/callback")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(tampered))
        .unwrap();

    let resp = app(sender.clone()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(sender.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let sender = Arc::new(RecordingSender::default());
    let body = vec![b' '; CALLBACK_MAX_BODY + 1];
    let resp = app(sender).oneshot(signed_request(body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_undecodable_envelope_is_server_error() {
    let sender = Arc::new(RecordingSender::default());
    let resp = app(sender)
        .oneshot(signed_request(b"{\"destination\":\"Ubot\"}".to_vec()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_verification_batch_without_events_is_ok() {
    let sender = Arc::new(RecordingSender::default());
    let resp = app(sender.clone())
        .oneshot(signed_request(callback_body(vec![])))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(sender.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_handler_panic_is_contained() {
    let sender = Arc::new(RecordingSender::default());
    let dispatcher = Dispatcher::with_routes(
        sender.clone(),
        vec![TextRoute::new(Matcher::Any, Arc::new(PanickingHandler))],
    );
    let app = app_with(dispatcher);

    let resp = app
        .clone()
        .oneshot(signed_request(callback_body(vec![text_event("tok-1", "x")])))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    // the router keeps serving
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_disabled_search_replies_with_fallback() {
    let sender = Arc::new(RecordingSender::default());
    let app = app_with(Dispatcher::new(
        sender.clone(),
        Arc::new(DisabledSearch),
        CallPolicy::default(),
    ));

    let resp = app
        .oneshot(signed_request(callback_body(vec![text_event("tok-1", "質問")])))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let sent = sender.sent.lock().unwrap();
    assert_eq!(
        sent[0].1.as_text(),
        Some(crate::dispatch::catalog::NO_RESULT_TEXT)
    );
}
