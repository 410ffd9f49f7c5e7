use super::*;
use crate::collaborators::{GenerativeService, QueryResult, SearchResult, Warehouse};
use crate::line::{TextMessageEvent, build_carousel};
use std::io;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Default)]
struct RecordingSender {
    sent: Mutex<Vec<(String, ReplyPayload)>>,
    fail: bool,
}

impl RecordingSender {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn sent(&self) -> Vec<(String, ReplyPayload)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplySender for RecordingSender {
    async fn reply(&self, token: ReplyToken, payload: ReplyPayload) -> ShiftlineResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push((token.as_str().to_string(), payload));
        if self.fail {
            return Err(ShiftlineError::Send("HTTP 400: Invalid reply token".into()));
        }
        Ok(())
    }
}

struct StubSearch(ShiftlineResult<Option<&'static str>>);

#[async_trait]
impl SearchService for StubSearch {
    async fn search(&self, _query: &str) -> ShiftlineResult<SearchResult> {
        match &self.0 {
            Ok(summary) => Ok(SearchResult {
                summary_text: summary.map(str::to_string),
            }),
            Err(_) => Err(ShiftlineError::transient("search", "unavailable")),
        }
    }
}

struct OversizedHandler;

#[async_trait]
impl TextHandler for OversizedHandler {
    fn intent(&self) -> &'static str {
        "oversized"
    }

    async fn handle(&self, _text: &str, _ctx: &RequestContext) -> ShiftlineResult<ReplyPayload> {
        build_carousel(vec![])
    }
}

struct StaticGenerative;

#[async_trait]
impl GenerativeService for StaticGenerative {
    async fn generate(&self, _context: &str, _input: &str) -> ShiftlineResult<String> {
        Ok("INSERT INTO shifts VALUES ('U1')".to_string())
    }
}

struct BrokenWarehouse;

#[async_trait]
impl Warehouse for BrokenWarehouse {
    async fn execute(&self, _statement: &str, _request_id: &str) -> ShiftlineResult<QueryResult> {
        Err(ShiftlineError::collaborator("warehouse", "permission denied"))
    }
}

fn ctx() -> RequestContext {
    let local = NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap();
    RequestContext::from_clock(
        &FixedClock::at_local(chrono_tz::Asia::Tokyo, local),
        Duration::from_secs(25),
    )
}

fn fast_policy() -> CallPolicy {
    CallPolicy {
        timeout: Duration::from_millis(200),
        max_retries: 1,
    }
}

/// Answers after `delay`.
struct SlowSearch {
    delay: Duration,
}

#[async_trait]
impl SearchService for SlowSearch {
    async fn search(&self, query: &str) -> ShiftlineResult<SearchResult> {
        tokio::time::sleep(self.delay).await;
        Ok(SearchResult {
            summary_text: Some(format!("answer: {}", query)),
        })
    }
}

/// Collects formatted log output for assertions.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    (logs, tracing::subscriber::set_default(subscriber))
}

fn dispatcher(sender: Arc<RecordingSender>, search: StubSearch) -> Dispatcher {
    Dispatcher::new(sender, Arc::new(search), fast_policy())
}

fn text(token: &str, body: &str) -> Event {
    Event::TextMessage(TextMessageEvent {
        user_id: Some("U1".into()),
        reply_token: ReplyToken::new(token),
        text: body.into(),
    })
}

fn postback(token: &str, data: &str, selected: Option<&str>) -> Event {
    Event::Postback(PostbackEvent {
        user_id: Some("U1".into()),
        reply_token: ReplyToken::new(token),
        data: data.into(),
        selected_datetime: selected.map(str::to_string),
    })
}

#[tokio::test]
async fn test_greeting_sends_carousel_once() {
    let sender = Arc::new(RecordingSender::default());
    let d = dispatcher(sender.clone(), StubSearch(Ok(None)));

    let outcome = d.dispatch(text("t1", GREETING_PHRASE), &ctx()).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Replied {
            intent: "greeting",
            kind: "carousel"
        }
    );
    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "t1");
    let ReplyPayload::Carousel(carousel) = &sent[0].1 else {
        panic!("expected carousel");
    };
    assert_eq!(carousel.columns().len(), 3);
}

#[tokio::test]
async fn test_exact_match_only() {
    let sender = Arc::new(RecordingSender::default());
    let d = dispatcher(sender.clone(), StubSearch(Ok(Some("検索結果"))));

    // trailing space does not match the greeting
    let outcome = d.dispatch(text("t1", "おはようございます "), &ctx()).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Replied {
            intent: "search",
            kind: "text"
        }
    );
    assert_eq!(sender.sent()[0].1.as_text(), Some("検索結果"));
}

#[tokio::test]
async fn test_schedule_phrase_replies_with_next_month() {
    let sender = Arc::new(RecordingSender::default());
    let d = dispatcher(sender.clone(), StubSearch(Ok(None)));

    d.dispatch(text("t1", SCHEDULE_PHRASE), &ctx()).await;
    let sent = sender.sent();
    let body = sent[0].1.as_text().unwrap();
    assert_eq!(body.lines().count(), 29);
    assert!(body.lines().last().unwrap().starts_with("2月29日"));
}

#[tokio::test]
async fn test_search_failure_sends_fallback_after_retry() {
    let sender = Arc::new(RecordingSender::default());
    let d = dispatcher(sender.clone(), StubSearch(Err(ShiftlineError::Config(String::new()))));

    d.dispatch(text("t1", "有給について"), &ctx()).await;
    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.as_text(), Some(catalog::NO_RESULT_TEXT));
}

#[tokio::test]
async fn test_template_too_large_falls_back_to_text() {
    let sender = Arc::new(RecordingSender::default());
    let d = Dispatcher::with_routes(
        sender.clone(),
        vec![TextRoute::new(Matcher::Any, Arc::new(OversizedHandler))],
    );

    let outcome = d.dispatch(text("t1", "x"), &ctx()).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Replied {
            intent: "oversized",
            kind: "text"
        }
    );
    assert_eq!(sender.sent()[0].1.as_text(), Some(TEMPLATE_FALLBACK_TEXT));
}

#[tokio::test]
async fn test_unmatched_text_without_catch_all_is_ignored() {
    let sender = Arc::new(RecordingSender::default());
    let d = Dispatcher::with_routes(
        sender.clone(),
        vec![TextRoute::new(
            Matcher::Exact(GREETING_PHRASE),
            Arc::new(handlers::GreetingHandler),
        )],
    );

    let outcome = d.dispatch(text("t1", "hello"), &ctx()).await;
    assert!(matches!(outcome, DispatchOutcome::Ignored { .. }));
    assert!(sender.sent().is_empty());
}

#[tokio::test]
async fn test_unknown_postback_sends_nothing() {
    let (logs, _guard) = capture_logs();
    let sender = Arc::new(RecordingSender::default());
    let d = dispatcher(sender.clone(), StubSearch(Ok(None)));

    let outcome = d
        .dispatch(postback("t1", "action=buy&itemid=111", None), &ctx())
        .await;
    assert_eq!(
        outcome,
        DispatchOutcome::Ignored {
            reason: "unknown action 'buy'".into()
        }
    );
    assert!(sender.sent().is_empty());

    let output = logs.contents();
    assert_eq!(
        output.matches("ignoring postback: unknown action 'buy'").count(),
        1,
        "{}",
        output
    );
    assert!(output.contains("INFO"));
}

#[tokio::test]
async fn test_shift_input_echoes_datetime() {
    let sender = Arc::new(RecordingSender::default());
    let d = dispatcher(sender.clone(), StubSearch(Ok(None)));

    d.dispatch(
        postback(
            "t1",
            "action=shift_input&item_id=123",
            Some("2024-02-01T09:30"),
        ),
        &ctx(),
    )
    .await;
    assert_eq!(
        sender.sent()[0].1.as_text(),
        Some("シフトを受け付けました: 2月1日 09:30")
    );
}

#[tokio::test]
async fn test_shift_input_without_datetime() {
    let sender = Arc::new(RecordingSender::default());
    let d = dispatcher(sender.clone(), StubSearch(Ok(None)));

    d.dispatch(postback("t1", "action=shift_input", None), &ctx())
        .await;
    assert_eq!(sender.sent()[0].1.as_text(), Some(SHIFT_INPUT_ACK_TEXT));
}

#[tokio::test]
async fn test_survey_decline_postback() {
    let sender = Arc::new(RecordingSender::default());
    let d = dispatcher(sender.clone(), StubSearch(Ok(None)));

    let outcome = d
        .dispatch(postback("t1", "action=survey_decline", None), &ctx())
        .await;
    assert_eq!(
        outcome,
        DispatchOutcome::Replied {
            intent: "survey_decline",
            kind: "text"
        }
    );
    assert_eq!(sender.sent()[0].1.as_text(), Some(SURVEY_DECLINED_TEXT));
}

#[tokio::test]
async fn test_recorder_failure_sends_failure_text() {
    let sender = Arc::new(RecordingSender::default());
    let d = dispatcher(sender.clone(), StubSearch(Ok(None))).with_recorder(ShiftRecorder::new(
        Arc::new(StaticGenerative),
        Arc::new(BrokenWarehouse),
        "shifts",
        fast_policy(),
    ));

    d.dispatch(
        postback("t1", "action=shift_input&item_id=123", Some("2024-02-01T09:30")),
        &ctx(),
    )
    .await;
    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.as_text(), Some(SHIFT_RECORD_FAILED_TEXT));
}

#[tokio::test]
async fn test_send_failure_is_reported_not_retried() {
    let sender = Arc::new(RecordingSender::failing());
    let d = dispatcher(sender.clone(), StubSearch(Ok(None)));

    let outcome = d.dispatch(text("t1", GREETING_PHRASE), &ctx()).await;
    assert_eq!(outcome, DispatchOutcome::SendFailed { intent: "greeting" });
    assert_eq!(sender.sent().len(), 1);
}

#[tokio::test]
async fn test_batch_preserves_order() {
    let sender = Arc::new(RecordingSender::default());
    let d = dispatcher(sender.clone(), StubSearch(Ok(Some("answer"))));

    let outcomes = d
        .dispatch_batch(
            vec![
                text("t1", GREETING_PHRASE),
                postback("t2", "action=nope", None),
                text("t3", "question"),
            ],
            &ctx(),
        )
        .await;
    assert_eq!(outcomes.len(), 3);
    assert!(matches!(outcomes[1], DispatchOutcome::Ignored { .. }));
    let tokens: Vec<String> = sender.sent().into_iter().map(|(t, _)| t).collect();
    assert_eq!(tokens, vec!["t1", "t3"]);
}

#[tokio::test]
async fn test_batch_events_prepared_concurrently() {
    let sender = Arc::new(RecordingSender::default());
    let d = Dispatcher::new(
        sender.clone(),
        Arc::new(SlowSearch {
            delay: Duration::from_millis(300),
        }),
        CallPolicy {
            timeout: Duration::from_secs(2),
            max_retries: 1,
        },
    );

    let started = tokio::time::Instant::now();
    let outcomes = d
        .dispatch_batch(vec![text("t1", "first"), text("t2", "second")], &ctx())
        .await;
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_millis(550), "{:?}", elapsed);
    assert_eq!(outcomes.len(), 2);
    let sent = sender.sent();
    assert_eq!(sent[0].0, "t1");
    assert_eq!(sent[0].1.as_text(), Some("answer: first"));
    assert_eq!(sent[1].0, "t2");
    assert_eq!(sent[1].1.as_text(), Some("answer: second"));
}

#[tokio::test]
async fn test_batch_replies_before_deadline_when_search_hangs() {
    let sender = Arc::new(RecordingSender::default());
    let d = Dispatcher::new(
        sender.clone(),
        Arc::new(SlowSearch {
            delay: Duration::from_secs(60),
        }),
        CallPolicy {
            timeout: Duration::from_secs(5),
            max_retries: 1,
        },
    );
    let ctx = RequestContext::new(ctx().now, Duration::from_millis(300));

    let started = tokio::time::Instant::now();
    d.dispatch_batch(vec![text("t1", "first"), text("t2", "second")], &ctx)
        .await;
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_millis(700), "{:?}", elapsed);
    let sent = sender.sent();
    assert_eq!(sent.len(), 2);
    assert!(
        sent.iter()
            .all(|(_, p)| p.as_text() == Some(catalog::NO_RESULT_TEXT))
    );
}

#[test]
fn test_from_config_defaults_to_disabled_search() {
    let sender = Arc::new(RecordingSender::default());
    let d = Dispatcher::from_config(&Config::default(), sender);
    assert!(d.recorder.is_none());
    assert_eq!(d.routes.len(), 5);
    assert_eq!(d.routes[4].matcher, Matcher::Any);
    assert_eq!(d.reply_budget, Duration::from_secs(25));
}

#[test]
fn test_format_selected() {
    assert_eq!(format_selected("2024-02-01T09:30"), "2月1日 09:30");
    assert_eq!(format_selected("2024-12-31"), "12月31日");
    assert_eq!(format_selected("09:30"), "09:30");
    assert_eq!(format_selected("garbage"), "garbage");
}
