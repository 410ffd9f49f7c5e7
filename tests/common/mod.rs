// Shared test helpers; not all items used by every test binary.
#![allow(unused)]

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Value, json};
use shiftline::collaborators::{SearchResult, SearchService};
use shiftline::dispatch::{Clock, FixedClock};
use shiftline::errors::{ShiftlineError, ShiftlineResult};
use shiftline::line::{ReplyPayload, ReplySender, ReplyToken};
use std::sync::{Arc, Mutex};

pub const SECRET: &str = "test-channel-secret";

/// Records every reply instead of calling the platform.
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<(String, ReplyPayload)>>,
}

impl RecordingSender {
    pub fn sent(&self) -> Vec<(String, ReplyPayload)> {
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
        Ok(())
    }
}

/// Search stub returning a canned summary and counting calls.
pub struct StubSearch {
    summary: Option<String>,
    pub queries: Mutex<Vec<String>>,
}

impl StubSearch {
    pub fn with_summary(summary: Option<&str>) -> Self {
        Self {
            summary: summary.map(str::to_string),
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SearchService for StubSearch {
    async fn search(&self, query: &str) -> ShiftlineResult<SearchResult> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(SearchResult {
            summary_text: self.summary.clone(),
        })
    }
}

/// Search stub that always fails with a retryable error.
pub struct UnavailableSearch {
    pub calls: Mutex<u32>,
}

#[async_trait]
impl SearchService for UnavailableSearch {
    async fn search(&self, _query: &str) -> ShiftlineResult<SearchResult> {
        *self.calls.lock().unwrap() += 1;
        Err(ShiftlineError::Collaborator {
            service: "search",
            message: "HTTP 503 Service Unavailable: backend unavailable".into(),
            retryable: true,
        })
    }
}

/// 2024-01-15 09:00 in Tokyo.
pub fn fixed_clock() -> Arc<dyn Clock> {
    let local = NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap();
    Arc::new(FixedClock::at_local(chrono_tz::Asia::Tokyo, local))
}

pub fn text_event(token: &str, text: &str) -> Value {
    json!({
        "type": "message",
        "mode": "active",
        "timestamp": 1_705_276_800_000_u64,
        "replyToken": token,
        "source": {"type": "user", "userId": "U4af4980629"},
        "message": {"type": "text", "id": "325708", "text": text}
    })
}

pub fn postback_event(token: &str, data: &str, datetime: Option<&str>) -> Value {
    let mut postback = json!({"data": data});
    if let Some(dt) = datetime {
        postback["params"] = json!({"datetime": dt});
    }
    json!({
        "type": "postback",
        "replyToken": token,
        "source": {"type": "user", "userId": "U4af4980629"},
        "postback": postback
    })
}

pub fn callback_body(events: Vec<Value>) -> Vec<u8> {
    serde_json::to_vec(&json!({"destination": "Uxxxxxxxxxx", "events": events})).unwrap()
}
