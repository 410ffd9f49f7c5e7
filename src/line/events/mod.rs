use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{ShiftlineError, ShiftlineResult};

/// Single-use token issued with an event, required to reply to it.
///
/// Not `Clone`: sending a reply consumes the token.
#[derive(Debug, PartialEq, Eq)]
pub struct ReplyToken(String);

impl ReplyToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct TextMessageEvent {
    /// Absent for some group/room sources.
    pub user_id: Option<String>,
    pub reply_token: ReplyToken,
    pub text: String,
}

#[derive(Debug, PartialEq, Eq)]
pub struct PostbackEvent {
    pub user_id: Option<String>,
    pub reply_token: ReplyToken,
    /// Raw `key=value&key=value` data attached to the pressed action.
    pub data: String,
    /// Value chosen in a datetime picker (`datetime`, `date` or `time` param).
    pub selected_datetime: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Event {
    TextMessage(TextMessageEvent),
    Postback(PostbackEvent),
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TextMessage(_) => "text",
            Self::Postback(_) => "postback",
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::TextMessage(e) => e.user_id.as_deref(),
            Self::Postback(e) => e.user_id.as_deref(),
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    destination: Option<String>,
    events: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawEvent {
    Message {
        #[serde(rename = "replyToken")]
        reply_token: String,
        #[serde(default)]
        source: RawSource,
        message: RawMessage,
    },
    Postback {
        #[serde(rename = "replyToken")]
        reply_token: String,
        #[serde(default)]
        source: RawSource,
        postback: RawPostback,
    },
    /// follow, unfollow, join, memberJoined, beacon, ...
    #[serde(other)]
    Unsupported,
}

#[derive(Deserialize, Default)]
struct RawSource {
    #[serde(default, rename = "userId")]
    user_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawMessage {
    Text { text: String },
    /// image, sticker, location, ...
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct RawPostback {
    data: String,
    #[serde(default)]
    params: Option<RawPostbackParams>,
}

#[derive(Deserialize)]
struct RawPostbackParams {
    #[serde(default)]
    datetime: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    time: Option<String>,
}

impl RawPostbackParams {
    fn selected(self) -> Option<String> {
        self.datetime.or(self.date).or(self.time)
    }
}

/// Decode a webhook body into typed events, preserving order.
///
/// Fails only when the envelope itself is unreadable. An individual event
/// that is malformed is logged and skipped so its siblings still go through;
/// event types this bot does not handle are skipped quietly.
pub fn decode(raw_body: &[u8]) -> ShiftlineResult<Vec<Event>> {
    let envelope: Envelope = serde_json::from_slice(raw_body)
        .map_err(|e| ShiftlineError::MalformedPayload(format!("webhook envelope: {}", e)))?;

    debug!(
        "decoding {} event(s) for destination={}",
        envelope.events.len(),
        envelope.destination.as_deref().unwrap_or("-")
    );

    let mut events = Vec::with_capacity(envelope.events.len());
    for (index, value) in envelope.events.into_iter().enumerate() {
        match decode_event(value) {
            Ok(Some(event)) => events.push(event),
            Ok(None) => {}
            Err(e) => warn!("skipping event #{}: {}", index, e),
        }
    }
    Ok(events)
}

fn decode_event(value: Value) -> ShiftlineResult<Option<Event>> {
    let raw: RawEvent = serde_json::from_value(value)
        .map_err(|e| ShiftlineError::MalformedPayload(e.to_string()))?;

    match raw {
        RawEvent::Message {
            reply_token,
            source,
            message,
        } => {
            let RawMessage::Text { text } = message else {
                debug!("ignoring non-text message event");
                return Ok(None);
            };
            Ok(Some(Event::TextMessage(TextMessageEvent {
                user_id: source.user_id,
                reply_token: reply_token_from(reply_token)?,
                text,
            })))
        }
        RawEvent::Postback {
            reply_token,
            source,
            postback,
        } => Ok(Some(Event::Postback(PostbackEvent {
            user_id: source.user_id,
            reply_token: reply_token_from(reply_token)?,
            data: postback.data,
            selected_datetime: postback.params.and_then(RawPostbackParams::selected),
        }))),
        RawEvent::Unsupported => {
            debug!("ignoring unsupported event type");
            Ok(None)
        }
    }
}

fn reply_token_from(token: String) -> ShiftlineResult<ReplyToken> {
    if token.trim().is_empty() {
        return Err(ShiftlineError::MalformedPayload(
            "event has an empty replyToken".to_string(),
        ));
    }
    Ok(ReplyToken(token))
}
