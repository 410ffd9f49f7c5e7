//! Event routing.
//!
//! Text messages run through an ordered `(matcher, handler)` table; the first
//! match wins. Postbacks are decoded into a [`PostbackIntent`] once, and data
//! that does not decode is ignored without a reply. Every path that produces
//! a payload hands it to the [`ReplySender`] exactly once, consuming the
//! event's reply token.
//!
//! All tokens in a callback are issued together, so the events of a batch are
//! handled concurrently against one reply deadline and their replies are then
//! sent in delivery order.

pub mod catalog;
pub mod clock;
pub mod handlers;
pub mod postback;
pub mod recorder;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use futures_util::future::join_all;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::collaborators::{
    BigQueryWarehouse, CallPolicy, DiscoveryEngineSearch, DisabledSearch, SearchService,
    VertexGenerative,
};
use crate::config::{Config, DEFAULT_REPLY_BUDGET_SECS};
use crate::errors::{ShiftlineError, ShiftlineResult};
use crate::line::{Event, PostbackEvent, ReplySender, ReplyToken, ReplyPayload, build_text};

use catalog::{
    GENERIC_FAILURE_TEXT, GREETING_PHRASE, SCHEDULE_PHRASE, SHIFT_ACCEPTED_PREFIX,
    SHIFT_INPUT_ACK_TEXT, SHIFT_RECORD_FAILED_TEXT, SURVEY_ANSWER_PHRASE, SURVEY_DECLINED_TEXT,
    SURVEY_START_PHRASE, TEMPLATE_FALLBACK_TEXT,
};
pub use clock::{Clock, FixedClock, SystemClock};
use handlers::{
    GreetingHandler, ScheduleHandler, SearchHandler, SurveyAnswerHandler, SurveyStartHandler,
};
pub use postback::{PostbackIntent, UnknownPostback};
pub use recorder::{ShiftRecorder, ShiftRequest};

/// Per-request values shared by every event in one callback.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext {
    pub now: DateTime<Tz>,
    /// Collaborator calls for this callback are abandoned at this instant.
    pub reply_deadline: Instant,
}

impl RequestContext {
    /// Context for a callback arriving now, with `reply_budget` to answer it.
    pub fn new(now: DateTime<Tz>, reply_budget: Duration) -> Self {
        Self {
            now,
            reply_deadline: Instant::now() + reply_budget,
        }
    }

    pub fn from_clock(clock: &dyn Clock, reply_budget: Duration) -> Self {
        Self::new(clock.now(), reply_budget)
    }
}

/// Produces the reply for a text intent.
#[async_trait]
pub trait TextHandler: Send + Sync {
    fn intent(&self) -> &'static str;

    async fn handle(&self, text: &str, ctx: &RequestContext) -> ShiftlineResult<ReplyPayload>;

    /// Sent instead when a collaborator behind this handler fails.
    fn failure_text(&self) -> &'static str {
        GENERIC_FAILURE_TEXT
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// Whole-message equality, no trimming or case folding.
    Exact(&'static str),
    Any,
}

impl Matcher {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            Self::Exact(phrase) => text == *phrase,
            Self::Any => true,
        }
    }
}

pub struct TextRoute {
    pub matcher: Matcher,
    pub handler: Arc<dyn TextHandler>,
}

impl TextRoute {
    pub fn new(matcher: Matcher, handler: Arc<dyn TextHandler>) -> Self {
        Self { matcher, handler }
    }
}

/// What happened to one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Replied {
        intent: &'static str,
        kind: &'static str,
    },
    Ignored {
        reason: String,
    },
    SendFailed {
        intent: &'static str,
    },
}

/// A handled event waiting for its reply to be sent.
enum Prepared {
    Reply {
        intent: &'static str,
        token: ReplyToken,
        payload: ReplyPayload,
    },
    Ignored(String),
}

pub struct Dispatcher {
    routes: Vec<TextRoute>,
    sender: Arc<dyn ReplySender>,
    recorder: Option<ShiftRecorder>,
    reply_budget: Duration,
}

impl Dispatcher {
    /// Dispatcher with the built-in intent table.
    pub fn new(
        sender: Arc<dyn ReplySender>,
        search: Arc<dyn SearchService>,
        policy: CallPolicy,
    ) -> Self {
        Self::with_routes(sender, default_routes(search, policy))
    }

    pub fn with_routes(sender: Arc<dyn ReplySender>, routes: Vec<TextRoute>) -> Self {
        Self {
            routes,
            sender,
            recorder: None,
            reply_budget: Duration::from_secs(DEFAULT_REPLY_BUDGET_SECS),
        }
    }

    #[must_use]
    pub fn with_recorder(mut self, recorder: ShiftRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    #[must_use]
    pub fn with_reply_budget(mut self, reply_budget: Duration) -> Self {
        self.reply_budget = reply_budget;
        self
    }

    /// Context for a callback received now.
    pub fn context(&self, clock: &dyn Clock) -> RequestContext {
        RequestContext::from_clock(clock, self.reply_budget)
    }

    /// Wire the configured collaborators. Disabled search answers with the
    /// fallback text; recording needs both generative and warehouse.
    pub fn from_config(config: &Config, sender: Arc<dyn ReplySender>) -> Self {
        let policy = CallPolicy::from(&config.collaborators);
        let search: Arc<dyn SearchService> = if config.search.enabled {
            Arc::new(DiscoveryEngineSearch::new(&config.search, &config.google))
        } else {
            Arc::new(DisabledSearch)
        };
        let dispatcher = Self::new(sender, search, policy)
            .with_reply_budget(config.collaborators.reply_budget());
        if config.recording_enabled() {
            info!(
                "shift recording enabled (table {}.{})",
                config.warehouse.dataset, config.warehouse.table
            );
            dispatcher.with_recorder(ShiftRecorder::new(
                Arc::new(VertexGenerative::new(&config.generative, &config.google)),
                Arc::new(BigQueryWarehouse::new(&config.warehouse, &config.google)),
                config.warehouse.table.clone(),
                policy,
            ))
        } else {
            dispatcher
        }
    }

    /// Handle a batch: payloads are prepared concurrently, then replies go
    /// out in delivery order.
    pub async fn dispatch_batch(
        &self,
        events: Vec<Event>,
        ctx: &RequestContext,
    ) -> Vec<DispatchOutcome> {
        let prepared = join_all(events.into_iter().map(|event| self.prepare(event, ctx))).await;
        let mut outcomes = Vec::with_capacity(prepared.len());
        for item in prepared {
            outcomes.push(self.deliver(item).await);
        }
        outcomes
    }

    pub async fn dispatch(&self, event: Event, ctx: &RequestContext) -> DispatchOutcome {
        let prepared = self.prepare(event, ctx).await;
        self.deliver(prepared).await
    }

    async fn prepare(&self, event: Event, ctx: &RequestContext) -> Prepared {
        metrics::counter!("shiftline_events_total", "kind" => event.kind()).increment(1);
        debug!(
            "dispatching {} event from {}",
            event.kind(),
            event.user_id().unwrap_or("-")
        );
        match event {
            Event::TextMessage(ev) => {
                let Some(route) = self.routes.iter().find(|r| r.matcher.matches(&ev.text)) else {
                    info!("no route for text message ({} chars)", ev.text.chars().count());
                    return Prepared::Ignored("no matching route".to_string());
                };
                let handler = &route.handler;
                let payload = match handler.handle(&ev.text, ctx).await {
                    Ok(payload) => payload,
                    Err(e) => recover(handler.intent(), &e, handler.failure_text()),
                };
                Prepared::Reply {
                    intent: handler.intent(),
                    token: ev.reply_token,
                    payload,
                }
            }
            Event::Postback(ev) => match PostbackIntent::parse(&ev.data) {
                Ok(intent) => {
                    let payload = match self.handle_postback(&intent, &ev, ctx).await {
                        Ok(payload) => payload,
                        Err(e) => recover(intent.name(), &e, postback_failure_text(&intent)),
                    };
                    Prepared::Reply {
                        intent: intent.name(),
                        token: ev.reply_token,
                        payload,
                    }
                }
                Err(reason) => {
                    info!("ignoring postback: {}", reason);
                    metrics::counter!("shiftline_postback_ignored_total").increment(1);
                    Prepared::Ignored(reason.to_string())
                }
            },
        }
    }

    async fn deliver(&self, prepared: Prepared) -> DispatchOutcome {
        match prepared {
            Prepared::Reply {
                intent,
                token,
                payload,
            } => self.send(intent, token, payload).await,
            Prepared::Ignored(reason) => DispatchOutcome::Ignored { reason },
        }
    }

    async fn handle_postback(
        &self,
        intent: &PostbackIntent,
        ev: &PostbackEvent,
        ctx: &RequestContext,
    ) -> ShiftlineResult<ReplyPayload> {
        match intent {
            PostbackIntent::ShiftInput { item_id } => {
                let Some(selected) = &ev.selected_datetime else {
                    return Ok(build_text(SHIFT_INPUT_ACK_TEXT));
                };
                if let Some(recorder) = &self.recorder {
                    let request = ShiftRequest {
                        user_id: ev.user_id.clone(),
                        item_id: item_id.clone(),
                        selected: selected.clone(),
                    };
                    recorder.record(&request, ctx.reply_deadline).await?;
                }
                Ok(build_text(format!(
                    "{}{}",
                    SHIFT_ACCEPTED_PREFIX,
                    format_selected(selected)
                )))
            }
            PostbackIntent::SurveyDecline => Ok(build_text(SURVEY_DECLINED_TEXT)),
        }
    }

    async fn send(
        &self,
        intent: &'static str,
        token: ReplyToken,
        payload: ReplyPayload,
    ) -> DispatchOutcome {
        let kind = payload.kind();
        match self.sender.reply(token, payload).await {
            Ok(()) => {
                info!("replied to {} with {}", intent, kind);
                DispatchOutcome::Replied { intent, kind }
            }
            Err(e) => {
                error!("reply for {} failed: {}", intent, e);
                metrics::counter!("shiftline_send_failures_total").increment(1);
                DispatchOutcome::SendFailed { intent }
            }
        }
    }
}

/// The built-in table: greeting, schedule, survey start, survey answer, then
/// search for everything else.
pub fn default_routes(search: Arc<dyn SearchService>, policy: CallPolicy) -> Vec<TextRoute> {
    vec![
        TextRoute::new(Matcher::Exact(GREETING_PHRASE), Arc::new(GreetingHandler)),
        TextRoute::new(Matcher::Exact(SCHEDULE_PHRASE), Arc::new(ScheduleHandler)),
        TextRoute::new(
            Matcher::Exact(SURVEY_START_PHRASE),
            Arc::new(SurveyStartHandler),
        ),
        TextRoute::new(
            Matcher::Exact(SURVEY_ANSWER_PHRASE),
            Arc::new(SurveyAnswerHandler),
        ),
        TextRoute::new(Matcher::Any, Arc::new(SearchHandler::new(search, policy))),
    ]
}

/// Turn a handler failure into a plain-text reply so the user never gets
/// silence.
fn recover(intent: &'static str, err: &ShiftlineError, failure_text: &str) -> ReplyPayload {
    match err {
        ShiftlineError::TemplateTooLarge(detail) => {
            error!("{} reply exceeds template limits: {}", intent, detail);
            metrics::counter!("shiftline_template_fallback_total").increment(1);
            build_text(TEMPLATE_FALLBACK_TEXT)
        }
        ShiftlineError::Collaborator { service, .. } => {
            error!("{} collaborator failed for {}: {}", service, intent, err);
            metrics::counter!("shiftline_collaborator_failures_total", "service" => *service)
                .increment(1);
            build_text(failure_text)
        }
        _ => {
            error!("{} handler failed: {}", intent, err);
            build_text(GENERIC_FAILURE_TEXT)
        }
    }
}

fn postback_failure_text(intent: &PostbackIntent) -> &'static str {
    match intent {
        PostbackIntent::ShiftInput { .. } => SHIFT_RECORD_FAILED_TEXT,
        PostbackIntent::SurveyDecline => GENERIC_FAILURE_TEXT,
    }
}

/// Render a picker value as `M月D日 HH:MM` (or `M月D日` for a date); other
/// values are echoed as received.
pub fn format_selected(raw: &str) -> String {
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M") {
        return dt.format("%-m月%-d日 %H:%M").to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format("%-m月%-d日").to_string();
    }
    raw.to_string()
}

#[cfg(test)]
mod tests;
