//! Built-in text intents.

use std::sync::Arc;

use async_trait::async_trait;

use super::catalog::{
    NO_RESULT_TEXT, SURVEY_ANSWER_PHRASE, SURVEY_CONFIRM_PROMPT, SURVEY_DECLINE_DATA,
    SURVEY_NO_LABEL, SURVEY_YES_LABEL, greeting_columns, survey_answer_text,
};
use super::{RequestContext, TextHandler};
use crate::collaborators::{CallPolicy, SearchService};
use crate::errors::ShiftlineResult;
use crate::line::{ReplyPayload, build_carousel, build_confirm, build_text};
use crate::schedule::{format_schedule, next_month_schedule};

pub struct GreetingHandler;

#[async_trait]
impl TextHandler for GreetingHandler {
    fn intent(&self) -> &'static str {
        "greeting"
    }

    async fn handle(&self, _text: &str, ctx: &RequestContext) -> ShiftlineResult<ReplyPayload> {
        build_carousel(greeting_columns(&ctx.now))
    }
}

pub struct ScheduleHandler;

#[async_trait]
impl TextHandler for ScheduleHandler {
    fn intent(&self) -> &'static str {
        "schedule"
    }

    async fn handle(&self, _text: &str, ctx: &RequestContext) -> ShiftlineResult<ReplyPayload> {
        let entries = next_month_schedule(ctx.now.date_naive());
        Ok(build_text(format_schedule(&entries)))
    }
}

pub struct SurveyStartHandler;

#[async_trait]
impl TextHandler for SurveyStartHandler {
    fn intent(&self) -> &'static str {
        "survey_start"
    }

    async fn handle(&self, _text: &str, _ctx: &RequestContext) -> ShiftlineResult<ReplyPayload> {
        build_confirm(
            SURVEY_CONFIRM_PROMPT,
            SURVEY_YES_LABEL,
            SURVEY_ANSWER_PHRASE,
            SURVEY_NO_LABEL,
            SURVEY_DECLINE_DATA,
        )
    }
}

pub struct SurveyAnswerHandler;

#[async_trait]
impl TextHandler for SurveyAnswerHandler {
    fn intent(&self) -> &'static str {
        "survey_answer"
    }

    async fn handle(&self, _text: &str, _ctx: &RequestContext) -> ShiftlineResult<ReplyPayload> {
        Ok(build_text(survey_answer_text()))
    }
}

/// Catch-all: answer with the search collaborator's summary.
pub struct SearchHandler {
    search: Arc<dyn SearchService>,
    policy: CallPolicy,
}

impl SearchHandler {
    pub fn new(search: Arc<dyn SearchService>, policy: CallPolicy) -> Self {
        Self { search, policy }
    }
}

#[async_trait]
impl TextHandler for SearchHandler {
    fn intent(&self) -> &'static str {
        "search"
    }

    async fn handle(&self, text: &str, ctx: &RequestContext) -> ShiftlineResult<ReplyPayload> {
        let result = self
            .policy
            .run("search", ctx.reply_deadline, || self.search.search(text))
            .await?;
        Ok(build_text(
            result
                .summary_text
                .unwrap_or_else(|| NO_RESULT_TEXT.to_string()),
        ))
    }

    fn failure_text(&self) -> &'static str {
        NO_RESULT_TEXT
    }
}
