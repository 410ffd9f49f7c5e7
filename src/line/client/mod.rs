use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::LineConfig;
use crate::errors::{ShiftlineError, ShiftlineResult};
use crate::line::events::ReplyToken;
use crate::line::messages::ReplyPayload;
use crate::utils::http::{
    MAX_ERROR_BODY_BYTES, default_http_client, error_message_from_body, limited_text,
};

/// The platform's single-reply-per-token send operation.
///
/// Taking the token by value makes a second reply for the same event
/// impossible to write.
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn reply(&self, token: ReplyToken, payload: ReplyPayload) -> ShiftlineResult<()>;
}

pub struct LineClient {
    access_token: String,
    base_url: String,
    client: Client,
}

impl LineClient {
    pub fn new(config: &LineConfig) -> Self {
        Self {
            access_token: config.channel_access_token.clone(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            client: default_http_client(),
        }
    }
}

#[async_trait]
impl ReplySender for LineClient {
    async fn reply(&self, token: ReplyToken, payload: ReplyPayload) -> ShiftlineResult<()> {
        let url = format!("{}/v2/bot/message/reply", self.base_url);
        let body = json!({
            "replyToken": token.as_str(),
            "messages": [payload.to_message()],
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ShiftlineError::Send(format!("reply request failed: {}", e)))?;

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("x-line-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-")
            .to_string();

        if status.is_success() {
            debug!(
                "reply sent: kind={}, line_request_id={}",
                payload.kind(),
                request_id
            );
            return Ok(());
        }

        let text = limited_text(resp, MAX_ERROR_BODY_BYTES)
            .await
            .unwrap_or_default();
        let message = error_message_from_body(&text);
        warn!(
            "reply rejected: status={}, line_request_id={}, message={}",
            status, request_id, message
        );
        Err(ShiftlineError::Send(format!("HTTP {}: {}", status, message)))
    }
}
