//! Vertex AI Gemini `generateContent` client.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

use super::{GenerativeService, post_json};
use crate::config::{GenerativeConfig, GoogleConfig};
use crate::errors::{ShiftlineError, ShiftlineResult};

const SERVICE: &str = "generative";

pub struct VertexGenerative {
    access_token: String,
    base_url: String,
    model_path: String,
    client: Client,
}

impl VertexGenerative {
    pub fn new(config: &GenerativeConfig, google: &GoogleConfig) -> Self {
        Self::with_base_url(
            config,
            google,
            format!("https://{}-aiplatform.googleapis.com", config.location),
        )
    }

    fn with_base_url(config: &GenerativeConfig, google: &GoogleConfig, base_url: String) -> Self {
        Self {
            access_token: google.access_token.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model_path: format!(
                "projects/{}/locations/{}/publishers/google/models/{}",
                config.project_id, config.location, config.model
            ),
            client: crate::utils::http::default_http_client(),
        }
    }

    fn request_body(prompt_context: &str, user_input: &str) -> Value {
        json!({
            "systemInstruction": {"parts": [{"text": prompt_context}]},
            "contents": [{"role": "user", "parts": [{"text": user_input}]}],
            "generationConfig": {"temperature": 0.0},
        })
    }

    fn parse_response(json: &Value) -> ShiftlineResult<String> {
        let text: String = json["candidates"]
            .as_array()
            .and_then(|arr| arr.first())
            .and_then(|c| c["content"]["parts"].as_array())
            .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
            .unwrap_or_default();

        let text = strip_code_fence(&text);
        if text.is_empty() {
            let reason = json["candidates"][0]["finishReason"]
                .as_str()
                .or_else(|| json["promptFeedback"]["blockReason"].as_str())
                .unwrap_or("no candidates");
            return Err(ShiftlineError::collaborator(
                SERVICE,
                format!("empty generation ({})", reason),
            ));
        }
        Ok(text.to_string())
    }
}

/// Models often wrap statements in a markdown fence; keep only the body.
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string (```sql)
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().trim_end_matches("```").trim()
}

#[async_trait]
impl GenerativeService for VertexGenerative {
    async fn generate(&self, prompt_context: &str, user_input: &str) -> ShiftlineResult<String> {
        let url = format!("{}/v1/{}:generateContent", self.base_url, self.model_path);
        let json = post_json(
            SERVICE,
            &self.client,
            &url,
            &self.access_token,
            &Self::request_body(prompt_context, user_input),
        )
        .await?;
        let text = Self::parse_response(&json)?;
        debug!("generated {} chars", text.len());
        Ok(text)
    }
}
