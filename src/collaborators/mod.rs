//! External services consumed on the reply path.
//!
//! Each collaborator is a narrow async trait with a Google Cloud REST client
//! behind it. Calls go through [`CallPolicy`]: every attempt is bounded by a
//! timeout and by the event's reply deadline, with at most one retry.

pub mod generative;
pub mod search;
pub mod warehouse;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

use crate::config::CollaboratorPolicyConfig;
use crate::errors::{ShiftlineError, ShiftlineResult};

pub use generative::VertexGenerative;
pub use search::DiscoveryEngineSearch;
pub use warehouse::BigQueryWarehouse;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResult {
    pub summary_text: Option<String>,
}

#[async_trait]
pub trait SearchService: Send + Sync {
    async fn search(&self, query: &str) -> ShiftlineResult<SearchResult>;
}

#[async_trait]
pub trait GenerativeService: Send + Sync {
    /// Produce text from a fixed prompt context plus the user's input.
    async fn generate(&self, prompt_context: &str, user_input: &str) -> ShiftlineResult<String>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub rows: Vec<Vec<Value>>,
    pub affected_rows: Option<u64>,
    pub job_id: Option<String>,
    /// The job was accepted but had not finished when the call returned.
    pub pending: bool,
}

#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Run `statement`. Every attempt for the same logical write carries the
    /// same `request_id`, so the warehouse runs it at most once.
    async fn execute(&self, statement: &str, request_id: &str) -> ShiftlineResult<QueryResult>;
}

/// Stand-in used when search is disabled: always "no result".
pub struct DisabledSearch;

#[async_trait]
impl SearchService for DisabledSearch {
    async fn search(&self, _query: &str) -> ShiftlineResult<SearchResult> {
        Ok(SearchResult::default())
    }
}

/// A retry with less time than this left before the deadline is skipped.
const MIN_RETRY_WINDOW: Duration = Duration::from_millis(250);

/// Timeout and retry bounds applied to every collaborator call.
#[derive(Debug, Clone, Copy)]
pub struct CallPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self::from(&CollaboratorPolicyConfig::default())
    }
}

impl From<&CollaboratorPolicyConfig> for CallPolicy {
    fn from(config: &CollaboratorPolicyConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries.min(1),
        }
    }
}

impl CallPolicy {
    /// Run `call`, abandoning an attempt after `timeout` or at `deadline`,
    /// whichever comes first. A retryable failure is retried once if time
    /// remains before the deadline.
    pub async fn run<T, F, Fut>(
        &self,
        service: &'static str,
        deadline: Instant,
        mut call: F,
    ) -> ShiftlineResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ShiftlineResult<T>>,
    {
        let attempts = self.max_retries.min(1) + 1;
        let mut attempt = 1;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(ShiftlineError::collaborator(
                    service,
                    "reply deadline passed before the call",
                ));
            }
            let budget = self.timeout.min(remaining);
            let result = match tokio::time::timeout(budget, call()).await {
                Ok(result) => result,
                Err(_) => Err(ShiftlineError::transient(
                    service,
                    format!("timed out after {:?}", budget),
                )),
            };
            match result {
                Err(e) if e.is_retryable() && attempt < attempts => {
                    if deadline.saturating_duration_since(Instant::now()) < MIN_RETRY_WINDOW {
                        warn!(
                            "{} call failed too close to the reply deadline, not retrying: {}",
                            service, e
                        );
                        return Err(e);
                    }
                    warn!(
                        "{} call failed (attempt {}/{}), retrying: {}",
                        service, attempt, attempts, e
                    );
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

/// Map an HTTP error status to a collaborator error; 429 and 5xx are retryable.
pub(crate) fn status_error(
    service: &'static str,
    status: StatusCode,
    body: &str,
) -> ShiftlineError {
    let message = format!(
        "HTTP {}: {}",
        status,
        crate::utils::http::error_message_from_body(body)
    );
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        ShiftlineError::transient(service, message)
    } else {
        ShiftlineError::collaborator(service, message)
    }
}

/// Map a transport error; timeouts and connection failures are retryable.
pub(crate) fn transport_error(service: &'static str, err: &reqwest::Error) -> ShiftlineError {
    if err.is_timeout() || err.is_connect() {
        ShiftlineError::transient(service, err.to_string())
    } else {
        ShiftlineError::collaborator(service, err.to_string())
    }
}

/// Send a JSON POST with bearer auth and return the parsed JSON body.
pub(crate) async fn post_json(
    service: &'static str,
    client: &reqwest::Client,
    url: &str,
    access_token: &str,
    payload: &Value,
) -> ShiftlineResult<Value> {
    let resp = client
        .post(url)
        .bearer_auth(access_token)
        .json(payload)
        .send()
        .await
        .map_err(|e| transport_error(service, &e))?;

    let status = resp.status();
    if !status.is_success() {
        let body = crate::utils::http::limited_text(resp, crate::utils::http::MAX_ERROR_BODY_BYTES)
            .await
            .unwrap_or_default();
        return Err(status_error(service, status, &body));
    }
    resp.json::<Value>()
        .await
        .map_err(|e| ShiftlineError::collaborator(service, format!("invalid JSON response: {}", e)))
}
