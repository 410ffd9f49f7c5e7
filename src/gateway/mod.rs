//! HTTP ingress for LINE callbacks.
//!
//! `POST /callback` verifies the signature over the raw body, decodes the
//! event batch and dispatches it; `GET /health` answers liveness probes.

use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::dispatch::{Clock, DispatchOutcome, Dispatcher};
use crate::line::{SIGNATURE_HEADER, VerifiedPayload, decode};

/// Max callback payload size: 1 MB.
const CALLBACK_MAX_BODY: usize = 1_048_576;

/// Shared, read-only state for the handlers.
#[derive(Clone)]
pub struct GatewayState {
    channel_secret: Arc<str>,
    dispatcher: Arc<Dispatcher>,
    clock: Arc<dyn Clock>,
}

impl GatewayState {
    pub fn new(channel_secret: &str, dispatcher: Arc<Dispatcher>, clock: Arc<dyn Clock>) -> Self {
        Self {
            channel_secret: Arc::from(channel_secret),
            dispatcher,
            clock,
        }
    }
}

/// Build the ingress router.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/callback", post(callback_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// GET /health: liveness probe.
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION
    }))
}

/// POST /callback: receive a batch of events from the platform.
async fn callback_handler(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let span = info_span!("callback", request_id = %Uuid::new_v4());

    if body.len() > CALLBACK_MAX_BODY {
        span.in_scope(|| warn!("callback payload too large ({} bytes)", body.len()));
        return StatusCode::PAYLOAD_TOO_LARGE.into_response();
    }

    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    let payload =
        match VerifiedPayload::verify(body, signature, state.channel_secret.as_bytes()) {
            Ok(payload) => payload,
            Err(e) => {
                span.in_scope(|| warn!("rejecting callback: {}", e));
                return (StatusCode::BAD_REQUEST, "Bad Request").into_response();
            }
        };

    let events = match decode(payload.body()) {
        Ok(events) => events,
        Err(e) => {
            span.in_scope(|| error!("verified callback could not be decoded: {}", e));
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    // One instant for the whole batch
    let ctx = state.dispatcher.context(state.clock.as_ref());
    span.in_scope(|| {
        debug!(
            "signature valid, {} event(s), payload_len={}",
            events.len(),
            payload.body().len()
        );
    });

    let dispatcher = state.dispatcher.clone();
    let task = tokio::spawn(
        async move { dispatcher.dispatch_batch(events, &ctx).await }.instrument(span.clone()),
    );

    match task.await {
        Ok(outcomes) => {
            span.in_scope(|| log_outcomes(&outcomes));
            (StatusCode::OK, "OK").into_response()
        }
        Err(e) => {
            span.in_scope(|| error!("dispatch task failed: {}", e));
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn log_outcomes(outcomes: &[DispatchOutcome]) {
    let replied = outcomes
        .iter()
        .filter(|o| matches!(o, DispatchOutcome::Replied { .. }))
        .count();
    let failed = outcomes
        .iter()
        .filter(|o| matches!(o, DispatchOutcome::SendFailed { .. }))
        .count();
    info!(
        "callback handled: {} event(s), {} replied, {} ignored, {} send failure(s)",
        outcomes.len(),
        replied,
        outcomes.len() - replied - failed,
        failed
    );
}

/// Bind the ingress and serve until the process receives Ctrl-C.
pub async fn start(host: &str, port: u16, state: GatewayState) -> Result<()> {
    let app = build_router(state);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("callback endpoint listening on http://{}/callback", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for shutdown signal: {}", e);
            }
            info!("shutting down");
        })
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests;
