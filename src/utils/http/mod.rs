use anyhow::{Result, bail};
use reqwest::{Client, Response};
use std::time::Duration;

/// Cap on error bodies read back from the platform or a collaborator (64 KB).
pub const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;

/// Build a `reqwest::Client` with standard timeouts (10 s connect, 30 s overall).
///
/// Falls back to the default client if the builder fails.
pub fn default_http_client() -> Client {
    http_client_with_timeout(Duration::from_secs(30))
}

/// Build a `reqwest::Client` whose overall timeout is `timeout`.
pub fn http_client_with_timeout(timeout: Duration) -> Client {
    Client::builder()
        .connect_timeout(Duration::from_secs(10).min(timeout))
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Download a response body as bytes with a size limit.
///
/// Rejects up front when `Content-Length` exceeds the limit, otherwise streams
/// and truncates at the limit. Returns `(bytes, was_truncated)`.
pub async fn limited_body(resp: Response, max_bytes: usize) -> Result<(Vec<u8>, bool)> {
    if let Some(cl) = resp.content_length()
        && cl as usize > max_bytes
    {
        bail!(
            "response body too large: Content-Length {} exceeds limit {}",
            cl,
            max_bytes
        );
    }

    let mut buf = Vec::new();
    let mut stream = resp;
    while let Some(chunk) = stream.chunk().await? {
        if buf.len() + chunk.len() > max_bytes {
            let remaining = max_bytes.saturating_sub(buf.len());
            buf.extend_from_slice(&chunk[..remaining]);
            return Ok((buf, true));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok((buf, false))
}

/// Same as [`limited_body`] but lossy-decodes to a `String` and appends a
/// `\n[truncated]` marker when the body was cut.
pub async fn limited_text(resp: Response, max_bytes: usize) -> Result<String> {
    let (bytes, truncated) = limited_body(resp, max_bytes).await?;
    let mut text = String::from_utf8_lossy(&bytes).into_owned();
    if truncated {
        text.push_str("\n[truncated]");
    }
    Ok(text)
}

/// Extract a human-readable message from a JSON error body.
///
/// Understands both `{"message": ...}` (LINE) and `{"error": {"message": ...}}`
/// (Google APIs); falls back to the raw text.
pub fn error_message_from_body(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(msg) = json["error"]["message"].as_str() {
            return msg.to_string();
        }
        if let Some(msg) = json["message"].as_str() {
            return msg.to_string();
        }
    }
    body.trim().to_string()
}

#[cfg(test)]
mod tests;
