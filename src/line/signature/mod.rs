use axum::body::Bytes;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::errors::{ShiftlineError, ShiftlineResult};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the base64 HMAC-SHA256 of the request body.
pub const SIGNATURE_HEADER: &str = "x-line-signature";

/// Check a LINE callback signature.
///
/// The header is the base64-encoded HMAC-SHA256 of the raw body keyed by the
/// channel secret. Malformed base64, a wrong length or a mismatch all yield
/// `false`; this never panics on attacker-controlled input.
pub fn verify(raw_body: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let Ok(provided) = BASE64.decode(signature_header.as_bytes()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(raw_body);
    let expected = mac.finalize().into_bytes();

    expected.as_slice().ct_eq(provided.as_slice()).into()
}

/// Compute the signature LINE would send for `raw_body`.
pub fn sign(raw_body: &[u8], secret: &[u8]) -> String {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return String::new();
    };
    mac.update(raw_body);
    BASE64.encode(mac.finalize().into_bytes())
}

/// A callback body whose signature has been checked.
///
/// Only [`VerifiedPayload::verify`] constructs one, so holding a value proves
/// the body came from the platform.
#[derive(Debug, Clone)]
pub struct VerifiedPayload {
    body: Bytes,
}

impl VerifiedPayload {
    pub fn verify(
        body: Bytes,
        signature_header: Option<&str>,
        secret: &[u8],
    ) -> ShiftlineResult<Self> {
        let Some(signature) = signature_header else {
            return Err(ShiftlineError::Authentication(format!(
                "missing {} header",
                SIGNATURE_HEADER
            )));
        };
        if !verify(&body, signature, secret) {
            return Err(ShiftlineError::Authentication(
                "signature mismatch".to_string(),
            ));
        }
        Ok(Self { body })
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}
