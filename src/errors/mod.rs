use thiserror::Error;

/// Typed error hierarchy for shiftline.
///
/// Use at module boundaries (signature checks, event decoding, template
/// assembly, collaborator calls, platform sends). Internal/leaf functions can
/// continue using `anyhow::Result`; the `Internal` variant converts via `?`.
#[derive(Debug, Error)]
pub enum ShiftlineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Template too large: {0}")]
    TemplateTooLarge(String),

    #[error("Collaborator error: {service}: {message}")]
    Collaborator {
        service: &'static str,
        message: String,
        retryable: bool,
    },

    #[error("Send failed: {0}")]
    Send(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Convenience alias for results using `ShiftlineError`.
pub type ShiftlineResult<T> = std::result::Result<T, ShiftlineError>;

impl ShiftlineError {
    /// Whether a collaborator call failing with this error may be attempted again.
    ///
    /// Platform sends are never retryable: a reply token is single-use.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Collaborator { retryable, .. } => *retryable,
            Self::Config(_)
            | Self::Authentication(_)
            | Self::MalformedPayload(_)
            | Self::TemplateTooLarge(_)
            | Self::Send(_)
            | Self::Internal(_) => false,
        }
    }

    pub(crate) fn collaborator(service: &'static str, message: impl Into<String>) -> Self {
        Self::Collaborator {
            service,
            message: message.into(),
            retryable: false,
        }
    }

    pub(crate) fn transient(service: &'static str, message: impl Into<String>) -> Self {
        Self::Collaborator {
            service,
            message: message.into(),
            retryable: true,
        }
    }
}
