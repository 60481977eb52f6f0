//! Failures of a reasoning-service call, as the retry layer sees them.

use std::time::Duration;

#[derive(Clone, Debug, thiserror::Error)]
pub enum GatewayError {
    /// Key missing, revoked or out of credit.
    #[error("access denied ({status}): {body}")]
    AccessDenied { status: u16, body: String },
    /// The provider refused the request itself: unknown model, bad schema, oversized image.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },
    /// Provider-side failure or gateway timeout; worth another try.
    #[error("model unavailable ({status}): {body}")]
    Unavailable { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),

    #[error("timeout after {0:?}")]
    Timeout(Duration),
    /// Too many consecutive failures; calls are refused until the cooldown ends.
    #[error("circuit open, model temporarily disabled")]
    CircuitOpen,
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Unavailable { .. } | Self::Network(_)
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::AccessDenied { .. } => "access_denied",
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidResponse(_) => "invalid_response",
            Self::RateLimited { .. } => "rate_limited",
            Self::Unavailable { .. } => "unavailable",
            Self::Network(_) => "network",
            Self::Timeout(_) => "timeout",
            Self::CircuitOpen => "circuit_open",
        }
    }

    /// Classify a non-success status from Gemini or an OpenAI-compatible server.
    ///
    /// Gemini answers 400 for schema problems, 403 for a bad key, 404 for an
    /// unknown model and 429 with a `RetryInfo` detail when quota runs out.
    /// OpenAI-compatible routers add 402 for exhausted credit and 408 when an
    /// upstream worker timed out.
    pub fn from_status(status: u16, body: String, retry_after: Option<Duration>) -> Self {
        match status {
            401 | 402 | 403 => Self::AccessDenied { status, body },
            429 => Self::RateLimited { retry_after },
            408 | 500..=599 => Self::Unavailable { status, body },
            400 | 404 | 413 | 422 => Self::InvalidRequest(format!("{status}: {body}")),
            _ => Self::InvalidRequest(format!("unexpected status {status}: {body}")),
        }
    }
}
