//! Upstream gateway error taxonomy. Mirrors the transient/permanent split
//! used by `retry.rs` to decide whether a failure is worth another attempt.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("upstream rate limited: {0}")]
    RateLimited(String),

    #[error("upstream timed out: {0}")]
    Timeout(String),

    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    #[error("upstream rejected request: {0}")]
    BadRequest(String),

    #[error("upstream authentication failed: {0}")]
    Unauthorized(String),

    #[error("upstream object not found: {0}")]
    NotFound(String),

    #[error("upstream returned a malformed response: {0}")]
    MalformedResponse(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl GatewayError {
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::RateLimited(_) => "GATEWAY_RATE_LIMITED",
            GatewayError::Timeout(_) => "GATEWAY_TIMEOUT",
            GatewayError::Unavailable(_) => "GATEWAY_UNAVAILABLE",
            GatewayError::BadRequest(_) => "GATEWAY_BAD_REQUEST",
            GatewayError::Unauthorized(_) => "GATEWAY_UNAUTHORIZED",
            GatewayError::NotFound(_) => "GATEWAY_NOT_FOUND",
            GatewayError::MalformedResponse(_) => "GATEWAY_MALFORMED_RESPONSE",
            GatewayError::Transport(_) => "GATEWAY_TRANSPORT_ERROR",
        }
    }

    pub fn status_code_hint(&self) -> u16 {
        match self {
            GatewayError::RateLimited(_) => 429,
            GatewayError::Timeout(_) => 504,
            GatewayError::Unavailable(_) => 503,
            GatewayError::BadRequest(_) => 400,
            GatewayError::Unauthorized(_) => 401,
            GatewayError::NotFound(_) => 404,
            GatewayError::MalformedResponse(_) => 502,
            GatewayError::Transport(_) => 502,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::RateLimited(_)
                | GatewayError::Timeout(_)
                | GatewayError::Unavailable(_)
                | GatewayError::Transport(_)
        )
    }
}
