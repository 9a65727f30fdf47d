//! Error taxonomy shared by every component.
//!
//! Mirrors the shape of `daemon::security::rate_limiter::RateLimitError` in
//! the teacher crate: one `thiserror` enum per concern area would scatter the
//! HTTP-status mapping the dispatcher needs, so the whole taxonomy from the
//! spec lives here instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("model not recognized by any channel: {0}")]
    InvalidModel(String),

    #[error("no channel available to serve this request")]
    NoChannelAvailable,

    #[error("invalid quota period: {0}")]
    InvalidQuotaPeriod(String),

    #[error("{dimension} quota exceeded: {used}/{cap}")]
    QuotaExceeded {
        dimension: String,
        used: String,
        cap: String,
    },

    #[error("insufficient permissions{}", .scope.as_ref().map(|s| format!(" (missing {s})")).unwrap_or_default())]
    InsufficientPermissions { scope: Option<String> },

    #[error("cannot edit a user who holds owner privileges")]
    CannotEditOwner,

    #[error("invalid association pattern: {0}")]
    InvalidAssociationPattern(String),

    #[error("upstream error (status {status}): {message}")]
    UpstreamError { status: u16, message: String },

    #[error("request canceled by caller")]
    Canceled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// HTTP status this error should surface as, per the dispatcher's
    /// error-classification surface (spec §6/§7).
    pub fn http_status(&self) -> u16 {
        match self {
            GatewayError::InvalidRequest(_) => 400,
            GatewayError::InvalidModel(_) => 400,
            GatewayError::NoChannelAvailable => 400,
            GatewayError::InvalidQuotaPeriod(_) => 400,
            GatewayError::QuotaExceeded { .. } => 429,
            GatewayError::InsufficientPermissions { .. } => 403,
            GatewayError::CannotEditOwner => 403,
            GatewayError::InvalidAssociationPattern(_) => 500,
            GatewayError::UpstreamError { status, .. } => *status,
            GatewayError::Canceled => 499,
            GatewayError::Internal(_) => 500,
        }
    }

    /// True for errors the dispatcher should short-circuit on (never retry
    /// against a different channel).
    pub fn is_client_class(&self) -> bool {
        (400..500).contains(&self.http_status())
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
