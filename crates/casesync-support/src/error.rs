use std::time::Duration;

use casesync_core::RateLimitSignal;
use thiserror::Error;

#[derive(Debug, Error)]
/// Enumerates failures raised at the support-case API boundary.
pub enum SupportApiError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("failed to parse credentials file {path}: {message}")]
    CredentialsParse { path: String, message: String },
    #[error("support api rate limited request (status {status}, {classification}): {message}")]
    RateLimited {
        status: u16,
        classification: String,
        message: String,
        retry_after: Option<Duration>,
    },
    #[error(
        "support api requires a paid support plan (Business, Enterprise On-Ramp, or Enterprise) to manage cases: {message}"
    )]
    SubscriptionRequired { message: String },
    #[error("support api request failed (status {status}, {classification}): {message}")]
    Upstream {
        status: u16,
        classification: String,
        message: String,
    },
    #[error("support api transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to decode support api {operation} response: {source}")]
    Decode {
        operation: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to sign support api request: {0}")]
    Signing(String),
}

impl SupportApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { status, .. } | Self::Upstream { status, .. } => Some(*status),
            Self::Transport(error) => error.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    pub fn classification(&self) -> Option<&str> {
        match self {
            Self::RateLimited { classification, .. } | Self::Upstream { classification, .. } => {
                Some(classification.as_str())
            }
            Self::SubscriptionRequired { .. } => Some("SubscriptionRequiredException"),
            _ => None,
        }
    }
}

impl RateLimitSignal for SupportApiError {
    fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    fn wait_hint(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
