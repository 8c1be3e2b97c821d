//! Error taxonomy for the scrape engine (spec §7).
//!
//! The API key must never reach one of these messages — every variant that
//! carries request context carries an endpoint path, never headers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error calling {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected status {status} from {endpoint}: {body_preview}")]
    Status {
        endpoint: String,
        status: u16,
        body_preview: String,
    },

    #[error("decoding response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("non-JSON response from {endpoint}: status {status}, body: {body_preview}")]
    NonJson {
        endpoint: String,
        status: u16,
        body_preview: String,
    },

    #[error("request to {endpoint} cancelled")]
    Cancelled { endpoint: String },

    #[error("authentication failed calling {endpoint}")]
    Auth { endpoint: String },

    #[error("client is closed")]
    Closed,

    #[error(transparent)]
    UrlBuild(#[from] UrlBuildError),
}

impl ClientError {
    /// §4.1: retry on transport errors, 5xx, and 429; never on 2xx, other
    /// 4xx, or cancellation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Transport { .. } | ClientError::Status { status: 429 | 500..=599, .. }
        )
    }

    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ClientError::Transport { endpoint, .. }
            | ClientError::Status { endpoint, .. }
            | ClientError::Decode { endpoint, .. }
            | ClientError::NonJson { endpoint, .. }
            | ClientError::Cancelled { endpoint }
            | ClientError::Auth { endpoint } => Some(endpoint),
            ClientError::Closed | ClientError::UrlBuild(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("server rejected all candidate API versions: {0:?}")]
    AllCandidatesRejected(Vec<&'static str>),

    #[error("authentication failed during version negotiation")]
    Auth,

    #[error("version negotiation cancelled before completion")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base url {raw:?}: {source}")]
    InvalidUrl {
        raw: String,
        #[source]
        source: url::ParseError,
    },

    #[error("base url scheme must be http or https, got {0:?}")]
    UnsupportedScheme(String),

    #[error("api key must not be empty")]
    MissingApiKey,

    #[error("{field} must be a positive duration")]
    NonPositiveDuration { field: &'static str },

    #[error(
        "tls-insecure was requested but NBU_EXPORTER_ALLOW_INSECURE_TLS was not set; \
         refusing to disable certificate verification silently"
    )]
    InsecureTlsNotAcknowledged,

    #[error("retry max-attempts must be at least 1")]
    InvalidRetryParams,
}

#[derive(Debug, Error)]
#[error("failed to build request url: {0}")]
pub struct UrlBuildError(pub String);
