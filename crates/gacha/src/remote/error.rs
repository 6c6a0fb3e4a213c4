//! Errors from the remote API

/// Error returned by a [`RemoteApi`](super::RemoteApi) call
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The service answered with an application-level error code
    #[error("{message} (code {code})")]
    Api { code: i64, message: String },

    /// The service answered with a non-success HTTP status
    #[error("HTTP status {status}")]
    Http { status: u16 },

    /// The request never completed (connection, TLS, timeout)
    #[error("request failed: {0}")]
    Transport(ureq::Error),

    /// The response body was not what we expected
    #[error("malformed response: {0}")]
    Decode(String),
}

impl FetchError {
    /// API code the services use for an expired or foreign token
    pub const CODE_CREDENTIAL_INVALID: i64 = -1;

    pub fn api(code: i64, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Whether the access token was rejected
    pub fn is_credential_invalid(&self) -> bool {
        match self {
            Self::Api { code, .. } => *code == Self::CODE_CREDENTIAL_INVALID,
            Self::Http { status } => matches!(status, 401 | 403),
            _ => false,
        }
    }

    /// Whether repeating the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Http { status } => matches!(status, 408 | 429 | 500..=599),
            Self::Api { .. } | Self::Decode(_) => false,
        }
    }
}

impl From<ureq::Error> for FetchError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(status) => Self::Http { status },
            ureq::Error::Json(err) => Self::Decode(err.to_string()),
            other => Self::Transport(other),
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
