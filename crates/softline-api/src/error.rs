use thiserror::Error;

/// Top-level error type for the `softline-api` crate.
///
/// Covers transport-level failure modes only. Business outcomes of the
/// authentication flow (wrong credentials, missing second factor, rate
/// limiting) are *replies*, not errors — see [`crate::types::AuthenticateReply`].
/// `softline-core` maps these into its own taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The platform rejected the request's authentication context (HTTP 401).
    #[error("Unauthorized -- API token missing, expired, or revoked")]
    Unauthorized,

    /// Non-success status with no structured body we recognize.
    #[error("Platform API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error means the current session token is no
    /// longer accepted and re-authentication might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Returns `true` if this is a transient transport error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Unauthorized => Some(401),
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
