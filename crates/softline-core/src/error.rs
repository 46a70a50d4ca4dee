// ── Core error types ──
//
// Consumers of softline-core never see raw transport errors; the
// `From<softline_api::Error>` impl translates them into domain-appropriate
// variants. Business outcomes of a login attempt are NOT errors -- they are
// `LoginOutcome` variants. This enum covers everything that aborts an
// operation instead of resolving it.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Network/timeout/unexpected-shape failure talking to the platform.
    /// A login attempt that ends here marks the session `Failed`; no
    /// partial session state is committed.
    #[error("Transport failure: {message}")]
    Transport { message: String },

    /// The platform no longer accepts the installed API token.
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    /// The attempt was issued under a session identity that has since been
    /// replaced; its result was discarded without mutating the new session.
    #[error("Attempt superseded by a session change")]
    Superseded,

    /// The operation requires an authenticated session and none is active.
    #[error("No authenticated session")]
    NotAuthenticated,

    /// The platform rejected an explicit account switch; the previous
    /// binding is unchanged.
    #[error("Account selection rejected (HTTP {status})")]
    AccountSelection { status: u16 },

    /// Autologin token refresh failed for a reason other than an expired
    /// session; session state is untouched.
    #[error("Autologin token refresh failed: {message}")]
    TokenRefresh { message: String },

    /// The persisted-state collaborator failed a durable write or a load.
    #[error("State store failure: {message}")]
    Store { message: String },

    /// Invalid configuration or caller input.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from wire-layer errors ────────────────────────────────

impl From<softline_api::Error> for CoreError {
    fn from(err: softline_api::Error) -> Self {
        match err {
            softline_api::Error::Unauthorized => CoreError::SessionExpired,
            softline_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            other => CoreError::Transport {
                message: other.to_string(),
            },
        }
    }
}
