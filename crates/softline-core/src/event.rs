// ── Outbound session events ──
//
// Typed messages sent over a broadcast channel, replacing event-emitter
// wiring into a global app object. Notification collaborators receive only
// the structured kind plus parameters -- never prebuilt message text; the
// display layer owns wording and localization.

/// Events emitted by the session authenticator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A login attempt bound successfully; downstream services (telephony
    /// registration, presence, etc.) should (re)initialize. Raised exactly
    /// once per successful bind, never on refresh-only calls.
    ServicesInit,
    /// The session was cleared, either by explicit logout or because an
    /// incidental call proved the session invalid.
    LoggedOut,
    /// Something the user should be told about, as a structured kind.
    Notice(Notice),
}

/// Structured notification kinds for the display collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    InvalidCredentials,
    SecondFactorRequired,
    InvalidSecondFactor,
    RateLimited {
        /// The retry time exactly as the platform stated it.
        retry_at: String,
    },
    Ineligible {
        reason: String,
    },
    PasswordChangeRequired {
        /// Portal deep link where the password can be changed.
        portal_url: String,
    },
    AccountSelectionFailed {
        status: u16,
    },
}
