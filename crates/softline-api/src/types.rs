// Wire models for the platform API.
//
// Field sets mirror what the platform actually sends; everything the flow
// doesn't consume is left out. Validation-error bodies are loosely shaped
// (per-field string arrays), so those fields all carry `#[serde(default)]`.

use serde::Deserialize;

// ── Authentication ──────────────────────────────────────────────────

/// Outcome of the credential exchange at the wire level.
///
/// `Rejected` is not an error: interpreting the rejection (bad credentials
/// vs. missing second factor vs. rate limit) is the caller's business logic,
/// applied with a defined precedence.
#[derive(Debug)]
pub enum AuthenticateReply {
    /// Credentials accepted; the platform issued an API token.
    Issued { api_token: String },
    /// Credentials not accepted; carries whatever structure the body had.
    Rejected(AuthRejection),
}

/// A non-success credential-exchange response, parsed but not interpreted.
#[derive(Debug, Default)]
pub struct AuthRejection {
    pub status: u16,
    /// Per-field validation errors, when the body carried them.
    pub field_errors: Option<ApiTokenFieldErrors>,
    /// Free-form error message, when the body carried one (rate limiting).
    pub error_message: Option<String>,
}

/// Per-field validation errors from the token endpoint.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ApiTokenFieldErrors {
    #[serde(default)]
    pub email: Vec<String>,
    #[serde(default)]
    pub password: Vec<String>,
    #[serde(default)]
    pub two_factor_token: Vec<String>,
}

impl ApiTokenFieldErrors {
    /// First validation message on the second-factor field, if any.
    pub fn two_factor_message(&self) -> Option<&str> {
        self.two_factor_token.first().map(String::as_str)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiTokenIssuedBody {
    pub api_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AuthFailureBody {
    #[serde(default)]
    pub apitoken: Option<ApiTokenFieldErrors>,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub message: String,
}

// ── Profile ─────────────────────────────────────────────────────────

/// Outcome of the profile fetch at the wire level.
#[derive(Debug)]
pub enum ProfileReply {
    /// An entitled platform client user.
    Profile(RawProfile),
    /// Partner or otherwise non-client user; telephony features are
    /// unavailable for this account type.
    NotEntitled,
    /// The platform refuses service until the password is changed in the
    /// vendor portal.
    PasswordChangeRequired,
}

/// Profile fields as the platform sends them.
#[derive(Debug, Clone, Deserialize)]
pub struct RawProfile {
    /// Reference to the owning client resource; absent for partner users.
    #[serde(default)]
    pub client: Option<String>,
    pub id: u64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub preposition: String,
    #[serde(default)]
    pub last_name: String,
    /// SIP registration secret derived for this user.
    #[serde(default)]
    pub token: Option<String>,
    /// The account the user selected in the portal, when one is set.
    #[serde(default)]
    pub selected_account: Option<RawAccount>,
}

// ── Accounts ────────────────────────────────────────────────────────

/// A telephony account record as the platform sends it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAccount {
    pub id: u64,
    pub internal_number: u64,
    #[serde(default)]
    pub description: String,
    pub account_id: u64,
    /// Omitted by some flows; the caller then relies on a cached value.
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AutologinTokenBody {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SelectedAccountBody {
    pub account: RawAccount,
}
