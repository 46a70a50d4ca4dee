// Credential exchange endpoint
//
// Trades email/password (plus optional second factor) for an API token.
// Rejections come back as data, not errors: the body shapes vary (per-field
// validation errors vs. a free-form rate-limit message) and interpreting
// them is session-layer policy.

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::debug;

use crate::client::PlatformClient;
use crate::error::Error;
use crate::types::{ApiTokenIssuedBody, AuthFailureBody, AuthRejection, AuthenticateReply};

/// `POST api/permission/apitoken/`
const APITOKEN_PATH: &str = "api/permission/apitoken/";

impl PlatformClient {
    /// Exchange credentials for an API token.
    ///
    /// Returns `Ok(Issued)` on acceptance, `Ok(Rejected)` for any
    /// non-success status (the body is parsed but not interpreted), and
    /// `Err` only for transport-level failures.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &SecretString,
        two_factor: Option<&str>,
    ) -> Result<AuthenticateReply, Error> {
        let body = match two_factor {
            Some(token) => json!({
                "email": email,
                "password": password.expose_secret(),
                "two_factor_token": token,
            }),
            None => json!({
                "email": email,
                "password": password.expose_secret(),
            }),
        };

        let resp = self.post(APITOKEN_PATH, &body).await?;
        let status = resp.status();
        let text = resp.text().await.map_err(Error::Transport)?;

        if status.is_success() {
            let issued: ApiTokenIssuedBody = Self::parse_json(&text)?;
            debug!("credential exchange accepted");
            return Ok(AuthenticateReply::Issued {
                api_token: issued.api_token,
            });
        }

        debug!(status = status.as_u16(), "credential exchange rejected");

        // Rejection bodies are best-effort: an empty or unrecognized body
        // still yields a Rejected reply carrying just the status.
        let failure: AuthFailureBody = serde_json::from_str(&text).unwrap_or_default();
        Ok(AuthenticateReply::Rejected(AuthRejection {
            status: status.as_u16(),
            field_errors: failure.apitoken,
            error_message: failure.error.map(|e| e.message),
        }))
    }
}
