// Profile and autologin endpoints
//
// Both require an installed auth context. The profile endpoint doubles as
// the entitlement check: partner users get a 401, and users with an expired
// password get a plain-text sentinel body instead of JSON.

use tracing::debug;

use crate::client::PlatformClient;
use crate::error::Error;
use crate::types::{AutologinTokenBody, ProfileReply, RawProfile};

/// `GET api/permission/systemuser/profile/`
const PROFILE_PATH: &str = "api/permission/systemuser/profile/";

/// `GET api/autologin/token/`
const AUTOLOGIN_PATH: &str = "api/autologin/token/";

/// Sentinel body the platform returns in place of a profile when the user
/// must change their password in the vendor portal.
const PASSWORD_CHANGE_SENTINEL: &str = "You need to change your password in the portal";

impl PlatformClient {
    /// Fetch the authenticated user's profile.
    ///
    /// Classifies the two non-profile shapes the platform can answer with
    /// (not entitled, password change required); everything else must parse
    /// as a profile. A missing `client` reference also means not entitled --
    /// both signals have been observed from the platform.
    pub async fn fetch_profile(&self) -> Result<ProfileReply, Error> {
        let resp = self.get(PROFILE_PATH).await?;
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            debug!("profile fetch returned 401; user is not entitled");
            return Ok(ProfileReply::NotEntitled);
        }

        let text = resp.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        if text.trim().trim_matches('"') == PASSWORD_CHANGE_SENTINEL {
            debug!("profile fetch signalled a required password change");
            return Ok(ProfileReply::PasswordChangeRequired);
        }

        let profile: RawProfile = Self::parse_json(&text)?;
        if profile.client.is_none() {
            debug!("profile has no client reference; user is not entitled");
            return Ok(ProfileReply::NotEntitled);
        }

        Ok(ProfileReply::Profile(profile))
    }

    /// Fetch the portal autologin token.
    ///
    /// A 401 here means the session token itself is no longer valid and is
    /// reported as [`Error::Unauthorized`] so the caller can distinguish it
    /// from ordinary failures.
    pub async fn fetch_autologin_token(&self) -> Result<String, Error> {
        let resp = self.get(AUTOLOGIN_PATH).await?;
        let status = resp.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized);
        }

        let text = resp.text().await.map_err(Error::Transport)?;
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let body: AutologinTokenBody = Self::parse_json(&text)?;
        debug!("autologin token fetched");
        Ok(body.token)
    }
}
