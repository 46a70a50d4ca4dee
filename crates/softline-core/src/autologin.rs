// ── Portal autologin token refresh ──
//
// Independent of the main login flow; can run at any time, e.g. before
// rendering a vendor-portal deep link. Distinguishes "the session is gone"
// (401) from ordinary failures so the caller can decide whether a full
// session clear is warranted.

use std::sync::Arc;

use tracing::{debug, warn};

use softline_api::PlatformClient;

use crate::error::CoreError;
use crate::vault::TokenVault;

/// Fetches and stores the portal autologin token on demand.
pub struct AutologinRefresher {
    client: Arc<PlatformClient>,
    vault: Arc<TokenVault>,
}

impl AutologinRefresher {
    pub fn new(client: Arc<PlatformClient>, vault: Arc<TokenVault>) -> Self {
        Self { client, vault }
    }

    /// Fetch the portal autologin token and store it in the vault.
    ///
    /// An unauthorized response means the installed API token is no longer
    /// valid and surfaces as [`CoreError::SessionExpired`]; the caller owns
    /// the resulting session clear. Any other failure is
    /// [`CoreError::TokenRefresh`] and mutates nothing.
    pub async fn refresh(&self) -> Result<String, CoreError> {
        match self.client.fetch_autologin_token().await {
            Ok(token) => {
                self.vault.set_portal_token(&token);
                debug!("(re)loaded autologin token");
                Ok(token)
            }
            Err(softline_api::Error::Unauthorized) => {
                warn!("autologin refresh rejected; session no longer valid");
                Err(CoreError::SessionExpired)
            }
            Err(e) => Err(CoreError::TokenRefresh {
                message: e.to_string(),
            }),
        }
    }
}
