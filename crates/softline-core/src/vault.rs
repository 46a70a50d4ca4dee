// ── Token vault ──
//
// Pure storage for the three token slots. No business logic: deciding when
// a token is set or cleared belongs to the session authenticator, which is
// the vault's single writer.

use std::sync::{Arc, RwLock};

use secrecy::SecretString;
use tracing::debug;

use softline_api::PlatformClient;

#[derive(Default)]
struct TokenSlots {
    portal: Option<String>,
    sip: Option<SecretString>,
    api: Option<SecretString>,
}

/// Holds the current API token, SIP registration secret, and portal
/// autologin token.
///
/// Installing an API token also reconfigures the transport's authentication
/// context; both happen under the same lock, so no reader can observe the
/// token stored while the transport still carries the prior context.
pub struct TokenVault {
    client: Arc<PlatformClient>,
    slots: RwLock<TokenSlots>,
}

impl TokenVault {
    pub fn new(client: Arc<PlatformClient>) -> Self {
        Self {
            client,
            slots: RwLock::new(TokenSlots::default()),
        }
    }

    /// Install the API token and swap the transport auth context.
    pub fn set_api_token(&self, email: &str, token: &str) {
        let mut slots = self.slots.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        self.client.set_auth(email, SecretString::from(token.to_owned()));
        slots.api = Some(SecretString::from(token.to_owned()));
        debug!(email, "API token installed");
    }

    pub fn api_token(&self) -> Option<SecretString> {
        self.slots
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .api
            .clone()
    }

    /// Store the SIP registration secret issued with the profile.
    pub fn set_sip_secret(&self, secret: &str) {
        self.slots
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .sip = Some(SecretString::from(secret.to_owned()));
    }

    pub fn sip_secret(&self) -> Option<SecretString> {
        self.slots
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .sip
            .clone()
    }

    /// Store the portal autologin token.
    pub fn set_portal_token(&self, token: &str) {
        self.slots
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .portal = Some(token.to_owned());
    }

    pub fn portal_token(&self) -> Option<String> {
        self.slots
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .portal
            .clone()
    }

    /// Wipe every slot and drop the transport auth context.
    pub fn clear(&self) {
        let mut slots = self.slots.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        self.client.clear_auth();
        *slots = TokenSlots::default();
        debug!("token vault cleared");
    }
}
