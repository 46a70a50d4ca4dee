// ── Platform connection configuration ──
//
// Describes *which* platform deployment to talk to. Carries no credentials:
// those arrive per login attempt and are never stored here.

use std::time::Duration;

use url::Url;

/// Configuration for one platform deployment.
///
/// Built by the embedding application and handed to
/// [`SessionAuthenticator::new`](crate::SessionAuthenticator::new) --
/// core never reads config files.
#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Platform API root (e.g. `https://partner.voipgrid.nl`).
    pub base_url: Url,
    /// Domain appended to selected-account SIP URIs
    /// (`sip:<account_id>@<sip_domain>`).
    pub sip_domain: String,
    /// Request timeout, delegated to the transport.
    pub timeout: Duration,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("https://partner.voipgrid.nl")
                .unwrap_or_else(|_| unreachable!("static URL parses")),
            sip_domain: "voipgrid.nl".into(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl PlatformConfig {
    /// The portal URL surfaced to the user when the platform demands a
    /// password change before it will serve a profile.
    pub fn password_change_url(&self) -> String {
        format!("{}user/password_change/", self.base_url)
    }
}
