// Platform API HTTP client
//
// Wraps `reqwest::Client` with base-URL joining and the token-auth header
// context. Endpoint groups (auth, profile, accounts) are implemented as
// inherent methods in separate files to keep this module focused on
// transport mechanics.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Authentication context attached to every request once a login succeeds.
///
/// The platform authenticates with `Authorization: Token <email>:<token>`.
struct AuthContext {
    email: String,
    token: SecretString,
}

/// Raw HTTP client for the telephony platform API.
///
/// Holds the authentication context in an [`ArcSwapOption`], so installing a
/// new API token is a single atomic store: there is no window where a request
/// can observe a half-updated email/token pair, and no rebuild of the
/// underlying `reqwest::Client` is needed.
pub struct PlatformClient {
    http: reqwest::Client,
    base_url: Url,
    auth: ArcSwapOption<AuthContext>,
}

impl PlatformClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` should be the platform root (e.g. `https://partner.example.com`).
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            auth: ArcSwapOption::empty(),
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            auth: ArcSwapOption::empty(),
        }
    }

    /// The platform base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Authentication context ───────────────────────────────────────

    /// Install the token-auth context. Atomic: requests issued after this
    /// call carry the new header, requests already built keep the old one.
    pub fn set_auth(&self, email: &str, token: SecretString) {
        debug!(email, "installing API token auth context");
        self.auth.store(Some(Arc::new(AuthContext {
            email: email.to_owned(),
            token,
        })));
    }

    /// Drop the auth context; subsequent requests go out unauthenticated.
    pub fn clear_auth(&self) {
        debug!("clearing API token auth context");
        self.auth.store(None);
    }

    /// Whether an auth context is currently installed.
    pub fn has_auth(&self) -> bool {
        self.auth.load().is_some()
    }

    fn auth_header(&self) -> Option<String> {
        self.auth
            .load()
            .as_ref()
            .map(|ctx| format!("Token {}:{}", ctx.email, ctx.token.expose_secret()))
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Build a full URL for an API path relative to the platform root.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        self.base_url.join(path).map_err(Error::InvalidUrl)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request with the current auth context.
    pub(crate) async fn get(&self, path: &str) -> Result<reqwest::Response, Error> {
        let url = self.api_url(path)?;
        debug!("GET {}", url);

        let mut req = self.http.get(url);
        if let Some(header) = self.auth_header() {
            req = req.header(reqwest::header::AUTHORIZATION, header);
        }
        req.send().await.map_err(Error::Transport)
    }

    /// Send a POST request with JSON body and the current auth context.
    pub(crate) async fn post(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<reqwest::Response, Error> {
        let url = self.api_url(path)?;
        debug!("POST {}", url);

        let mut req = self.http.post(url).json(body);
        if let Some(header) = self.auth_header() {
            req = req.header(reqwest::header::AUTHORIZATION, header);
        }
        req.send().await.map_err(Error::Transport)
    }

    /// Send a PUT request with JSON body and the current auth context.
    pub(crate) async fn put(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<reqwest::Response, Error> {
        let url = self.api_url(path)?;
        debug!("PUT {}", url);

        let mut req = self.http.put(url).json(body);
        if let Some(header) = self.auth_header() {
            req = req.header(reqwest::header::AUTHORIZATION, header);
        }
        req.send().await.map_err(Error::Transport)
    }

    /// Parse a JSON body, keeping the raw text for debugging on failure.
    pub(crate) fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
        serde_json::from_str(body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: body.to_owned(),
        })
    }
}
