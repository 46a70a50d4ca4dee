// ── Session authentication ──
//
// Orchestrates the full login handshake: credential exchange, optional
// second factor, profile fetch, account binding. Owns the session-identity
// transition and is the single writer of session status and profile.
//
// Concurrency model: one in-flight login attempt per session. A login gate
// serializes attempts; a monotonically increasing generation counter tags
// every attempt with the session identity it was issued under, and the tag
// is re-checked after every remote round-trip so a stale response can never
// mutate a newer session's state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{Mutex, broadcast, watch};
use tracing::{debug, info, warn};

use softline_api::{
    AuthRejection, AuthenticateReply, PlatformClient, ProfileReply, TransportConfig,
};

use crate::account::{AccountBinder, AccountSlots, TelephonyAccount};
use crate::autologin::AutologinRefresher;
use crate::config::PlatformConfig;
use crate::error::CoreError;
use crate::event::{Notice, SessionEvent};
use crate::store::{PersistedState, StateStore};
use crate::vault::TokenVault;

const EVENT_CHANNEL_SIZE: usize = 16;

/// Marker substring the platform puts in its rate-limit error message.
///
/// Locale-specific ("too many" in the platform's home locale) -- this is the
/// server's current error contract, and the retry time is the trailing token
/// of that message. A structured error code would be better; until the
/// platform ships one, the marker is matched verbatim.
const RATE_LIMIT_MARKER: &str = "Te veel";

/// Validation message for a missing-but-required second factor.
const TWO_FACTOR_REQUIRED_MESSAGE: &str = "this field is required";

const INELIGIBLE_REASON: &str = "partner or other non-client account";

// ── Data model ───────────────────────────────────────────────────────

/// Login credentials. Transient: never persisted beyond the call that
/// uses them.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
    pub second_factor: Option<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
            second_factor: None,
        }
    }

    pub fn with_second_factor(mut self, token: impl Into<String>) -> Self {
        self.second_factor = Some(token.into());
        self
    }
}

/// Session state machine states.
///
/// `Bound` and `Failed` are terminal for an attempt; a new attempt restarts
/// at `Authenticating`. Business rejections (bad credentials, rate limit)
/// return the status to `Idle`; `Failed` marks transport-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Authenticating,
    AwaitingSecondFactor,
    ProfileFetch,
    Bound,
    Failed,
}

/// Identity produced by a successful login.
#[derive(Debug, Clone)]
pub struct Profile {
    /// Digits of the owning client resource reference.
    pub client_id: String,
    pub user_id: u64,
    /// First name, preposition, and last name joined with spaces, empty
    /// segments skipped.
    pub real_name: String,
    pub api_token: SecretString,
}

/// Terminal outcome of one login attempt.
///
/// Every attempt resolves to exactly one of these (or to a `CoreError` for
/// transport-level and superseded attempts) -- no silent fire-and-forget.
#[derive(Debug)]
pub enum LoginOutcome {
    Success(Profile),
    InvalidCredentials,
    SecondFactorRequired,
    InvalidSecondFactor,
    RateLimited { retry_at: String },
    Ineligible { reason: String },
    PasswordChangeRequired,
}

/// Observable snapshot of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub active_username: Option<String>,
    pub status: SessionStatus,
}

#[derive(Default)]
struct SessionState {
    active_username: Option<String>,
    profile: Option<Profile>,
}

// ── Rejection classification ─────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
enum RejectionKind {
    InvalidCredentials,
    SecondFactorRequired,
    SecondFactorInvalid,
    RateLimited(String),
    Generic,
}

/// Interpret a credential-exchange rejection, in precedence order:
/// credential field errors, second-factor required, second-factor invalid,
/// rate limit, generic.
fn classify_rejection(rejection: &AuthRejection) -> RejectionKind {
    if let Some(errors) = &rejection.field_errors {
        if !errors.email.is_empty() || !errors.password.is_empty() {
            return RejectionKind::InvalidCredentials;
        }
        if let Some(message) = errors.two_factor_message() {
            return if message == TWO_FACTOR_REQUIRED_MESSAGE {
                RejectionKind::SecondFactorRequired
            } else {
                RejectionKind::SecondFactorInvalid
            };
        }
    }

    if let Some(message) = &rejection.error_message {
        if let Some(retry_at) = rate_limit_retry_at(message) {
            return RejectionKind::RateLimited(retry_at);
        }
    }

    RejectionKind::Generic
}

/// Extract the retry time from a rate-limit message: the trailing
/// whitespace-separated token. `None` when the marker is absent.
fn rate_limit_retry_at(message: &str) -> Option<String> {
    if !message.contains(RATE_LIMIT_MARKER) {
        return None;
    }
    message.split_whitespace().next_back().map(ToOwned::to_owned)
}

fn assemble_real_name(first: &str, preposition: &str, last: &str) -> String {
    [first, preposition, last]
        .iter()
        .filter(|segment| !segment.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

fn client_id_digits(reference: Option<&str>) -> String {
    reference
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .collect()
}

// ── SessionAuthenticator ─────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc`. Owns the session state machine and wires
/// together the vault, binder, and refresher. Consumers invoke typed
/// methods ([`login`](Self::login), [`select_account`](Self::select_account),
/// [`refresh_autologin_token`](Self::refresh_autologin_token)) and observe
/// status through a `watch` channel and events through a `broadcast`
/// channel.
#[derive(Clone)]
pub struct SessionAuthenticator {
    inner: Arc<AuthenticatorInner>,
}

struct AuthenticatorInner {
    config: PlatformConfig,
    client: Arc<PlatformClient>,
    vault: Arc<TokenVault>,
    binder: AccountBinder,
    refresher: AutologinRefresher,
    store: Arc<dyn StateStore>,
    session: StdMutex<SessionState>,
    status: watch::Sender<SessionStatus>,
    events: broadcast::Sender<SessionEvent>,
    /// Serializes login attempts: a second concurrent `login` queues behind
    /// the first, never interleaves with it.
    login_gate: Mutex<()>,
    /// Bumped on every session-identity transition; in-flight attempts carry
    /// the value they started under and abandon themselves when it moves.
    generation: AtomicU64,
}

impl SessionAuthenticator {
    /// Build an authenticator with its own HTTP client.
    pub fn new(config: PlatformConfig, store: Arc<dyn StateStore>) -> Result<Self, CoreError> {
        let transport = TransportConfig {
            timeout: config.timeout,
            ..TransportConfig::default()
        };
        let client = Arc::new(PlatformClient::new(config.base_url.clone(), &transport)?);
        Ok(Self::with_client(config, client, store))
    }

    /// Build an authenticator around an existing [`PlatformClient`].
    pub fn with_client(
        config: PlatformConfig,
        client: Arc<PlatformClient>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        let vault = Arc::new(TokenVault::new(Arc::clone(&client)));
        let binder = AccountBinder::new(
            Arc::clone(&client),
            Arc::clone(&vault),
            Arc::clone(&store),
            config.sip_domain.clone(),
        );
        let refresher = AutologinRefresher::new(Arc::clone(&client), Arc::clone(&vault));
        let (status, _) = watch::channel(SessionStatus::Idle);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);

        Self {
            inner: Arc::new(AuthenticatorInner {
                config,
                client,
                vault,
                binder,
                refresher,
                store,
                session: StdMutex::new(SessionState::default()),
                status,
                events,
                login_gate: Mutex::new(()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    // ── Observers ────────────────────────────────────────────────────

    pub fn status(&self) -> SessionStatus {
        *self.inner.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.inner.status.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn session(&self) -> Session {
        Session {
            active_username: self.lock_session().active_username.clone(),
            status: self.status(),
        }
    }

    pub fn active_username(&self) -> Option<String> {
        self.lock_session().active_username.clone()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.lock_session().profile.clone()
    }

    /// Snapshot of the bound account triple.
    pub fn accounts(&self) -> AccountSlots {
        self.inner.binder.slots()
    }

    pub fn vault(&self) -> &Arc<TokenVault> {
        &self.inner.vault
    }

    /// Whether a login attempt is currently running. Independent of
    /// "authenticated", which is tracked by session identity.
    pub fn login_in_progress(&self) -> bool {
        matches!(
            self.status(),
            SessionStatus::Authenticating | SessionStatus::ProfileFetch
        )
    }

    /// Whether the last attempt stopped to wait for a second factor.
    pub fn two_factor_pending(&self) -> bool {
        self.status() == SessionStatus::AwaitingSecondFactor
    }

    // ── Login ────────────────────────────────────────────────────────

    /// Run the full login handshake.
    ///
    /// Every failure resolves to a terminal [`LoginOutcome`] or a
    /// [`CoreError`], delivered synchronously; no step is retried. A
    /// second-factor retry is a *new* `login` call carrying the token.
    pub async fn login(&self, credentials: Credentials) -> Result<LoginOutcome, CoreError> {
        if credentials.username.is_empty() || credentials.password.expose_secret().is_empty() {
            return Err(CoreError::Config {
                message: "username and password must be non-empty".into(),
            });
        }

        let _gate = self.inner.login_gate.lock().await;

        let switching = {
            let session = self.lock_session();
            session.active_username.as_deref() != Some(credentials.username.as_str())
        };
        if switching {
            // Reinitialize under a login marker so observers see continuity
            // rather than a flash of "logged out".
            self.change_session_inner(Some(&credentials.username), true);
        }
        let generation = self.inner.generation.load(Ordering::Acquire);
        self.set_status(SessionStatus::Authenticating);

        let reply = match self
            .inner
            .client
            .authenticate(
                &credentials.username,
                &credentials.password,
                credentials.second_factor.as_deref(),
            )
            .await
        {
            Ok(reply) => reply,
            Err(e) => return self.fail_attempt(generation, e),
        };
        self.ensure_current(generation)?;

        let api_token = match reply {
            AuthenticateReply::Issued { api_token } => api_token,
            AuthenticateReply::Rejected(rejection) => {
                return Ok(self.handle_rejection(&credentials.username, &rejection));
            }
        };

        // Installed before any subsequent call: the profile fetch below is
        // already authenticated with the new token.
        self.inner
            .vault
            .set_api_token(&credentials.username, &api_token);
        self.set_status(SessionStatus::ProfileFetch);

        let profile_reply = match self.inner.client.fetch_profile().await {
            Ok(reply) => reply,
            Err(e) => return self.fail_attempt(generation, e),
        };
        self.ensure_current(generation)?;

        let raw = match profile_reply {
            ProfileReply::NotEntitled => {
                // Continuing with partial state would be unsafe: drop the
                // installed token and clear the session.
                info!(username = %credentials.username, "ineligible account type; clearing session");
                self.logout();
                self.emit(SessionEvent::Notice(Notice::Ineligible {
                    reason: INELIGIBLE_REASON.into(),
                }));
                return Ok(LoginOutcome::Ineligible {
                    reason: INELIGIBLE_REASON.into(),
                });
            }
            ProfileReply::PasswordChangeRequired => {
                let portal_url = self.inner.config.password_change_url();
                self.emit(SessionEvent::Notice(Notice::PasswordChangeRequired {
                    portal_url,
                }));
                self.set_status(SessionStatus::Idle);
                return Ok(LoginOutcome::PasswordChangeRequired);
            }
            ProfileReply::Profile(raw) => raw,
        };

        if let Some(secret) = raw.token.as_deref() {
            self.inner.vault.set_sip_secret(secret);
        }

        let profile = Profile {
            client_id: client_id_digits(raw.client.as_deref()),
            user_id: raw.id,
            real_name: assemble_real_name(&raw.first_name, &raw.preposition, &raw.last_name),
            api_token: SecretString::from(api_token.clone()),
        };

        let slots = match self
            .inner
            .binder
            .bind(&credentials.username, raw.selected_account.as_ref())
        {
            Ok(slots) => slots,
            Err(e) => {
                self.set_status(SessionStatus::Failed);
                return Err(e);
            }
        };
        debug!(
            using = slots.using.as_ref().map(|a| a.uri.as_str()),
            "telephony account bound"
        );

        if let Err(e) = self.update_persisted(&credentials.username, |state| {
            state.user.token = Some(api_token.clone());
            state.user.platform.tokens.sip = raw.token.clone();
            if credentials.second_factor.is_some() {
                state.user.two_factor = true;
            }
        }) {
            self.set_status(SessionStatus::Failed);
            return Err(e);
        }

        self.lock_session().profile = Some(profile.clone());
        self.set_status(SessionStatus::Bound);
        info!(username = %credentials.username, "authenticated successfully");
        self.emit(SessionEvent::ServicesInit);

        Ok(LoginOutcome::Success(profile))
    }

    // ── Session identity ─────────────────────────────────────────────

    /// Switch the active session identity, tearing down all session state.
    ///
    /// Acts as a barrier: any in-flight attempt for the old identity is
    /// abandoned, and its eventual response cannot mutate the new session.
    pub fn change_session(&self, username: Option<&str>) {
        self.change_session_inner(username, false);
    }

    /// Explicit logout: clears tokens, accounts, and identity.
    pub fn logout(&self) {
        info!("logging out");
        self.change_session_inner(None, false);
        self.emit(SessionEvent::LoggedOut);
    }

    fn change_session_inner(&self, username: Option<&str>, keep_login_marker: bool) {
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        {
            let mut session = self.lock_session();
            session.active_username = username.map(ToOwned::to_owned);
            session.profile = None;
        }
        self.inner.vault.clear();
        match username {
            Some(identity) => {
                self.inner.binder.hydrate(identity);
                debug!(identity, "session identity switched");
            }
            None => self.inner.binder.clear(),
        }
        self.set_status(if keep_login_marker {
            SessionStatus::Authenticating
        } else {
            SessionStatus::Idle
        });
    }

    // ── Account selection ────────────────────────────────────────────

    /// Explicit account switch; see [`AccountBinder::select_account`].
    pub async fn select_account(
        &self,
        account_id: Option<u64>,
    ) -> Result<TelephonyAccount, CoreError> {
        let identity = self.active_username().ok_or(CoreError::NotAuthenticated)?;
        match self.inner.binder.select_account(&identity, account_id).await {
            Ok(account) => Ok(account),
            Err(CoreError::AccountSelection { status }) => {
                self.emit(SessionEvent::Notice(Notice::AccountSelectionFailed {
                    status,
                }));
                Err(CoreError::AccountSelection { status })
            }
            Err(e) => Err(e),
        }
    }

    // ── Autologin token ──────────────────────────────────────────────

    /// Refresh the portal autologin token.
    ///
    /// The one incidental call that may itself force a logout: an
    /// unauthorized response proves the session invalid and clears it.
    /// Every other failure leaves session state untouched.
    pub async fn refresh_autologin_token(&self) -> Result<String, CoreError> {
        let identity = self.active_username().ok_or(CoreError::NotAuthenticated)?;
        match self.inner.refresher.refresh().await {
            Ok(token) => {
                if let Err(e) = self.update_persisted(&identity, |state| {
                    state.user.platform.tokens.portal = Some(token.clone());
                }) {
                    warn!(error = %e, "could not persist refreshed portal token");
                }
                Ok(token)
            }
            Err(CoreError::SessionExpired) => {
                warn!("session invalidated during token refresh; logging out");
                self.logout();
                Err(CoreError::SessionExpired)
            }
            Err(e) => Err(e),
        }
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn handle_rejection(&self, identity: &str, rejection: &AuthRejection) -> LoginOutcome {
        match classify_rejection(rejection) {
            RejectionKind::SecondFactorRequired => {
                debug!("second factor required; awaiting token");
                if let Err(e) =
                    self.update_persisted(identity, |state| state.user.two_factor = true)
                {
                    warn!(error = %e, "could not persist two-factor flag");
                }
                self.set_status(SessionStatus::AwaitingSecondFactor);
                self.emit(SessionEvent::Notice(Notice::SecondFactorRequired));
                LoginOutcome::SecondFactorRequired
            }
            RejectionKind::SecondFactorInvalid => {
                self.set_status(SessionStatus::Idle);
                self.emit(SessionEvent::Notice(Notice::InvalidSecondFactor));
                LoginOutcome::InvalidSecondFactor
            }
            RejectionKind::RateLimited(retry_at) => {
                warn!(retry_at = %retry_at, "login rate limited");
                self.set_status(SessionStatus::Idle);
                self.emit(SessionEvent::Notice(Notice::RateLimited {
                    retry_at: retry_at.clone(),
                }));
                LoginOutcome::RateLimited { retry_at }
            }
            RejectionKind::InvalidCredentials | RejectionKind::Generic => {
                self.set_status(SessionStatus::Idle);
                self.emit(SessionEvent::Notice(Notice::InvalidCredentials));
                LoginOutcome::InvalidCredentials
            }
        }
    }

    /// Transport-level failure: mark the attempt failed unless it was
    /// already superseded, in which case the new session's status is not
    /// ours to touch.
    fn fail_attempt(
        &self,
        generation: u64,
        err: softline_api::Error,
    ) -> Result<LoginOutcome, CoreError> {
        self.ensure_current(generation)?;
        self.set_status(SessionStatus::Failed);
        Err(err.into())
    }

    fn ensure_current(&self, generation: u64) -> Result<(), CoreError> {
        if self.inner.generation.load(Ordering::Acquire) == generation {
            Ok(())
        } else {
            debug!("attempt superseded by session change; discarding result");
            Err(CoreError::Superseded)
        }
    }

    fn update_persisted<F: FnOnce(&mut PersistedState)>(
        &self,
        identity: &str,
        apply: F,
    ) -> Result<(), CoreError> {
        let mut state = self.inner.store.load(identity)?.unwrap_or_default();
        apply(&mut state);
        self.inner.store.persist(identity, &state)
    }

    fn lock_session(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: SessionStatus) {
        self.inner.status.send_replace(status);
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.inner.events.send(event);
    }
}
