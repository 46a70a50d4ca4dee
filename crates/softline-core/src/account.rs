// ── Telephony-account binding ──
//
// Resolves which account credentials are "in use" from three slots:
// `fallback` (derived from the logged-in identity), `selected` (explicit
// user choice), and `using` (what telephony actually registers with).
// Invariant: `using` is always `selected` or `fallback`, never a third
// value, and never unset once a session is bound.
//
// All account-origin data -- the derived fallback and server-selected
// records alike -- is normalized through the single formatting rule here.

use std::sync::{Arc, RwLock};

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use softline_api::{PlatformClient, RawAccount};

use crate::error::CoreError;
use crate::store::StateStore;
use crate::vault::TokenVault;

/// A telephony account in the internal canonical shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelephonyAccount {
    /// Platform record id; absent for the derived fallback account.
    pub id: Option<u64>,
    /// Display name (`"<internal_number> - <description>"`); absent for
    /// the derived fallback account.
    pub name: Option<String>,
    pub uri: String,
    pub username: String,
    /// Omitted by some platform flows; the binder then retains the locally
    /// cached value for the same account.
    pub password: Option<String>,
}

impl TelephonyAccount {
    /// An account is usable for registration when both credential fields
    /// are populated.
    pub fn is_usable(&self) -> bool {
        !self.username.is_empty() && self.password.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// The three account slots for one session identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSlots {
    pub fallback: Option<TelephonyAccount>,
    pub selected: Option<TelephonyAccount>,
    pub using: Option<TelephonyAccount>,
}

impl AccountSlots {
    /// Recompute `using` from the other two slots: `selected` when it has
    /// both credential fields, else `fallback`.
    pub fn resolve_using(&mut self) {
        self.using = match &self.selected {
            Some(selected) if selected.is_usable() => Some(selected.clone()),
            _ => self.fallback.clone(),
        };
    }
}

/// Single writer of the three account slots.
///
/// Owns the in-memory triple, normalizes every account through the one
/// formatting rule, and persists each successful change before reporting it.
pub struct AccountBinder {
    client: Arc<PlatformClient>,
    vault: Arc<TokenVault>,
    store: Arc<dyn StateStore>,
    sip_domain: String,
    slots: RwLock<AccountSlots>,
}

impl AccountBinder {
    pub fn new(
        client: Arc<PlatformClient>,
        vault: Arc<TokenVault>,
        store: Arc<dyn StateStore>,
        sip_domain: String,
    ) -> Self {
        Self {
            client,
            vault,
            store,
            sip_domain,
            slots: RwLock::new(AccountSlots::default()),
        }
    }

    /// Current snapshot of the triple.
    pub fn slots(&self) -> AccountSlots {
        self.slots
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Resolve the triple after a successful login.
    ///
    /// Derives `fallback` from the login identity (SIP secret from the
    /// vault); applies the server-sent selected account when present;
    /// otherwise keeps a prior usable `selected`, or initializes it to
    /// `fallback` on the first login. Persists before returning --
    /// idempotent for the same inputs.
    pub fn bind(
        &self,
        identity: &str,
        server_selected: Option<&RawAccount>,
    ) -> Result<AccountSlots, CoreError> {
        let fallback = self.derive_fallback(identity);
        let mut slots = self.slots();
        slots.fallback = Some(fallback.clone());

        if let Some(raw) = server_selected {
            let cached = slots.selected.clone();
            slots.selected = Some(self.format_account(raw, cached.as_ref()));
        } else if !slots
            .selected
            .as_ref()
            .is_some_and(TelephonyAccount::is_usable)
        {
            debug!(identity, "no selected account; binding fallback");
            slots.selected = Some(fallback);
        }

        slots.resolve_using();
        self.commit(identity, slots)
    }

    /// Explicit account switch.
    ///
    /// `Some(id)` calls the platform; a non-success status aborts with
    /// [`CoreError::AccountSelection`] and the previous binding unchanged.
    /// `None` clears the selection and reverts `using` to `fallback`.
    /// Every successful change is persisted before this returns.
    pub async fn select_account(
        &self,
        identity: &str,
        account_id: Option<u64>,
    ) -> Result<TelephonyAccount, CoreError> {
        match account_id {
            Some(id) => {
                let raw = self.client.select_account(id).await.map_err(|e| {
                    warn!(account_id = id, error = %e, "account selection rejected");
                    match e.status() {
                        Some(status) => CoreError::AccountSelection { status },
                        None => CoreError::from(e),
                    }
                })?;

                let mut slots = self.slots();
                let cached = slots.selected.clone();
                let account = self.format_account(&raw, cached.as_ref());
                slots.selected = Some(account.clone());
                slots.using = Some(account.clone());
                self.commit(identity, slots)?;
                info!(account_id = id, "account selection bound");
                Ok(account)
            }
            None => {
                let mut slots = self.slots();
                slots.selected = None;
                let fallback = slots.fallback.clone().ok_or(CoreError::NotAuthenticated)?;
                slots.using = Some(fallback.clone());
                self.commit(identity, slots)?;
                info!("account selection cleared; using fallback");
                Ok(fallback)
            }
        }
    }

    /// Load the persisted triple for a new session identity.
    pub fn hydrate(&self, identity: &str) {
        let slots = match self.store.load(identity) {
            Ok(Some(state)) => state.settings.webrtc.account,
            Ok(None) => AccountSlots::default(),
            Err(e) => {
                warn!(identity, error = %e, "could not load persisted accounts");
                AccountSlots::default()
            }
        };
        *self
            .slots
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = slots;
    }

    /// Drop the in-memory triple (session teardown).
    pub fn clear(&self) {
        *self
            .slots
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = AccountSlots::default();
    }

    /// The single formatting rule for platform account records.
    ///
    /// When the record omits the password, a locally cached password for
    /// the same account id is retained.
    pub fn format_account(
        &self,
        raw: &RawAccount,
        cached: Option<&TelephonyAccount>,
    ) -> TelephonyAccount {
        let password = raw.password.clone().or_else(|| {
            cached
                .filter(|c| c.id == Some(raw.id))
                .and_then(|c| c.password.clone())
        });

        TelephonyAccount {
            id: Some(raw.id),
            name: Some(format!("{} - {}", raw.internal_number, raw.description)),
            uri: format!("sip:{}@{}", raw.account_id, self.sip_domain),
            username: raw.account_id.to_string(),
            password,
        }
    }

    /// The account implicitly derived from the logged-in identity.
    fn derive_fallback(&self, identity: &str) -> TelephonyAccount {
        TelephonyAccount {
            id: None,
            name: None,
            uri: format!("sip:{identity}"),
            username: identity.to_owned(),
            password: self
                .vault
                .sip_secret()
                .map(|s| s.expose_secret().to_owned()),
        }
    }

    /// Persist, then commit to memory. Persist failure leaves the previous
    /// binding in place.
    fn commit(&self, identity: &str, slots: AccountSlots) -> Result<AccountSlots, CoreError> {
        let mut state = self.store.load(identity)?.unwrap_or_default();
        state.settings.webrtc.account = slots.clone();
        // Applying an account switches webrtc on; clearing a selection
        // leaves the user's toggle alone.
        if slots.selected.is_some() {
            state.settings.webrtc.enabled = true;
        }
        self.store.persist(identity, &state)?;

        *self
            .slots
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = slots.clone();
        Ok(slots)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use url::Url;

    fn binder() -> (AccountBinder, Arc<TokenVault>, Arc<MemoryStore>) {
        let client = Arc::new(PlatformClient::with_client(
            reqwest::Client::new(),
            Url::parse("https://platform.invalid").unwrap(),
        ));
        let vault = Arc::new(TokenVault::new(Arc::clone(&client)));
        let store = MemoryStore::shared();
        let binder = AccountBinder::new(
            client,
            Arc::clone(&vault),
            store.clone() as Arc<dyn StateStore>,
            "voipgrid.nl".into(),
        );
        (binder, vault, store)
    }

    fn raw_account(password: Option<&str>) -> RawAccount {
        RawAccount {
            id: 42,
            internal_number: 201,
            description: "Support desk".into(),
            account_id: 170_001_234,
            password: password.map(ToOwned::to_owned),
        }
    }

    #[test]
    fn format_account_applies_display_rule() {
        let (binder, _, _) = binder();
        let account = binder.format_account(&raw_account(Some("s3cret")), None);

        assert_eq!(account.name.as_deref(), Some("201 - Support desk"));
        assert_eq!(account.uri, "sip:170001234@voipgrid.nl");
        assert_eq!(account.username, "170001234");
        assert_eq!(account.password.as_deref(), Some("s3cret"));
    }

    #[test]
    fn format_account_retains_cached_password_for_same_id() {
        let (binder, _, _) = binder();
        let cached = binder.format_account(&raw_account(Some("cached-secret")), None);

        let account = binder.format_account(&raw_account(None), Some(&cached));
        assert_eq!(account.password.as_deref(), Some("cached-secret"));
    }

    #[test]
    fn format_account_ignores_cached_password_for_other_id() {
        let (binder, _, _) = binder();
        let mut cached = binder.format_account(&raw_account(Some("cached-secret")), None);
        cached.id = Some(7);

        let account = binder.format_account(&raw_account(None), Some(&cached));
        assert!(account.password.is_none());
    }

    #[test]
    fn first_bind_derives_fallback_for_all_slots() {
        let (binder, vault, _) = binder();
        vault.set_sip_secret("sip-secret");

        let slots = binder.bind("alice@example.com", None).unwrap();

        let fallback = slots.fallback.unwrap();
        assert_eq!(fallback.uri, "sip:alice@example.com");
        assert_eq!(fallback.username, "alice@example.com");
        assert_eq!(fallback.password.as_deref(), Some("sip-secret"));
        assert_eq!(slots.selected.as_ref(), Some(&fallback));
        assert_eq!(slots.using.as_ref(), Some(&fallback));
    }

    #[test]
    fn bind_is_idempotent() {
        let (binder, vault, _) = binder();
        vault.set_sip_secret("sip-secret");

        let first = binder.bind("alice@example.com", None).unwrap();
        let second = binder.bind("alice@example.com", None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn bind_applies_server_selected_account() {
        let (binder, vault, _) = binder();
        vault.set_sip_secret("sip-secret");

        let slots = binder
            .bind("alice@example.com", Some(&raw_account(Some("s3cret"))))
            .unwrap();

        let selected = slots.selected.unwrap();
        assert_eq!(selected.id, Some(42));
        assert_eq!(slots.using.unwrap(), selected);
    }

    #[test]
    fn bind_keeps_prior_usable_selection() {
        let (binder, vault, _) = binder();
        vault.set_sip_secret("sip-secret");
        binder
            .bind("alice@example.com", Some(&raw_account(Some("s3cret"))))
            .unwrap();

        let slots = binder.bind("alice@example.com", None).unwrap();

        assert_eq!(slots.selected.as_ref().unwrap().id, Some(42));
        assert_eq!(slots.using, slots.selected);
    }

    #[test]
    fn unusable_selection_falls_back() {
        let (binder, vault, _) = binder();
        vault.set_sip_secret("sip-secret");
        // Selected account with no password: not usable for registration.
        binder
            .bind("alice@example.com", Some(&raw_account(None)))
            .unwrap();

        let slots = binder.slots();
        assert_eq!(slots.using, slots.fallback);
        assert_eq!(slots.selected.as_ref().unwrap().id, Some(42));
    }

    #[tokio::test]
    async fn clearing_selection_reverts_to_fallback() {
        let (binder, vault, store) = binder();
        vault.set_sip_secret("sip-secret");
        binder
            .bind("alice@example.com", Some(&raw_account(Some("s3cret"))))
            .unwrap();

        let account = binder
            .select_account("alice@example.com", None)
            .await
            .unwrap();

        assert_eq!(account.uri, "sip:alice@example.com");
        let slots = binder.slots();
        assert!(slots.selected.is_none());
        assert_eq!(slots.using, slots.fallback);

        // The persisted copy reflects the new binding.
        let persisted = store.load("alice@example.com").unwrap().unwrap();
        assert_eq!(persisted.settings.webrtc.account, slots);
    }

    #[tokio::test]
    async fn clearing_selection_leaves_webrtc_toggle_alone() {
        let (binder, vault, store) = binder();
        vault.set_sip_secret("sip-secret");
        binder
            .bind("alice@example.com", Some(&raw_account(Some("s3cret"))))
            .unwrap();

        // User switches webrtc off out of band.
        let mut state = store.load("alice@example.com").unwrap().unwrap();
        state.settings.webrtc.enabled = false;
        store.persist("alice@example.com", &state).unwrap();

        binder
            .select_account("alice@example.com", None)
            .await
            .unwrap();

        let persisted = store.load("alice@example.com").unwrap().unwrap();
        assert!(!persisted.settings.webrtc.enabled);
        assert_eq!(persisted.settings.webrtc.account, binder.slots());
    }
}
