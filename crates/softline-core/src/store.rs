// ── Persisted session state ──
//
// The generic key-value store is an external collaborator; this module
// defines only the contract and the state layout, plus an in-memory
// reference implementation used by tests and embedders without their own
// backend. The contract is synchronous durability: `persist` must not
// return until the write would survive a process exit.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::account::AccountSlots;
use crate::error::CoreError;

/// Everything persisted for one session identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    pub user: PersistedUser,
    pub settings: PersistedSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedUser {
    /// The API token issued at login.
    pub token: Option<String>,
    /// Whether this identity has been observed to require a second factor.
    pub two_factor: bool,
    pub platform: PersistedPlatform,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedPlatform {
    pub tokens: PersistedTokens,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedTokens {
    /// Portal autologin token; refreshed independently of login.
    pub portal: Option<String>,
    /// SIP registration secret; set once at login time.
    pub sip: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSettings {
    pub webrtc: PersistedWebrtc,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedWebrtc {
    pub enabled: bool,
    pub account: AccountSlots,
}

/// Durable storage for [`PersistedState`], keyed by session identity.
pub trait StateStore: Send + Sync {
    /// Load the state for `identity`, if any was ever persisted.
    fn load(&self, identity: &str) -> Result<Option<PersistedState>, CoreError>;

    /// Durably write the state for `identity`. Must not return `Ok` before
    /// the write is durable.
    fn persist(&self, identity: &str, state: &PersistedState) -> Result<(), CoreError>;
}

/// In-memory [`StateStore`]: durable for the lifetime of the process.
#[derive(Default)]
pub struct MemoryStore {
    states: DashMap<String, PersistedState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for handing the store to multiple owners.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl StateStore for MemoryStore {
    fn load(&self, identity: &str) -> Result<Option<PersistedState>, CoreError> {
        Ok(self.states.get(identity).map(|entry| entry.value().clone()))
    }

    fn persist(&self, identity: &str, state: &PersistedState) -> Result<(), CoreError> {
        self.states.insert(identity.to_owned(), state.clone());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_identity_is_none() {
        let store = MemoryStore::new();
        assert!(store.load("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn persist_then_load_round_trips() {
        let store = MemoryStore::new();
        let mut state = PersistedState::default();
        state.user.token = Some("tok-123".into());
        state.settings.webrtc.enabled = true;

        store.persist("alice@example.com", &state).unwrap();
        let loaded = store.load("alice@example.com").unwrap().unwrap();

        assert_eq!(loaded, state);
    }

    #[test]
    fn identities_are_isolated() {
        let store = MemoryStore::new();
        let mut state = PersistedState::default();
        state.user.token = Some("tok-a".into());
        store.persist("a@example.com", &state).unwrap();

        assert!(store.load("b@example.com").unwrap().is_none());
    }
}
