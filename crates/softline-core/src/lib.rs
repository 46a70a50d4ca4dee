//! Session authentication and telephony-account binding for softline.
//!
//! This crate owns the business logic between `softline-api` and UI
//! consumers:
//!
//! - **[`SessionAuthenticator`]** — Central facade managing the full login
//!   handshake: credential exchange, optional second factor, profile fetch,
//!   and account binding. Owns the session state machine and the
//!   session-identity barrier that keeps stale responses from mutating a
//!   newer session. Status is observable through a `watch` channel, outbound
//!   events ([`SessionEvent`]) through a `broadcast` channel.
//!
//! - **[`TokenVault`]** — Storage for the API token, SIP registration
//!   secret, and portal autologin token. Installing an API token swaps the
//!   transport's authentication context in the same step.
//!
//! - **[`AccountBinder`]** — Resolves the `fallback` / `selected` / `using`
//!   account triple and persists every successful change before reporting
//!   it.
//!
//! - **[`AutologinRefresher`]** — Fetches the vendor-portal autologin token
//!   on demand, independent of the login flow.
//!
//! - **[`StateStore`]** — Contract for the durable per-identity state
//!   collaborator, with an in-memory reference implementation.

pub mod account;
pub mod autologin;
pub mod config;
pub mod error;
pub mod event;
pub mod session;
pub mod store;
pub mod vault;

// ── Primary re-exports ──────────────────────────────────────────────
pub use account::{AccountBinder, AccountSlots, TelephonyAccount};
pub use autologin::AutologinRefresher;
pub use config::PlatformConfig;
pub use error::CoreError;
pub use event::{Notice, SessionEvent};
pub use session::{
    Credentials, LoginOutcome, Profile, Session, SessionAuthenticator, SessionStatus,
};
pub use store::{MemoryStore, PersistedState, StateStore};
pub use vault::TokenVault;
