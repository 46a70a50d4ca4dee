// softline-api: Async Rust client for the softline telephony platform API

pub mod accounts;
pub mod auth;
pub mod client;
pub mod error;
pub mod profile;
pub mod transport;
pub mod types;

pub use client::PlatformClient;
pub use error::Error;
pub use transport::TransportConfig;
pub use types::{
    ApiTokenFieldErrors, AuthRejection, AuthenticateReply, ProfileReply, RawAccount, RawProfile,
};
