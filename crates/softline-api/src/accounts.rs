// Account-selection endpoint

use serde_json::json;
use tracing::debug;

use crate::client::PlatformClient;
use crate::error::Error;
use crate::types::{RawAccount, SelectedAccountBody};

/// `PUT api/plugin/user/selected_account/`
const SELECTED_ACCOUNT_PATH: &str = "api/plugin/user/selected_account/";

impl PlatformClient {
    /// Make `account_id` the user's selected telephony account.
    ///
    /// On success the platform echoes the full account record back, which is
    /// the canonical source for the new binding. Any non-success status is an
    /// [`Error::Api`]; the caller must leave its previous binding untouched.
    pub async fn select_account(&self, account_id: u64) -> Result<RawAccount, Error> {
        let body = json!({ "account": account_id });
        let resp = self.put(SELECTED_ACCOUNT_PATH, &body).await?;
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

        let selected: SelectedAccountBody = Self::parse_json(&text)?;
        debug!(account_id, "account selection accepted");
        Ok(selected.account)
    }
}
