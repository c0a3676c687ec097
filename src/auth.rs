//! Authenticated session for one Bungie.net user.
//! - Tokens live in the SQLite cache, keyed by client id + membership id
//! - An expired access token is refreshed (confidential clients only) and re-stored
//! - `attach` puts `Authorization: Bearer ..` on an outgoing request
use anyhow::{anyhow, Result};
use chrono::Utc;
use tokio::sync::Mutex;

use crate::oauth::{OAuthClient, TokenSet};
use crate::storage::Store;

pub struct OAuthSession {
    oauth: OAuthClient,
    store: Store,
    membership_id: String,
    current: Mutex<Option<TokenSet>>,
}

impl OAuthSession {
    pub fn new(oauth: OAuthClient, store: Store, membership_id: impl Into<String>) -> Self {
        Self {
            oauth,
            store,
            membership_id: membership_id.into(),
            current: Mutex::new(None),
        }
    }

    /// Latest stored token for this client, whoever it belongs to
    pub async fn latest(oauth: &OAuthClient, store: &Store) -> Result<Option<TokenSet>> {
        let client_id = oauth.client_id().to_string();
        store.call(move |s| s.latest_token(&client_id)).await
    }

    /// A currently valid access token, refreshing it first if needed
    pub async fn access_token(&self) -> Result<String> {
        let mut current = self.current.lock().await;
        let token = match current.take() {
            Some(t) => t,
            None => {
                let client_id = self.oauth.client_id().to_string();
                let member = self.membership_id.clone();
                self.store
                    .call(move |s| s.token_for(&client_id, &member))
                    .await?
                    .ok_or_else(|| {
                        anyhow!(
                            "no stored OAuth token for Bungie.net user {}",
                            self.membership_id
                        )
                    })?
            }
        };

        let now = Utc::now();
        if !token.access_expired(now) {
            let access = token.access_token.clone();
            *current = Some(token);
            return Ok(access);
        }

        let refresh_token = match (&token.refresh_token, self.oauth.can_refresh(&token, now)) {
            (Some(r), true) => r.clone(),
            _ => {
                let client_id = self.oauth.client_id().to_string();
                let member = self.membership_id.clone();
                if let Err(e) = self
                    .store
                    .call(move |s| s.delete_token(&client_id, &member))
                    .await
                {
                    log::warn!("[auth] could not drop expired token: {e:#}");
                }
                return Err(anyhow!(
                    "OAuth token for Bungie.net user {} expired; authorize again",
                    self.membership_id
                ));
            }
        };

        log::debug!("[auth] access token expired, refreshing");
        let refreshed = self.oauth.refresh(&refresh_token).await?;
        let client_id = self.oauth.client_id().to_string();
        let stored = refreshed.clone();
        self.store
            .call(move |s| s.put_token(&client_id, &stored))
            .await?;
        let access = refreshed.access_token.clone();
        *current = Some(refreshed);
        Ok(access)
    }

    /// Attach Authorization to a reqwest request builder
    pub async fn attach(&self, rb: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        let token = self.access_token().await?;
        Ok(rb.bearer_auth(token))
    }
}
