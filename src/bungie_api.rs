//! Bungie.net Platform client.
//!
//! Every call goes through [`BungieClient::get`], which adds the API key (and
//! the bearer token for OAuth clients), retries throttled requests and unwraps
//! the `{Response, ErrorCode, ...}` envelope.

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::OAuthSession;
use crate::constants::bungie::ERROR_CODE_SUCCESS;
use crate::models::{
    ApiUsage, BungieMembershipType, CoreSettingsConfiguration, DestinyCharacterResponse,
    DestinyComponentType, DestinyManifest, DestinyProfileResponse, DestinyVendorResponse,
    GeneralUser, ServerResponse, UserMembershipData,
};
use crate::net::{http_client, send_with_backoff};

#[derive(Clone)]
pub struct BungieClient {
    base: String,
    api_key: Option<String>,
    timeout: Duration,
    retries: u32,
    auth: Option<Arc<OAuthSession>>,
}

pub struct GetCharacterParams<'a> {
    pub membership_type: BungieMembershipType,
    pub destiny_membership_id: &'a str,
    pub character_id: &'a str,
    pub components: &'a [DestinyComponentType],
}

pub struct GetProfileParams<'a> {
    pub membership_type: BungieMembershipType,
    pub destiny_membership_id: &'a str,
    pub components: &'a [DestinyComponentType],
}

pub struct GetVendorParams<'a> {
    pub membership_type: BungieMembershipType,
    pub destiny_membership_id: &'a str,
    pub character_id: &'a str,
    pub vendor_hash: u32,
    pub components: &'a [DestinyComponentType],
}

/// Turn an envelope into its payload, or an error naming the failed call
pub fn unwrap_envelope<T>(env: ServerResponse<T>, label: &str) -> Result<T> {
    if env.error_code != ERROR_CODE_SUCCESS {
        let throttle = if env.throttle_seconds > 0 {
            format!(" (throttled {}s)", env.throttle_seconds)
        } else {
            String::new()
        };
        return Err(anyhow!(
            "{label}: {} ({}): {}{throttle}",
            env.error_status,
            env.error_code,
            env.message
        ));
    }
    env.response
        .ok_or_else(|| anyhow!("{label}: envelope carried no Response"))
}

impl BungieClient {
    /// Client without user authentication
    pub fn anonymous(
        base: impl Into<String>,
        api_key: Option<String>,
        timeout_ms: u64,
        retries: u32,
    ) -> Self {
        Self {
            base: base.into(),
            api_key,
            timeout: Duration::from_millis(timeout_ms),
            retries,
            auth: None,
        }
    }

    /// Same settings, but every request carries the session's bearer token
    pub fn with_oauth(&self, session: Arc<OAuthSession>) -> Self {
        Self {
            auth: Some(session),
            ..self.clone()
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}/Platform{path}", self.base);
        log::debug!("[bungie] GET {path}");

        let mut rb = http_client().get(&url).timeout(self.timeout);
        if !query.is_empty() {
            rb = rb.query(query);
        }
        if let Some(key) = &self.api_key {
            rb = rb.header("X-API-Key", key);
        }
        if let Some(session) = &self.auth {
            rb = session.attach(rb).await?;
        }

        let res = send_with_backoff(rb, path, self.retries).await?;
        let status = res.status();
        let body = res
            .text()
            .await
            .with_context(|| format!("{path}: failed to read body"))?;

        // Error responses still come wrapped in the envelope; anything else is a transport problem
        let envelope: ServerResponse<T> = match serde_json::from_str(&body) {
            Ok(env) => env,
            Err(e) if status.is_success() => {
                return Err(anyhow!("{path}: unexpected response shape: {e}"));
            }
            Err(_) => return Err(anyhow!("{path}: http {status}")),
        };
        unwrap_envelope(envelope, path)
    }

    fn components_query(components: &[DestinyComponentType]) -> Vec<(&'static str, String)> {
        vec![("components", DestinyComponentType::join(components))]
    }

    pub async fn get_common_settings(&self) -> Result<CoreSettingsConfiguration> {
        self.get("/Settings/", &[]).await
    }

    pub async fn get_destiny_manifest(&self) -> Result<DestinyManifest> {
        self.get("/Destiny2/Manifest/", &[]).await
    }

    pub async fn get_character(
        &self,
        p: GetCharacterParams<'_>,
    ) -> Result<DestinyCharacterResponse> {
        let path = format!(
            "/Destiny2/{}/Profile/{}/Character/{}/",
            i32::from(p.membership_type),
            p.destiny_membership_id,
            p.character_id
        );
        self.get(&path, &Self::components_query(p.components)).await
    }

    pub async fn get_profile(&self, p: GetProfileParams<'_>) -> Result<DestinyProfileResponse> {
        let path = format!(
            "/Destiny2/{}/Profile/{}/",
            i32::from(p.membership_type),
            p.destiny_membership_id
        );
        self.get(&path, &Self::components_query(p.components)).await
    }

    /// Vendors are per character and need the owner's OAuth token
    pub async fn get_vendor(&self, p: GetVendorParams<'_>) -> Result<DestinyVendorResponse> {
        let path = format!(
            "/Destiny2/{}/Profile/{}/Character/{}/Vendors/{}/",
            i32::from(p.membership_type),
            p.destiny_membership_id,
            p.character_id,
            p.vendor_hash
        );
        self.get(&path, &Self::components_query(p.components)).await
    }

    pub async fn get_bungie_net_user_by_id(&self, id: &str) -> Result<GeneralUser> {
        self.get(&format!("/User/GetBungieNetUserById/{id}/"), &[]).await
    }

    /// Needs OAuth
    pub async fn get_membership_data_for_current_user(&self) -> Result<UserMembershipData> {
        self.get("/User/GetMembershipsForCurrentUser/", &[]).await
    }

    /// Needs OAuth, and the user must own the application
    pub async fn get_application_api_usage(&self, application_id: u64) -> Result<ApiUsage> {
        self.get(&format!("/App/ApiUsage/{application_id}/"), &[]).await
    }

    /// Raw GET of a path relative to the base (manifest table files live here)
    pub async fn fetch_text(&self, path: &str) -> Result<String> {
        let url = format!("{}{path}", self.base);
        let rb = http_client().get(&url).timeout(self.timeout);
        let res = send_with_backoff(rb, path, self.retries).await?;
        let status = res.status();
        if !status.is_success() {
            return Err(anyhow!("{path}: http {status}"));
        }
        res.text()
            .await
            .with_context(|| format!("{path}: failed to read body"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_envelope_names_status_and_message() {
        let env: ServerResponse<serde_json::Value> = serde_json::from_str(
            r#"{"ErrorCode":99,"ThrottleSeconds":0,"ErrorStatus":"WebAuthRequired",
                "Message":"Please sign-in to continue.","MessageData":{}}"#,
        )
        .unwrap();
        let err = unwrap_envelope(env, "/User/GetMembershipsForCurrentUser/").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("WebAuthRequired"));
        assert!(msg.contains("(99)"));
        assert!(msg.contains("Please sign-in"));
    }

    #[test]
    fn successful_envelope_yields_response() {
        let env: ServerResponse<CoreSettingsConfiguration> = serde_json::from_str(
            r#"{"Response":{"destiny2CoreSettings":{"currentSeasonHash":42}},
                "ErrorCode":1,"ErrorStatus":"Success","Message":"Ok"}"#,
        )
        .unwrap();
        let settings = unwrap_envelope(env, "/Settings/").unwrap();
        assert_eq!(settings.destiny2_core_settings.current_season_hash, 42);
    }

    #[test]
    fn success_without_response_is_an_error() {
        let env: ServerResponse<CoreSettingsConfiguration> =
            serde_json::from_str(r#"{"ErrorCode":1}"#).unwrap();
        assert!(unwrap_envelope(env, "/Settings/").is_err());
    }

    #[test]
    fn with_oauth_keeps_base_settings() {
        let c = BungieClient::anonymous("https://example.test", Some("k".into()), 1000, 1);
        assert!(!c.is_authenticated());
        assert_eq!(c.base(), "https://example.test");
    }
}
