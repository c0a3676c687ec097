//! Bungie.net OAuth2 authorization-code flow.
//!
//! - Authorize: send the user to `/en/OAuth/Authorize?client_id=..&response_type=code&state=..`
//! - Callback: Bungie.net redirects back with `?code=..&state=..`
//! - Exchange: POST the code to `/Platform/App/OAuth/Token/`
//! - Refresh: only confidential clients (with a client secret) get refresh tokens;
//!   a public client's token simply expires after an hour.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};

use crate::constants::bungie::{AUTHORIZE_PATH, TOKEN_PATH};
use crate::net::{http_client, send_with_backoff};
use crate::storage::Store;

/// Clock skew allowance when deciding whether a token is still usable
const EXPIRY_MARGIN_SECS: i64 = 30;

/// Token endpoint response, plus the moment we received it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    /// Seconds the access token is valid for
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub refresh_expires_in: Option<i64>,
    /// Bungie.net membership id of the user who authorized
    pub membership_id: String,
    #[serde(default = "Utc::now")]
    pub acquired_at: DateTime<Utc>,
}

impl TokenSet {
    pub fn access_expires_at(&self) -> DateTime<Utc> {
        self.acquired_at + Duration::seconds(self.expires_in)
    }

    pub fn access_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) >= self.access_expires_at()
    }

    /// Tokens without a refresh token count as refresh-expired
    pub fn refresh_expired(&self, now: DateTime<Utc>) -> bool {
        match (&self.refresh_token, self.refresh_expires_in) {
            (Some(_), Some(secs)) => {
                now + Duration::seconds(EXPIRY_MARGIN_SECS)
                    >= self.acquired_at + Duration::seconds(secs)
            }
            _ => true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenError {
    error: String,
    #[serde(default)]
    error_description: String,
}

/// What came back on the redirect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: String,
    pub state: Option<String>,
}

/// Random opaque state echoed back by the authorize redirect
pub fn new_state() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect()
}

pub fn authorize_url(base: &str, client_id: &str, state: &str) -> String {
    format!(
        "{base}{AUTHORIZE_PATH}?client_id={}&response_type=code&state={}",
        urlencoding::encode(client_id),
        urlencoding::encode(state)
    )
}

/// Parse whatever the user has: a full redirect URL, its query string,
/// or just the code. An `error=` parameter means the user declined.
pub fn parse_callback(input: &str) -> Result<CallbackParams> {
    let input = input.trim();
    if input.is_empty() {
        return Err(anyhow!("empty callback"));
    }

    let query = match input.split_once('?') {
        Some((_, q)) => q,
        None if input.contains('=') => input,
        None => {
            return Ok(CallbackParams {
                code: input.to_string(),
                state: None,
            });
        }
    };
    let query = query.split('#').next().unwrap_or_default();

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut error_description = String::new();
    for kv in query.split('&') {
        let mut it = kv.splitn(2, '=');
        let k = it.next().unwrap_or_default().trim().to_ascii_lowercase();
        let v = it.next().unwrap_or_default();
        let v = urlencoding::decode(v)
            .map(|c| c.into_owned())
            .unwrap_or_else(|_| v.to_string());
        match k.as_str() {
            "code" if !v.is_empty() => code = Some(v),
            "state" if !v.is_empty() => state = Some(v),
            "error" => error = Some(v),
            "error_description" => error_description = v,
            _ => {}
        }
    }

    if let Some(e) = error {
        return Err(anyhow!("authorization failed: {e} {error_description}"));
    }
    let code = code.ok_or_else(|| anyhow!("callback has no code parameter"))?;
    Ok(CallbackParams { code, state })
}

/// A pasted bare code carries no state; anything else must match
pub fn verify_state(expected: Option<&str>, got: Option<&str>) -> Result<()> {
    match (expected, got) {
        (Some(e), Some(g)) if e != g => Err(anyhow!("OAuth state mismatch")),
        (_, None) => {
            log::warn!("[oauth] callback without state, skipping state check");
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Token endpoint client for one registered application
#[derive(Clone, Debug)]
pub struct OAuthClient {
    base: String,
    client_id: String,
    client_secret: Option<String>,
    timeout: std::time::Duration,
    retries: u32,
}

impl OAuthClient {
    pub fn new(
        base: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: Option<String>,
        timeout_ms: u64,
        retries: u32,
    ) -> Self {
        Self {
            base: base.into(),
            client_id: client_id.into(),
            client_secret,
            timeout: std::time::Duration::from_millis(timeout_ms),
            retries,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn has_secret(&self) -> bool {
        self.client_secret.is_some()
    }

    pub fn can_refresh(&self, token: &TokenSet, now: DateTime<Utc>) -> bool {
        self.has_secret() && !token.refresh_expired(now)
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet> {
        log::info!("[oauth] exchanging authorization code");
        self.token_request(&[("grant_type", "authorization_code"), ("code", code)])
            .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenSet> {
        if !self.has_secret() {
            return Err(anyhow!("refreshing a token needs the client secret"));
        }
        log::info!("[oauth] refreshing access token");
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn token_request(&self, fields: &[(&str, &str)]) -> Result<TokenSet> {
        let mut form: Vec<(&str, &str)> = fields.to_vec();
        let mut rb = http_client()
            .post(format!("{}{TOKEN_PATH}", self.base))
            .timeout(self.timeout);
        // Confidential clients authenticate with HTTP Basic, public ones name themselves
        match &self.client_secret {
            Some(secret) => rb = rb.basic_auth(&self.client_id, Some(secret)),
            None => form.push(("client_id", self.client_id.as_str())),
        }
        let rb = rb.form(&form);

        let res = send_with_backoff(rb, "oauth token", self.retries).await?;
        let status = res.status();
        let body = res.text().await.context("Failed to read token response")?;
        if !status.is_success() {
            let detail = serde_json::from_str::<TokenError>(&body)
                .map(|e| format!("{} {}", e.error, e.error_description))
                .unwrap_or(body);
            return Err(anyhow!("token endpoint error ({status}): {}", detail.trim()));
        }
        let token: TokenSet =
            serde_json::from_str(&body).context("Failed to parse token response")?;
        log::info!(
            "[oauth] token acquired for Bungie.net user {} (expires in {}s, refresh: {})",
            token.membership_id,
            token.expires_in,
            token.refresh_token.is_some()
        );
        Ok(token)
    }
}

/// Check state, exchange the code and remember the token.
pub async fn complete_flow(
    client: &OAuthClient,
    store: &Store,
    callback: &CallbackParams,
    expected_state: Option<&str>,
) -> Result<TokenSet> {
    verify_state(expected_state, callback.state.as_deref())?;
    let token = client.exchange_code(&callback.code).await?;
    let client_id = client.client_id().to_string();
    let stored = token.clone();
    store
        .call(move |s| s.put_token(&client_id, &stored))
        .await
        .context("Failed to store OAuth token")?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expires_in: i64, refresh: Option<i64>, age_secs: i64) -> TokenSet {
        TokenSet {
            access_token: "a".into(),
            token_type: "Bearer".into(),
            expires_in,
            refresh_token: refresh.map(|_| "r".to_string()),
            refresh_expires_in: refresh,
            membership_id: "123".into(),
            acquired_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[test]
    fn parses_full_redirect_url() {
        let p = parse_callback("https://localhost:7878/oauth/callback?code=abc%2B1&state=xyz#frag")
            .unwrap();
        assert_eq!(p.code, "abc+1");
        assert_eq!(p.state.as_deref(), Some("xyz"));
    }

    #[test]
    fn parses_query_and_bare_code() {
        let p = parse_callback("code=c1&state=s1&foo=bar").unwrap();
        assert_eq!(p, CallbackParams { code: "c1".into(), state: Some("s1".into()) });

        let p = parse_callback("  deadbeef ").unwrap();
        assert_eq!(p, CallbackParams { code: "deadbeef".into(), state: None });
    }

    #[test]
    fn declined_or_codeless_callbacks_fail() {
        let err = parse_callback("?error=access_denied&error_description=nope").unwrap_err();
        assert!(err.to_string().contains("access_denied"));
        assert!(parse_callback("https://x/cb?state=s").is_err());
        assert!(parse_callback("").is_err());
    }

    #[test]
    fn state_must_match_when_present() {
        assert!(verify_state(Some("a"), Some("a")).is_ok());
        assert!(verify_state(Some("a"), Some("b")).is_err());
        assert!(verify_state(Some("a"), None).is_ok());
        assert!(verify_state(None, Some("b")).is_ok());
    }

    #[test]
    fn authorize_url_carries_client_and_state() {
        let url = authorize_url("https://www.bungie.net", "12345", "st&te");
        assert_eq!(
            url,
            "https://www.bungie.net/en/OAuth/Authorize?client_id=12345&response_type=code&state=st%26te"
        );
    }

    #[test]
    fn states_are_random_and_url_safe() {
        let a = new_state();
        let b = new_state();
        assert_eq!(a.len(), 24);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn expiry_accounts_for_margin() {
        let now = Utc::now();
        assert!(!token(3600, None, 0).access_expired(now));
        assert!(token(3600, None, 3590).access_expired(now));
        assert!(token(3600, None, 0).refresh_expired(now));
        assert!(!token(3600, Some(7_776_000), 4000).refresh_expired(now));
    }

    #[test]
    fn only_confidential_clients_refresh() {
        let now = Utc::now();
        let t = token(3600, Some(7_776_000), 4000);
        let public = OAuthClient::new("https://x", "1", None, 1000, 0);
        let confidential = OAuthClient::new("https://x", "1", Some("s".into()), 1000, 0);
        assert!(!public.can_refresh(&t, now));
        assert!(confidential.can_refresh(&t, now));
    }

    #[test]
    fn wire_token_gets_an_acquisition_time() {
        let before = Utc::now();
        let t: TokenSet = serde_json::from_str(
            r#"{"access_token":"x","token_type":"Bearer","expires_in":3600,"membership_id":"9"}"#,
        )
        .unwrap();
        assert!(t.acquired_at >= before);
        assert!(t.refresh_token.is_none());
    }
}
