mod common;

use chrono::{Duration, Utc};
use common::{BUNGIE_USER, CLIENT_ID, GOOD_CODE};
use d2x::{
    auth::OAuthSession,
    bungie_api::BungieClient,
    oauth::{complete_flow, CallbackParams, OAuthClient, TokenSet},
    storage::Store,
};
use std::sync::Arc;

fn public(fake: &common::Fake) -> OAuthClient {
    OAuthClient::new(fake.base.clone(), CLIENT_ID, None, 5_000, 0)
}

fn confidential(fake: &common::Fake) -> OAuthClient {
    OAuthClient::new(fake.base.clone(), CLIENT_ID, Some("shh".into()), 5_000, 0)
}

fn callback(code: &str, state: Option<&str>) -> CallbackParams {
    CallbackParams {
        code: code.into(),
        state: state.map(str::to_string),
    }
}

fn aged_token(access: &str, refresh: Option<&str>, age: Duration) -> TokenSet {
    TokenSet {
        access_token: access.into(),
        token_type: "Bearer".into(),
        expires_in: 3600,
        refresh_token: refresh.map(str::to_string),
        refresh_expires_in: refresh.map(|_| 7_776_000),
        membership_id: BUNGIE_USER.into(),
        acquired_at: Utc::now() - age,
    }
}

#[tokio::test]
async fn public_client_exchange_is_stored_as_latest() {
    let fake = common::start().await;
    let store = Store::in_memory().unwrap();
    let oauth = public(&fake);

    let token = complete_flow(&oauth, &store, &callback(GOOD_CODE, Some("s1")), Some("s1"))
        .await
        .unwrap();
    assert_eq!(token.access_token, "access-1");
    assert_eq!(token.membership_id, BUNGIE_USER);
    assert!(token.refresh_token.is_none());

    let reqs = fake.token_requests();
    assert_eq!(reqs.len(), 1);
    let (form, auth) = &reqs[0];
    assert_eq!(form.get("grant_type").map(String::as_str), Some("authorization_code"));
    assert_eq!(form.get("client_id").map(String::as_str), Some(CLIENT_ID));
    assert!(auth.is_none());

    let latest = OAuthSession::latest(&oauth, &store).await.unwrap().unwrap();
    assert_eq!(latest.membership_id, BUNGIE_USER);
    assert_eq!(latest.access_token, "access-1");
}

#[tokio::test]
async fn confidential_client_uses_basic_auth() {
    let fake = common::start().await;
    let store = Store::in_memory().unwrap();

    let token = complete_flow(&confidential(&fake), &store, &callback(GOOD_CODE, None), None)
        .await
        .unwrap();
    assert_eq!(token.refresh_token.as_deref(), Some("refresh-1"));

    let (form, auth) = &fake.token_requests()[0];
    assert!(form.get("client_id").is_none());
    assert!(auth.as_deref().is_some_and(|a| a.starts_with("Basic ")));
}

#[tokio::test]
async fn state_mismatch_never_reaches_the_token_endpoint() {
    let fake = common::start().await;
    let store = Store::in_memory().unwrap();

    let err = complete_flow(&public(&fake), &store, &callback(GOOD_CODE, Some("evil")), Some("mine"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("state mismatch"));
    assert!(fake.token_requests().is_empty());
    assert!(OAuthSession::latest(&public(&fake), &store).await.unwrap().is_none());
}

#[tokio::test]
async fn rejected_code_reports_token_error() {
    let fake = common::start().await;
    let err = complete_flow(
        &public(&fake),
        &Store::in_memory().unwrap(),
        &callback("stale", None),
        None,
    )
    .await
    .unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("invalid_grant"), "{msg}");
}

#[tokio::test]
async fn session_refreshes_expired_token_and_persists_it() {
    let fake = common::start().await;
    let store = Store::in_memory().unwrap();
    let stale = aged_token("access-old", Some("refresh-1"), Duration::hours(2));
    store
        .call(move |s| s.put_token(CLIENT_ID, &stale))
        .await
        .unwrap();

    let session = OAuthSession::new(confidential(&fake), store.clone(), BUNGIE_USER);
    let client = BungieClient::anonymous(fake.base.clone(), Some("k".into()), 5_000, 0)
        .with_oauth(Arc::new(session));
    let memberships = client.get_membership_data_for_current_user().await.unwrap();
    assert_eq!(memberships.destiny_memberships.len(), 2);

    assert_eq!(fake.bearers(), vec!["access-2".to_string()]);
    let (form, _) = &fake.token_requests()[0];
    assert_eq!(form.get("grant_type").map(String::as_str), Some("refresh_token"));
    assert_eq!(form.get("refresh_token").map(String::as_str), Some("refresh-1"));

    let stored = store
        .call(|s| s.token_for(CLIENT_ID, BUNGIE_USER))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.access_token, "access-2");
}

#[tokio::test]
async fn valid_token_is_used_without_refreshing() {
    let fake = common::start().await;
    let store = Store::in_memory().unwrap();
    let fresh = aged_token("access-live", Some("refresh-1"), Duration::minutes(5));
    store
        .call(move |s| s.put_token(CLIENT_ID, &fresh))
        .await
        .unwrap();

    let session = Arc::new(OAuthSession::new(confidential(&fake), store, BUNGIE_USER));
    let client = BungieClient::anonymous(fake.base.clone(), None, 5_000, 0).with_oauth(session);
    client.get_membership_data_for_current_user().await.unwrap();
    client.get_membership_data_for_current_user().await.unwrap();

    assert_eq!(fake.bearers(), vec!["access-live".to_string(); 2]);
    assert!(fake.token_requests().is_empty());
}

#[tokio::test]
async fn expired_public_token_asks_for_a_new_authorization() {
    let fake = common::start().await;
    let store = Store::in_memory().unwrap();
    let stale = aged_token("access-old", None, Duration::hours(2));
    store
        .call(move |s| s.put_token(CLIENT_ID, &stale))
        .await
        .unwrap();

    let session = OAuthSession::new(public(&fake), store.clone(), BUNGIE_USER);
    let err = session.access_token().await.unwrap_err();
    assert!(err.to_string().contains("authorize again"), "{err}");
    assert!(fake.token_requests().is_empty());

    // the dead token is dropped so the next start offers authorization again
    let left = store
        .call(|s| s.token_for(CLIENT_ID, BUNGIE_USER))
        .await
        .unwrap();
    assert!(left.is_none());
}
