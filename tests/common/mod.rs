//! In-process stand-in for the handful of Bungie.net endpoints d2x calls.
#![allow(dead_code)]

use axum::{
    extract::{Form, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const CLIENT_ID: &str = "4242";
pub const GOOD_CODE: &str = "good-code";
pub const BUNGIE_USER: &str = "9001";
pub const DESTINY_MEMBERSHIP: &str = "4611686018400000001";
pub const CHARACTER: &str = "2305843009300000001";

#[derive(Default)]
pub struct Recorded {
    pub downloads: AtomicUsize,
    pub manifest_version: Mutex<String>,
    /// (form fields, Authorization header) per token request
    pub token_requests: Mutex<Vec<(HashMap<String, String>, Option<String>)>>,
    pub bearers: Mutex<Vec<String>>,
    pub paths: Mutex<Vec<String>>,
    /// Vendor sales handed out, keyed by vendorItemIndex
    pub sales: Mutex<Value>,
    /// Statuses answered, in order, before platform requests are served normally
    pub failures: Mutex<VecDeque<u16>>,
}

#[derive(Clone)]
pub struct Fake {
    pub rec: Arc<Recorded>,
    pub base: String,
}

impl Fake {
    pub fn downloads(&self) -> usize {
        self.rec.downloads.load(Ordering::SeqCst)
    }

    pub fn set_manifest_version(&self, v: &str) {
        *self.rec.manifest_version.lock().unwrap() = v.to_string();
    }

    pub fn token_requests(&self) -> Vec<(HashMap<String, String>, Option<String>)> {
        self.rec.token_requests.lock().unwrap().clone()
    }

    pub fn bearers(&self) -> Vec<String> {
        self.rec.bearers.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.rec.paths.lock().unwrap().clone()
    }

    pub fn set_sales(&self, sales: Value) {
        *self.rec.sales.lock().unwrap() = sales;
    }

    pub fn fail_next(&self, statuses: &[u16]) {
        self.rec.failures.lock().unwrap().extend(statuses);
    }

    pub fn hits(&self, path: &str) -> usize {
        self.paths().iter().filter(|p| p.as_str() == path).count()
    }
}

pub async fn start() -> Fake {
    let rec = Arc::new(Recorded::default());
    *rec.manifest_version.lock().unwrap() = "v1".into();
    *rec.sales.lock().unwrap() = json!({
        "3":  { "vendorItemIndex": 3,  "itemHash": 1 },
        "17": { "vendorItemIndex": 17, "itemHash": 4 },
        "40": { "vendorItemIndex": 40, "itemHash": 2 }
    });

    let app = Router::new()
        .route("/Platform/App/OAuth/Token/", post(token))
        .fallback(platform)
        .with_state(rec.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Fake {
        rec,
        base: format!("http://{addr}"),
    }
}

pub const ITEMS: &str = r#"{
    "1": { "hash": 1, "itemType": 3, "itemTypeDisplayName": "Auto Rifle",
           "displayProperties": { "name": "Ace", "icon": "/common/ace.jpg" } },
    "2": { "hash": 2, "itemType": 2, "itemTypeDisplayName": "Helmet",
           "displayProperties": { "name": "Cowl" } },
    "4": { "hash": 4, "itemType": 2, "itemTypeDisplayName": "Chest Armor",
           "displayProperties": { "name": "Vest" } },
    "2575506895": { "hash": 2575506895, "itemType": 3, "itemTypeDisplayName": "Hand Cannon",
           "displayProperties": { "name": "Kindled Orchid", "icon": "/common/orchid.jpg" } }
}"#;

pub const SEASONS: &str = r#"{
    "77": { "hash": 77, "seasonNumber": 24, "displayProperties": { "name": "Episode: Heresy" } }
}"#;

pub const STATS: &str = r#"{
    "2996146975": { "hash": 2996146975, "displayProperties": { "name": "Mobility" } },
    "392767087":  { "hash": 392767087,  "displayProperties": { "name": "Resilience" } }
}"#;

fn envelope(v: Value) -> Response {
    Json(json!({
        "Response": v,
        "ErrorCode": 1,
        "ThrottleSeconds": 0,
        "ErrorStatus": "Success",
        "Message": "Ok",
        "MessageData": {}
    }))
    .into_response()
}

fn auth_required() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "ErrorCode": 99,
            "ThrottleSeconds": 0,
            "ErrorStatus": "WebAuthRequired",
            "Message": "Please sign-in to continue.",
            "MessageData": {}
        })),
    )
        .into_response()
}

fn bearer(rec: &Recorded, headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.to_string();
    rec.bearers.lock().unwrap().push(token.clone());
    Some(token)
}

async fn token(
    State(rec): State<Arc<Recorded>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    rec.token_requests
        .lock()
        .unwrap()
        .push((form.clone(), auth.clone()));

    let confidential = auth.is_some_and(|a| a.starts_with("Basic "));
    let refresh = confidential.then(|| {
        json!({ "refresh_token": "refresh-1", "refresh_expires_in": 7_776_000 })
    });
    let issue = |access: &str| {
        let mut body = json!({
            "access_token": access,
            "token_type": "Bearer",
            "expires_in": 3600,
            "membership_id": BUNGIE_USER
        });
        if let (Some(obj), Some(Value::Object(extra))) = (body.as_object_mut(), refresh.clone()) {
            obj.extend(extra);
        }
        Json(body).into_response()
    };

    match form.get("grant_type").map(String::as_str) {
        Some("authorization_code") if form.get("code").map(String::as_str) == Some(GOOD_CODE) => {
            issue("access-1")
        }
        Some("refresh_token") if confidential => issue("access-2"),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant", "error_description": "AuthorizationCodeInvalid" })),
        )
            .into_response(),
    }
}

async fn platform(State(rec): State<Arc<Recorded>>, uri: Uri, headers: HeaderMap) -> Response {
    let path = uri.path().to_string();
    rec.paths.lock().unwrap().push(match uri.query() {
        Some(q) => format!("{path}?{q}"),
        None => path.clone(),
    });

    let failure = rec.failures.lock().unwrap().pop_front();
    if let Some(code) = failure {
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, "try again later").into_response();
    }

    if let Some(file) = path.strip_prefix("/content/") {
        rec.downloads.fetch_add(1, Ordering::SeqCst);
        let body = match file {
            "items.json" => ITEMS,
            "seasons.json" => SEASONS,
            "stats.json" => STATS,
            _ => return StatusCode::NOT_FOUND.into_response(),
        };
        return ([(header::CONTENT_TYPE, "application/json")], body).into_response();
    }

    match path.as_str() {
        "/Platform/Destiny2/Manifest/" => {
            let version = rec.manifest_version.lock().unwrap().clone();
            return envelope(json!({
                "version": version,
                "jsonWorldComponentContentPaths": { "en": {
                    "DestinyInventoryItemLiteDefinition": "/content/items.json",
                    "DestinySeasonDefinition": "/content/seasons.json",
                    "DestinyStatDefinition": "/content/stats.json"
                } }
            }));
        }
        "/Platform/Settings/" => {
            return envelope(json!({ "destiny2CoreSettings": { "currentSeasonHash": 77 } }));
        }
        "/Platform/User/GetMembershipsForCurrentUser/" => {
            if bearer(&rec, &headers).is_none() {
                return auth_required();
            }
            return envelope(json!({
                "destinyMemberships": [
                    { "membershipId": "1", "membershipType": 1, "displayName": "old" },
                    { "membershipId": DESTINY_MEMBERSHIP, "membershipType": 3, "displayName": "main" }
                ],
                "primaryMembershipId": DESTINY_MEMBERSHIP
            }));
        }
        _ => {}
    }

    if let Some(id) = path
        .strip_prefix("/Platform/User/GetBungieNetUserById/")
        .and_then(|rest| rest.strip_suffix('/'))
    {
        return envelope(json!({
            "membershipId": id,
            "displayName": "legacy",
            "cachedBungieGlobalDisplayName": "Tester",
            "cachedBungieGlobalDisplayNameCode": 42
        }));
    }

    if path.starts_with("/Platform/App/ApiUsage/") {
        if bearer(&rec, &headers).is_none() {
            return auth_required();
        }
        return envelope(json!({
            "apiCalls": [{ "target": "calls", "datapoints": [{ "time": "t", "count": 5.0 }] }],
            "throttledRequests": []
        }));
    }

    if path.starts_with("/Platform/Destiny2/") {
        if path.contains("/Vendors/") {
            if bearer(&rec, &headers).is_none() {
                return auth_required();
            }
            let sales = rec.sales.lock().unwrap().clone();
            return envelope(json!({
                "sales": { "data": sales },
                "itemComponents": { "stats": { "data": {
                    "17": { "stats": {
                        "2996146975": { "statHash": 2996146975u32, "value": 12 },
                        "392767087":  { "statHash": 392767087,  "value": 20 }
                    } }
                } } }
            }));
        }
        if path.contains("/Character/") {
            return envelope(json!({
                "equipment": { "data": { "items": [
                    { "itemHash": 2, "bucketHash": 3448274439u32 },
                    { "itemHash": 1, "bucketHash": 1498876634 }
                ] } }
            }));
        }
        if path.contains("/Profile/") {
            return envelope(json!({
                "profile": { "data": { "characterIds": [CHARACTER, "2305843009300000002"] } }
            }));
        }
    }

    (StatusCode::NOT_FOUND, "not found").into_response()
}

/// A SQLite file nobody else uses
pub fn temp_db(name: &str) -> std::path::PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    std::env::temp_dir().join(format!("d2x-test-{name}-{}-{nanos}.db", std::process::id()))
}
