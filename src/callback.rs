//! Local OAuth redirect listener
//!
//! Register `http://127.0.0.1:<port>/oauth/callback` (or a tunnel to it) as the
//! application's redirect URL. The listener forwards `code`/`state` to the app
//! and tells the browser tab it can be closed.
//!
//! ## Endpoints
//! - GET /health - Health check
//! - GET /oauth/callback?code=..&state=.. - Authorization redirect

use anyhow::{Context, Result};
use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::oauth::parse_callback;
use crate::types::AppEvent;

const DONE_PAGE: &str = "<!doctype html><title>d2x</title>\
<p>Authorization received. You can close this tab and return to the terminal.</p>";

pub struct CallbackListener {
    pub addr: SocketAddr,
    task: JoinHandle<()>,
}

impl CallbackListener {
    pub fn redirect_url(&self) -> String {
        format!("http://{}/oauth/callback", self.addr)
    }

    pub fn abort(&self) {
        self.task.abort();
    }
}

pub fn router(tx: UnboundedSender<AppEvent>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/oauth/callback", get(handle_callback))
        .with_state(tx)
}

/// Bind 127.0.0.1:<port> (0 picks a free port) and serve in the background
pub async fn start(port: u16, tx: UnboundedSender<AppEvent>) -> Result<CallbackListener> {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .with_context(|| format!("Failed to bind OAuth listener on port {port}"))?;
    let addr = listener.local_addr()?;
    log::info!("[callback] listening on http://{addr}/oauth/callback");

    let app = router(tx);
    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            log::warn!("[callback] server stopped: {e}");
        }
    });
    Ok(CallbackListener { addr, task })
}

async fn handle_callback(
    State(tx): State<UnboundedSender<AppEvent>>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let query = query.unwrap_or_default();
    match parse_callback(&format!("?{query}")) {
        Ok(params) => {
            log::info!("[callback] authorization code received");
            let _ = tx.send(AppEvent::OAuthCallback(params));
            (StatusCode::OK, Html(DONE_PAGE.to_string()))
        }
        Err(e) => {
            log::warn!("[callback] rejected: {e}");
            let _ = tx.send(AppEvent::OAuthCompleted(Err(e.to_string())));
            (
                StatusCode::BAD_REQUEST,
                Html(format!(
                    "<!doctype html><title>d2x</title><p>{}</p>",
                    escape_html(&e.to_string())
                )),
            )
        }
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
