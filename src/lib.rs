//! d2x - Destiny 2 API demo explorer
//!
//! A terminal page that exercises the Bungie.net API the way a first app
//! would: load manifest definitions, hit a few public endpoints, then walk
//! through OAuth and make a request as the logged-in user.
//!
//! ## Architecture
//!
//! - **tasks**: one tokio task per fetch-and-render unit, each posting a
//!   single `AppEvent` back to the UI loop
//! - **app**: the state those events land in (sole owner, UI thread)
//! - **view**: app state -> styled page lines, shared by the TUI and `--print`
//!
//! ## Usage
//!
//! ```bash
//! BUNGIE_API_KEY=... cargo run --bin d2x
//! BUNGIE_API_KEY=... cargo run --bin d2x -- --print
//! ```

// Configuration and static data
pub mod config;
pub mod constants;
pub mod theme;

// Wire types and manifest definitions
pub mod defs;
pub mod models;

// Persistence (manifest cache + OAuth tokens)
pub mod storage;

// Network: retrying HTTP, Bungie.net client, OAuth
pub mod auth;
pub mod bungie_api;
pub mod callback;
pub mod manifest;
pub mod net;
pub mod oauth;

// App state, task layer and rendering
pub mod app;
pub mod tasks;
pub mod types;
pub mod ui;
pub mod view;

// Re-export commonly used types
pub use app::{App, InputMode};
pub use config::{AppInfo, Config};
pub use types::{AppEvent, Command, Loadable};
