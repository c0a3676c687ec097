use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::path::Path;

use crate::defs::DefTable;
use crate::theme::Theme;

/// d2x - Destiny 2 API demo explorer
///
/// Loads game definitions, calls a few Bungie.net endpoints and walks through
/// the OAuth authorization-code flow, all inside the terminal.
/// Configuration priority: CLI args > Environment variables > app-info file > Defaults
#[derive(Parser, Debug, Default)]
#[command(name = "d2x")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Destiny 2 API demo explorer", long_about = None)]
pub struct CliArgs {
    /// Bungie.net application API key
    #[arg(long, env = "BUNGIE_API_KEY")]
    pub api_key: Option<String>,

    /// OAuth client id of the Bungie.net application
    #[arg(long, env = "BUNGIE_CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth client secret (confidential clients only)
    #[arg(long, env = "BUNGIE_CLIENT_SECRET")]
    pub client_secret: Option<String>,

    /// TOML file holding a [bungie] table with api_key, client_id, client_secret
    #[arg(long, env = "D2X_APP_INFO")]
    pub app_info: Option<String>,

    /// Bungie.net base URL
    #[arg(long, env = "BUNGIE_API_BASE")]
    pub api_base: Option<String>,

    /// Manifest language (en, de, fr, ...)
    #[arg(long, env = "D2X_MANIFEST_LANG")]
    pub manifest_lang: Option<String>,

    /// Definition tables to load (comma-separated, e.g. "InventoryItemLite,Season,Stat")
    #[arg(long, env = "D2X_TABLES")]
    pub tables: Option<String>,

    /// Path to the SQLite cache for definitions and OAuth tokens
    #[arg(long, env = "D2X_DB_PATH")]
    pub db_path: Option<String>,

    /// HTTP request timeout in milliseconds (1000-60000)
    #[arg(long, env = "D2X_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Retry attempts for throttled or failed requests (0-10)
    #[arg(long, env = "D2X_RETRIES")]
    pub retries: Option<u32>,

    /// Local port for the OAuth redirect listener (0 disables it)
    #[arg(long, env = "D2X_CALLBACK_PORT")]
    pub callback_port: Option<u16>,

    /// Application id passed to the API usage endpoint
    #[arg(long, env = "D2X_APPLICATION_ID")]
    pub application_id: Option<u64>,

    /// Target UI rendering FPS (1-120)
    #[arg(long, env = "RENDER_FPS")]
    pub render_fps: Option<u32>,

    /// Color theme: nord, amber-crt, green-phosphor
    #[arg(long, env = "D2X_THEME")]
    pub theme: Option<String>,

    /// Render the page once as plain text to stdout instead of starting the TUI
    #[arg(long)]
    pub print: bool,

    /// How long --print waits for outstanding requests (1000-120000 ms)
    #[arg(long, env = "D2X_PRINT_TIMEOUT_MS")]
    pub print_timeout_ms: Option<u64>,

    /// Complete an OAuth flow with the redirect URL (or bare code) Bungie.net sent you to
    #[arg(long)]
    pub callback_url: Option<String>,

    /// Print the OAuth authorize URL and exit
    #[arg(long)]
    pub authorize_url: bool,
}

/// Credentials registered at bungie.net/en/Application
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppInfo {
    pub api_key: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl AppInfo {
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }
    pub fn client_secret(&self) -> Option<&str> {
        self.client_secret.as_deref()
    }
}

#[derive(Debug, Default, Deserialize)]
struct AppInfoFile {
    #[serde(default)]
    bungie: AppInfoTable,
}

#[derive(Debug, Default, Deserialize)]
struct AppInfoTable {
    api_key: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub app_info: AppInfo,
    pub api_base: String,
    pub manifest_lang: String,
    pub tables: Vec<DefTable>,
    pub db_path: String,
    pub timeout_ms: u64,
    pub retries: u32,
    pub callback_port: u16,
    pub application_id: u64,
    pub render_fps: u32,
    pub theme: Theme,
    pub print: bool,
    pub print_timeout_ms: u64,
    pub callback_url: Option<String>,
    pub authorize_url: bool,
}

/// Validate that a value is within a given range (inclusive)
fn validate_in_range<T>(val: T, min: T, max: T, name: &str) -> Result<T>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if val < min || val > max {
        Err(anyhow!("{name} must be in range [{min}, {max}], got {val}"))
    } else {
        Ok(val)
    }
}

/// Empty strings count as "not configured"
fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Parse a comma-separated table list, rejecting unknown names
pub fn parse_tables(s: &str) -> Result<Vec<DefTable>> {
    let mut out = Vec::new();
    for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let table: DefTable = name.parse()?;
        if !out.contains(&table) {
            out.push(table);
        }
    }
    if out.is_empty() {
        return Err(anyhow!("D2X_TABLES must name at least one table"));
    }
    Ok(out)
}

fn read_app_info_file(path: &Path) -> Result<AppInfoFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read app info file {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("Invalid app info file {}", path.display()))
}

/// Load configuration from CLI args and environment variables
/// Priority: CLI args > Environment variables > app-info file > Defaults
pub fn load() -> Result<Config> {
    from_args(CliArgs::parse())
}

pub fn from_args(args: CliArgs) -> Result<Config> {
    // An explicit app-info path must exist; the default one is optional
    let file = match args.app_info.as_deref() {
        Some(p) => read_app_info_file(Path::new(p))?,
        None if Path::new("d2x.toml").exists() => read_app_info_file(Path::new("d2x.toml"))?,
        None => AppInfoFile::default(),
    };

    let app_info = AppInfo {
        api_key: non_empty(args.api_key).or_else(|| non_empty(file.bungie.api_key)),
        client_id: non_empty(args.client_id).or_else(|| non_empty(file.bungie.client_id)),
        client_secret: non_empty(args.client_secret)
            .or_else(|| non_empty(file.bungie.client_secret)),
    };

    let api_base = args
        .api_base
        .unwrap_or_else(|| crate::constants::bungie::DEFAULT_BASE.to_string());
    validate_url(&api_base, "BUNGIE_API_BASE")?;
    let api_base = api_base.trim_end_matches('/').to_string();

    let manifest_lang = args.manifest_lang.unwrap_or_else(|| "en".to_string());
    if manifest_lang.is_empty() {
        return Err(anyhow!("D2X_MANIFEST_LANG cannot be empty"));
    }

    let tables = parse_tables(
        args.tables
            .as_deref()
            .unwrap_or("InventoryItemLite,Season,Stat"),
    )?;

    let db_path = args.db_path.unwrap_or_else(|| "./d2x_cache.db".to_string());

    let timeout_ms = validate_in_range(
        args.timeout_ms.unwrap_or(15000),
        1000,
        60000,
        "D2X_TIMEOUT_MS",
    )?;
    let retries = validate_in_range(args.retries.unwrap_or(2), 0, 10, "D2X_RETRIES")?;
    let render_fps = validate_in_range(args.render_fps.unwrap_or(20), 1, 120, "RENDER_FPS")?;
    let print_timeout_ms = validate_in_range(
        args.print_timeout_ms.unwrap_or(60000),
        1000,
        120000,
        "D2X_PRINT_TIMEOUT_MS",
    )?;

    let theme = match args.theme.as_deref() {
        Some(t) => Theme::from_str(t).map_err(|e| anyhow!(e))?,
        None => Theme::default(),
    };

    if args.authorize_url && app_info.client_id.is_none() {
        return Err(anyhow!("--authorize-url needs BUNGIE_CLIENT_ID"));
    }

    Ok(Config {
        app_info,
        api_base,
        manifest_lang,
        tables,
        db_path,
        timeout_ms,
        retries,
        callback_port: args.callback_port.unwrap_or(7878),
        application_id: args
            .application_id
            .unwrap_or(crate::constants::demo::APPLICATION_ID),
        render_fps,
        theme,
        print: args.print,
        print_timeout_ms,
        callback_url: non_empty(args.callback_url),
        authorize_url: args.authorize_url,
    })
}

/// Validate URL format (basic check)
fn validate_url(url: &str, name: &str) -> Result<()> {
    if url.is_empty() {
        return Err(anyhow!("{name} cannot be empty"));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(anyhow!("{name} must start with http:// or https://"))
    }
}

impl Config {
    /// Print current configuration (useful for debugging)
    pub fn print_summary(&self) {
        let shown = |v: Option<&str>| if v.is_some() { "configured" } else { "missing" };
        eprintln!("d2x Configuration:");
        eprintln!("  API base: {}", self.api_base);
        eprintln!("  API key: {}", shown(self.app_info.api_key()));
        eprintln!("  Client id: {}", self.app_info.client_id().unwrap_or("missing"));
        eprintln!("  Client secret: {}", shown(self.app_info.client_secret()));
        eprintln!(
            "  Tables: {} ({})",
            self.tables
                .iter()
                .map(|t| t.name())
                .collect::<Vec<_>>()
                .join(","),
            self.manifest_lang
        );
        eprintln!("  Cache: {}", self.db_path);
        eprintln!("  Timeout: {}ms, retries: {}", self.timeout_ms, self.retries);
        if self.callback_port == 0 {
            eprintln!("  OAuth listener: disabled");
        } else {
            eprintln!("  OAuth listener: 127.0.0.1:{}", self.callback_port);
        }
    }
}
