//! Application constants
//!
//! Endpoint roots, the fixed hashes and ids the demo page looks up, UI timing,
//! and user-facing strings.

/// Bungie.net endpoints
pub mod bungie {
    /// Root for the REST API, manifest files and item icons
    pub const DEFAULT_BASE: &str = "https://www.bungie.net";

    /// Browser-facing authorize page (relative to the base)
    pub const AUTHORIZE_PATH: &str = "/en/OAuth/Authorize";

    /// Token endpoint for code exchange and refresh (relative to the base)
    pub const TOKEN_PATH: &str = "/Platform/App/OAuth/Token/";

    /// Where developers register applications and read their credentials
    pub const APPLICATION_PORTAL: &str = "https://www.bungie.net/en/Application";

    /// `ErrorCode` value of a successful response envelope
    pub const ERROR_CODE_SUCCESS: i32 = 1;
}

/// Fixed accounts and hashes the demo page asks about
pub mod demo {
    /// A specific weapon shown under "have a specific weapon"
    pub const SPECIFIC_ITEM_HASH: u32 = 2575506895;

    /// Platypie0803's destiny membership (console player)
    pub const MEMBERSHIP_ID: &str = "4611686018455948551";

    /// Platypie0803's hunter
    pub const CHARACTER_ID: &str = "2305843009572044204";

    /// InventoryBucket 1498876634 "Kinetic Weapons"
    pub const KINETIC_BUCKET_HASH: u32 = 1498876634;

    /// Ada-1, the armor vendor
    pub const ADA_1_VENDOR_HASH: u32 = 350061650;

    /// Default application id for the API usage call
    pub const APPLICATION_ID: u64 = 16281;
}

/// Application state and behavior constants
pub mod app {
    /// Duration to show toast notifications (seconds)
    pub const TOAST_DURATION_SECS: u64 = 2;

    /// Maximum number of debug log lines to retain in memory
    pub const MAX_DEBUG_LOG_LINES: usize = 50;
}

/// User-facing message strings
pub mod messages {
    pub const IMMEDIATE: &str = "you can see this sentence immediately";
    pub const DEFS_AREA_NOTE: &str = "below this though, is the definitions-reliant area";
    pub const DEFS_FALLBACK: &str = "hi, definitions are loading...";
    pub const DEFS_READY: &str = "you can see this once the definitions load";
    pub const LOADING_SETTINGS: &str = "still loading settings";
    pub const LOADING_EQUIPMENT: &str = "still loading equipment";
    pub const LOADING_USER: &str = "loading user...";
    pub const LOADING_VENDOR: &str = "loading account and vendor info...";
    pub const NO_ARMOR: &str = "hmm. is ada-1 not selling any armor?";
}
