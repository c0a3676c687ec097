//! Page model
//!
//! Turns app state into a flat list of styled lines. The TUI renders these with
//! ratatui; `--print` writes them out as plain text.

use crate::app::App;
use crate::constants::{bungie, demo, messages};
use crate::defs::Definitions;
use crate::models::{
    CoreSettingsConfiguration, DestinyCharacterResponse, DestinyItemType, DestinyVendorResponse,
    DestinyVendorSaleItemComponent, GeneralUser,
};
use crate::types::Loadable;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Tone {
    Plain,
    Dim,
    Highlight,
    Code,
    Pending,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub tone: Tone,
}

impl Segment {
    pub fn new(text: impl Into<String>, tone: Tone) -> Self {
        Self {
            text: text.into(),
            tone,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Block {
    H2,
    H3,
    H4,
    Para,
    Bullet,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageLine {
    pub block: Block,
    pub segments: Vec<Segment>,
}

impl PageLine {
    fn new(block: Block, segments: Vec<Segment>) -> Self {
        Self { block, segments }
    }

    fn heading(block: Block, text: &str) -> Self {
        Self::new(block, vec![Segment::new(text, Tone::Plain)])
    }

    fn plain(text: impl Into<String>) -> Self {
        Self::new(Block::Para, vec![Segment::new(text, Tone::Plain)])
    }

    fn toned(text: impl Into<String>, tone: Tone) -> Self {
        Self::new(Block::Para, vec![Segment::new(text, tone)])
    }

    /// Concatenated segment text
    pub fn text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }
}

// ----- lookups -----

/// Item in the kinetic weapon bucket, if the equipment component came back
pub fn kinetic_item_hash(resp: &DestinyCharacterResponse) -> Option<u32> {
    resp.equipment
        .as_ref()?
        .data
        .as_ref()?
        .items
        .iter()
        .find(|i| i.bucket_hash == demo::KINETIC_BUCKET_HASH)
        .map(|i| i.item_hash)
}

/// `Name#0123`, or the legacy display name for accounts without a Bungie name
pub fn bungie_name(user: &GeneralUser) -> String {
    match (
        &user.cached_bungie_global_display_name,
        user.cached_bungie_global_display_name_code,
    ) {
        (Some(name), Some(code)) if !name.is_empty() => format!("{name}#{code:04}"),
        (Some(name), None) if !name.is_empty() => name.clone(),
        _ => user.display_name.clone(),
    }
}

pub fn season_text(settings: &CoreSettingsConfiguration, defs: &Definitions) -> String {
    let hash = settings.destiny2_core_settings.current_season_hash;
    match defs.get_season_def(hash) {
        Some(season) => format!(
            "it's currently season {}: {}",
            season.season_number, season.display_properties.name
        ),
        None => format!("it's currently an unknown season ({hash})"),
    }
}

/// First sale (ascending vendor item index) whose item is armor
pub fn find_armor_sale<'a>(
    resp: &'a DestinyVendorResponse,
    defs: &Definitions,
) -> Option<&'a DestinyVendorSaleItemComponent> {
    resp.sales.as_ref()?.data.as_ref()?.values().find(|sale| {
        defs.get_inventory_item_lite_def(sale.item_hash)
            .is_some_and(|d| d.item_type == DestinyItemType::Armor)
    })
}

/// (stat name, value) for a sale, ascending by stat hash
pub fn armor_stat_lines(
    resp: &DestinyVendorResponse,
    sale: &DestinyVendorSaleItemComponent,
    defs: &Definitions,
) -> Vec<(String, i32)> {
    let Some(stats) = resp
        .item_components
        .as_ref()
        .and_then(|c| c.stats.as_ref())
        .and_then(|s| s.data.as_ref())
        .and_then(|d| d.get(&sale.vendor_item_index))
    else {
        return Vec::new();
    };
    stats
        .stats
        .values()
        .map(|stat| {
            let name = defs
                .get_stat_def(stat.stat_hash)
                .map(|d| d.display_properties.name.clone())
                .unwrap_or_else(|| format!("stat {}", stat.stat_hash));
            (name, stat.value)
        })
        .collect()
}

/// Icon URL and name for an item, or a dim note when it can't be resolved
pub fn item_segments(defs: &Definitions, base: &str, hash: Option<u32>) -> Vec<Segment> {
    let Some(hash) = hash else {
        return vec![Segment::new("nothing there", Tone::Dim)];
    };
    match defs.get_inventory_item_lite_def(hash) {
        Some(def) => {
            let mut segs = Vec::new();
            if let Some(url) = def.display_properties.icon_url(base) {
                segs.push(Segment::new(format!("[{url}]"), Tone::Code));
                segs.push(Segment::new(" ", Tone::Plain));
            }
            segs.push(Segment::new(def.display_properties.name.clone(), Tone::Highlight));
            segs
        }
        None => vec![Segment::new(format!("unknown item {hash}"), Tone::Dim)],
    }
}

fn error_line(what: &str, err: &str) -> PageLine {
    PageLine::toned(format!("couldn't load {what}: {err}"), Tone::Error)
}

fn user_segments(app: &App, membership_id: &str) -> Vec<Segment> {
    match app.user(membership_id) {
        Some(Loadable::Ready(user)) => vec![Segment::new(bungie_name(user), Tone::Highlight)],
        Some(Loadable::Failed(e)) => {
            vec![Segment::new(format!("(lookup failed: {e})"), Tone::Error)]
        }
        _ => vec![Segment::new(messages::LOADING_USER, Tone::Pending)],
    }
}

/// Show the tail of a secret only
fn mask(secret: &str) -> String {
    let tail: String = secret
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if secret.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("****{tail}")
    }
}

// ----- page -----

pub fn page(app: &App) -> Vec<PageLine> {
    let mut out = vec![
        PageLine::heading(Block::H2, messages::IMMEDIATE),
        PageLine::toned(messages::DEFS_AREA_NOTE, Tone::Dim),
    ];

    match app.defs() {
        Loadable::Loading => out.push(PageLine::toned(messages::DEFS_FALLBACK, Tone::Pending)),
        Loadable::Failed(e) => out.push(error_line("definitions", e)),
        Loadable::Ready(defs) => definitions_area(app, defs, &mut out),
    }

    out.push(PageLine::heading(Block::H2, "pssst wanna OAuth?"));
    oauth_section(app, &mut out);
    out
}

fn definitions_area(app: &App, defs: &Definitions, out: &mut Vec<PageLine>) {
    let base = app.api_base();
    out.push(PageLine::heading(Block::H2, messages::DEFS_READY));

    out.push(PageLine::heading(Block::H3, "here, have a random weapon:"));
    out.push(PageLine::new(
        Block::Para,
        item_segments(defs, base, app.random_weapon()),
    ));
    out.push(PageLine::heading(Block::H3, "here, have a specific weapon:"));
    out.push(PageLine::new(
        Block::Para,
        item_segments(defs, base, Some(demo::SPECIFIC_ITEM_HASH)),
    ));

    out.push(PageLine::heading(Block::H2, "let's hit a few API endpoints"));
    out.push(PageLine::heading(Block::H3, "what season is it anyway?"));
    out.push(match app.settings() {
        Loadable::Loading => PageLine::toned(messages::LOADING_SETTINGS, Tone::Pending),
        Loadable::Failed(e) => error_line("settings", e),
        Loadable::Ready(settings) => PageLine::plain(season_text(settings, defs)),
    });

    out.push(PageLine::heading(Block::H3, "what's Platypie0803 up to?"));
    match app.equipment() {
        Loadable::Loading => out.push(PageLine::toned(messages::LOADING_EQUIPMENT, Tone::Pending)),
        Loadable::Failed(e) => out.push(error_line("equipment", e)),
        Loadable::Ready(resp) => {
            out.push(PageLine::plain("Platypie's hunter is currently holding a..."));
            out.push(PageLine::new(
                Block::Para,
                item_segments(defs, base, kinetic_item_hash(resp)),
            ));
        }
    }
}

fn oauth_section(app: &App, out: &mut Vec<PageLine>) {
    let info = app.app_info();
    let Some(client_id) = info.client_id() else {
        out.push(PageLine::plain(
            "you'll need to set your app information to try OAuth \
             (BUNGIE_CLIENT_ID, BUNGIE_API_KEY, BUNGIE_CLIENT_SECRET, or D2X_APP_INFO)",
        ));
        out.push(PageLine::new(
            Block::Para,
            vec![
                Segment::new("set up or get that information here: ", Tone::Plain),
                Segment::new(bungie::APPLICATION_PORTAL, Tone::Code),
            ],
        ));
        return;
    };

    match app.completed_user() {
        None => {
            out.push(PageLine::heading(Block::H3, "fyi:"));
            let value = |v: Option<String>| match v {
                Some(v) => Segment::new(v, Tone::Code),
                None => Segment::new("missing", Tone::Error),
            };
            out.push(PageLine::new(
                Block::Para,
                vec![
                    Segment::new("your client_id is ", Tone::Plain),
                    value(Some(client_id.to_string())),
                ],
            ));
            out.push(PageLine::new(
                Block::Para,
                vec![
                    Segment::new("your api_key is ", Tone::Plain),
                    value(info.api_key().map(str::to_string)),
                ],
            ));
            out.push(PageLine::new(
                Block::Para,
                vec![
                    Segment::new("your client_secret is ", Tone::Plain),
                    value(info.client_secret().map(mask)),
                ],
            ));

            if info.api_key().is_none() || info.client_secret().is_none() {
                out.push(PageLine::plain(
                    "client_id is all that's required to establish OAuth, but:",
                ));
                if info.api_key().is_none() {
                    out.push(PageLine::new(
                        Block::Bullet,
                        vec![Segment::new(
                            "api_key will be required to make API requests using OAuth",
                            Tone::Plain,
                        )],
                    ));
                }
                if info.client_secret().is_none() {
                    out.push(PageLine::new(
                        Block::Bullet,
                        vec![Segment::new(
                            "without client_secret, OAuth expires after 1 hour",
                            Tone::Plain,
                        )],
                    ));
                    out.push(PageLine::new(
                        Block::Bullet,
                        vec![
                            Segment::new(
                                "(longer requires a \"Confidential\" OAuth Client Type here: ",
                                Tone::Plain,
                            ),
                            Segment::new(bungie::APPLICATION_PORTAL, Tone::Code),
                            Segment::new(")", Tone::Plain),
                        ],
                    ));
                }
            }

            if app.latest_authed().is_some() {
                out.push(PageLine::plain(
                    "you already have a token set up, but if you want, you can",
                ));
            }
            if let Some(url) = app.authorize_url() {
                out.push(PageLine::new(
                    Block::Para,
                    vec![
                        Segment::new("authorize here: ", Tone::Plain),
                        Segment::new(url, Tone::Code),
                    ],
                ));
            }
            match app.redirect_url() {
                Some(redirect) => out.push(PageLine::toned(
                    format!("listening for the redirect on {redirect} (register it as your redirect URL), or press p to paste it"),
                    Tone::Dim,
                )),
                None => out.push(PageLine::toned(
                    "press p and paste the URL you were redirected to",
                    Tone::Dim,
                )),
            }
            if app.exchanging() {
                out.push(PageLine::toned("exchanging authorization code...", Tone::Pending));
            }
            if let Some(e) = app.oauth_error() {
                out.push(PageLine::toned(format!("OAuth failed: {e}"), Tone::Error));
            }
        }
        Some(completed) => {
            out.push(PageLine::new(
                Block::Para,
                vec![
                    Segment::new(
                        "looks like OAuth flow was just completed for Bungie.net user ",
                        Tone::Plain,
                    ),
                    Segment::new(completed, Tone::Code),
                ],
            ));
            let mut segs = vec![Segment::new(
                format!("API reports that {completed} belongs to: "),
                Tone::Plain,
            )];
            segs.extend(user_segments(app, completed));
            out.push(PageLine::new(Block::Para, segs));
        }
    }

    let Some(latest) = app.latest_authed() else {
        return;
    };
    let also = if app.completed_user().is_some() {
        "also, "
    } else {
        ""
    };
    out.push(PageLine::heading(Block::H3, "so:"));
    out.push(PageLine::new(
        Block::Para,
        vec![
            Segment::new(
                format!("{also}we recently acquired an OAuth token for Bungie.net user "),
                Tone::Plain,
            ),
            Segment::new(latest, Tone::Code),
        ],
    ));
    let mut segs = vec![Segment::new(
        format!("API reports that {latest} belongs to "),
        Tone::Plain,
    )];
    segs.extend(user_segments(app, latest));
    out.push(PageLine::new(Block::Para, segs));
    if app.completed_user().is_some_and(|c| c != latest) {
        out.push(PageLine::toned(
            "weird that they don't match...",
            Tone::Error,
        ));
    }

    out.push(PageLine::heading(
        Block::H4,
        "ok now, what's something we can only do as a logged-in user....",
    ));
    authenticated_lines(app, out);
}

fn authenticated_lines(app: &App, out: &mut Vec<PageLine>) {
    let resp = match app.vendor() {
        Loadable::Loading => {
            out.push(PageLine::toned(messages::LOADING_VENDOR, Tone::Pending));
            return;
        }
        Loadable::Failed(e) => {
            out.push(error_line("account and vendor info", e));
            return;
        }
        Loadable::Ready(resp) => resp,
    };
    let Loadable::Ready(defs) = app.defs() else {
        out.push(PageLine::toned(messages::DEFS_FALLBACK, Tone::Pending));
        return;
    };

    let Some(sale) = find_armor_sale(resp, defs) else {
        out.push(PageLine::plain(messages::NO_ARMOR));
        return;
    };
    let label = defs
        .get_inventory_item_lite_def(sale.item_hash)
        .map(|d| {
            format!(
                "{} ({})",
                d.display_properties.name, d.item_type_display_name
            )
        })
        .unwrap_or_else(|| format!("item {}", sale.item_hash));
    out.push(PageLine::new(
        Block::Para,
        vec![
            Segment::new("ada-1 is selling a ", Tone::Plain),
            Segment::new(label, Tone::Highlight),
        ],
    ));
    for (name, value) in armor_stat_lines(resp, sale, defs) {
        out.push(PageLine::new(
            Block::Bullet,
            vec![Segment::new(format!("{name}: {value}"), Tone::Plain)],
        ));
    }
}

/// Plain-text rendering for `--print`
pub fn to_plain(lines: &[PageLine]) -> String {
    let mut s = String::new();
    for (i, line) in lines.iter().enumerate() {
        let text = line.text();
        match line.block {
            Block::H2 => {
                if i > 0 {
                    s.push('\n');
                }
                s.push_str("## ");
            }
            Block::H3 => s.push_str("### "),
            Block::H4 => s.push_str("#### "),
            Block::Bullet => s.push_str("  - "),
            Block::Para => {}
        }
        s.push_str(&text);
        s.push('\n');
    }
    s
}
