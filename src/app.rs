use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;

use crate::config::AppInfo;
use crate::constants::app::{MAX_DEBUG_LOG_LINES, TOAST_DURATION_SECS};
use crate::defs::Definitions;
use crate::models::{
    CoreSettingsConfiguration, DestinyCharacterResponse, DestinyVendorResponse, GeneralUser,
};
use crate::oauth::{self, CallbackParams};
use crate::theme::Theme;
use crate::types::{AppEvent, Command, Loadable};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    /// Typing/pasting the redirect URL
    PasteCallback,
}

pub struct App {
    quit: bool,
    fps: u32,
    theme: Theme,
    api_base: String,
    app_info: AppInfo,

    defs: Loadable<Arc<Definitions>>,
    random_weapon: Option<u32>,
    rng: StdRng,
    settings: Loadable<CoreSettingsConfiguration>,
    equipment: Loadable<DestinyCharacterResponse>,
    users: HashMap<String, Loadable<GeneralUser>>,

    // OAuth state
    oauth_state: Option<String>,
    authorize_url: Option<String>,
    redirect_url: Option<String>,
    exchanging: bool,
    oauth_error: Option<String>,
    completed_user: Option<String>,
    latest_authed: Option<String>,
    latest_checked: bool,
    vendor: Loadable<DestinyVendorResponse>,
    vendor_requested: bool,

    input_mode: InputMode,
    paste_buf: String,

    scroll: u16,
    debug_log: Vec<String>,
    debug_visible: bool,
    toast_message: Option<(String, Instant)>,

    cmd_tx: Option<UnboundedSender<Command>>,
}

impl App {
    pub fn new(
        fps: u32,
        theme: Theme,
        api_base: String,
        app_info: AppInfo,
        cmd_tx: Option<UnboundedSender<Command>>,
    ) -> Self {
        let oauth_state = app_info.client_id().map(|_| oauth::new_state());
        let authorize_url = match (app_info.client_id(), oauth_state.as_deref()) {
            (Some(id), Some(state)) => Some(oauth::authorize_url(&api_base, id, state)),
            _ => None,
        };
        Self {
            quit: false,
            fps,
            theme,
            api_base,
            // nothing to look up without a client id
            latest_checked: app_info.client_id().is_none(),
            app_info,
            defs: Loadable::Loading,
            random_weapon: None,
            rng: StdRng::from_entropy(),
            settings: Loadable::Loading,
            equipment: Loadable::Loading,
            users: HashMap::new(),
            oauth_state,
            authorize_url,
            redirect_url: None,
            exchanging: false,
            oauth_error: None,
            completed_user: None,
            latest_authed: None,
            vendor: Loadable::Loading,
            vendor_requested: false,
            input_mode: InputMode::Normal,
            paste_buf: String::new(),
            scroll: 0,
            debug_log: Vec::new(),
            debug_visible: false,
            toast_message: None,
            cmd_tx,
        }
    }

    /// Deterministic weapon picks (tests)
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    // ----- getters -----
    pub fn fps(&self) -> u32 {
        self.fps
    }
    pub fn quit_flag(&self) -> bool {
        self.quit
    }
    pub fn theme(&self) -> Theme {
        self.theme
    }
    pub fn api_base(&self) -> &str {
        &self.api_base
    }
    pub fn app_info(&self) -> &AppInfo {
        &self.app_info
    }
    pub fn defs(&self) -> &Loadable<Arc<Definitions>> {
        &self.defs
    }
    pub fn random_weapon(&self) -> Option<u32> {
        self.random_weapon
    }
    pub fn settings(&self) -> &Loadable<CoreSettingsConfiguration> {
        &self.settings
    }
    pub fn equipment(&self) -> &Loadable<DestinyCharacterResponse> {
        &self.equipment
    }
    pub fn user(&self, membership_id: &str) -> Option<&Loadable<GeneralUser>> {
        self.users.get(membership_id)
    }
    pub fn authorize_url(&self) -> Option<&str> {
        self.authorize_url.as_deref()
    }
    pub fn redirect_url(&self) -> Option<&str> {
        self.redirect_url.as_deref()
    }
    pub fn exchanging(&self) -> bool {
        self.exchanging
    }
    pub fn oauth_error(&self) -> Option<&str> {
        self.oauth_error.as_deref()
    }
    pub fn completed_user(&self) -> Option<&str> {
        self.completed_user.as_deref()
    }
    pub fn latest_authed(&self) -> Option<&str> {
        self.latest_authed.as_deref()
    }
    pub fn vendor(&self) -> &Loadable<DestinyVendorResponse> {
        &self.vendor
    }
    pub fn input_mode(&self) -> InputMode {
        self.input_mode
    }
    pub fn paste_buf(&self) -> &str {
        &self.paste_buf
    }
    pub fn scroll(&self) -> u16 {
        self.scroll
    }
    pub fn debug_visible(&self) -> bool {
        self.debug_visible
    }
    pub fn debug_log(&self) -> &[String] {
        &self.debug_log
    }

    /// Current toast, if it hasn't timed out
    pub fn toast_message(&self) -> Option<&str> {
        self.toast_message.as_ref().and_then(|(msg, at)| {
            (at.elapsed() < Duration::from_secs(TOAST_DURATION_SECS)).then_some(msg.as_str())
        })
    }

    /// Nothing is waiting on the network any more (used by --print)
    pub fn is_settled(&self) -> bool {
        let users_done = self.users.values().all(|u| !u.is_loading());
        let vendor_done = self.latest_authed.is_none() || !self.vendor.is_loading();
        !self.defs.is_loading()
            && !self.settings.is_loading()
            && !self.equipment.is_loading()
            && self.latest_checked
            && users_done
            && vendor_done
            && !self.exchanging
    }

    // ----- setters -----
    pub fn set_redirect_url(&mut self, url: String) {
        self.redirect_url = Some(url);
    }

    pub fn show_toast(&mut self, msg: String) {
        self.toast_message = Some((msg, Instant::now()));
    }

    pub fn log_debug(&mut self, msg: String) {
        self.debug_log.push(msg);
        if self.debug_log.len() > MAX_DEBUG_LOG_LINES {
            let overflow = self.debug_log.len() - MAX_DEBUG_LOG_LINES;
            self.debug_log.drain(..overflow);
        }
    }

    pub fn toggle_debug_panel(&mut self) {
        self.debug_visible = !self.debug_visible;
    }

    pub fn scroll_up(&mut self, n: u16) {
        self.scroll = self.scroll.saturating_sub(n);
    }

    pub fn scroll_down(&mut self, n: u16) {
        self.scroll = self.scroll.saturating_add(n);
    }

    pub fn scroll_home(&mut self) {
        self.scroll = 0;
    }

    /// Keep scroll inside the rendered page (set by the UI layer)
    pub fn clamp_scroll(&mut self, max: u16) {
        self.scroll = self.scroll.min(max);
    }

    fn send(&mut self, cmd: Command) {
        if let Some(tx) = &self.cmd_tx {
            if tx.send(cmd).is_err() {
                self.log_debug("task layer is gone".to_string());
            }
        }
    }

    /// Look up a Bungie.net user once; later calls reuse the result
    fn request_user(&mut self, membership_id: &str) {
        if self.users.contains_key(membership_id) {
            return;
        }
        self.users.insert(membership_id.to_string(), Loadable::Loading);
        self.send(Command::FetchUser(membership_id.to_string()));
    }

    fn start_authenticated_task(&mut self, membership_id: &str) {
        self.vendor = Loadable::Loading;
        self.vendor_requested = true;
        self.send(Command::RunAuthenticatedTask(membership_id.to_string()));
    }

    /// Pick another random weapon
    pub fn reroll(&mut self) {
        if let Loadable::Ready(defs) = &self.defs {
            self.random_weapon = defs.random_weapon(&mut self.rng).map(|d| d.hash);
        }
    }

    /// Fresh state + authorize URL (the previous one stops being accepted)
    pub fn restart_oauth(&mut self) {
        if let Some(id) = self.app_info.client_id().map(str::to_string) {
            let state = oauth::new_state();
            self.authorize_url = Some(oauth::authorize_url(&self.api_base, &id, &state));
            self.oauth_state = Some(state);
            self.oauth_error = None;
            self.show_toast("New authorize URL generated".to_string());
        }
    }

    // ----- paste mode -----
    pub fn start_paste(&mut self) {
        if self.app_info.client_id().is_none() {
            self.show_toast("Set BUNGIE_CLIENT_ID first".to_string());
            return;
        }
        self.paste_buf.clear();
        self.input_mode = InputMode::PasteCallback;
    }

    pub fn paste_add_char(&mut self, c: char) {
        self.paste_buf.push(c);
    }

    pub fn paste_backspace(&mut self) {
        self.paste_buf.pop();
    }

    pub fn cancel_paste(&mut self) {
        self.paste_buf.clear();
        self.input_mode = InputMode::Normal;
    }

    pub fn submit_paste(&mut self) {
        let input = std::mem::take(&mut self.paste_buf);
        self.input_mode = InputMode::Normal;
        match oauth::parse_callback(&input) {
            Ok(params) => self.on_event(AppEvent::OAuthCallback(params)),
            Err(e) => {
                self.oauth_error = Some(e.to_string());
                self.show_toast("That doesn't look like a redirect URL".to_string());
            }
        }
    }

    fn begin_exchange(&mut self, params: CallbackParams) {
        if self.app_info.client_id().is_none() {
            self.oauth_error = Some("no OAuth client id configured".to_string());
            return;
        }
        if self.exchanging {
            self.log_debug("ignoring callback, exchange already running".to_string());
            return;
        }
        self.exchanging = true;
        self.oauth_error = None;
        let expected_state = self.oauth_state.clone();
        self.send(Command::ExchangeCode {
            params,
            expected_state,
        });
    }

    pub fn on_event(&mut self, ev: AppEvent) {
        match ev {
            AppEvent::DefsLoaded(res) => {
                // once loaded, the definitions-reliant area stays up
                if self.defs.ready().is_some() {
                    self.log_debug("late definitions result ignored".to_string());
                    return;
                }
                self.defs = Loadable::from_result(res);
                if let Loadable::Ready(defs) = &self.defs {
                    let n = defs.all_inventory_item_lite_defs().count();
                    self.log_debug(format!("definitions ready ({n} items)"));
                    self.reroll();
                }
            }
            AppEvent::Settings(res) => self.settings = Loadable::from_result(res),
            AppEvent::Equipment(res) => self.equipment = Loadable::from_result(res),
            AppEvent::BungieUser {
                membership_id,
                result,
            } => {
                self.users.insert(membership_id, Loadable::from_result(result));
            }
            AppEvent::LatestToken(latest) => {
                self.latest_checked = true;
                if self.latest_authed.is_some() {
                    // a flow completed first; that token is newer
                    return;
                }
                if let Some(token) = latest {
                    let id = token.membership_id;
                    self.log_debug(format!("stored token for Bungie.net user {id}"));
                    self.request_user(&id);
                    self.start_authenticated_task(&id);
                    self.latest_authed = Some(id);
                }
            }
            AppEvent::OAuthCallback(params) => self.begin_exchange(params),
            AppEvent::OAuthCompleted(Ok(token)) => {
                self.exchanging = false;
                let id = token.membership_id;
                self.show_toast(format!("Authorized Bungie.net user {id}"));
                self.request_user(&id);
                // the just-stored token is now the latest one
                self.start_authenticated_task(&id);
                self.latest_authed = Some(id.clone());
                self.latest_checked = true;
                self.completed_user = Some(id);
            }
            AppEvent::OAuthCompleted(Err(e)) => {
                self.exchanging = false;
                self.oauth_error = Some(e);
            }
            AppEvent::Vendor {
                membership_id,
                result,
            } => {
                // a task started for an earlier user may finish late
                let current = self.latest_authed.as_deref() == Some(membership_id.as_str());
                if !self.vendor_requested || !current {
                    self.log_debug(format!("dropped vendor result for {membership_id}"));
                    return;
                }
                self.vendor = Loadable::from_result(result);
            }
            AppEvent::ApiUsage(res) => match res {
                Ok(u) => self.log_debug(format!("api usage: {} calls", u.total_calls())),
                Err(e) => self.log_debug(format!("api usage unavailable: {e}")),
            },
            AppEvent::Log(msg) => self.log_debug(msg),
            AppEvent::Quit => self.quit = true,
        }
    }
}
