use std::sync::Arc;

use crate::defs::Definitions;
use crate::models::{
    ApiUsage, CoreSettingsConfiguration, DestinyCharacterResponse, DestinyVendorResponse,
    GeneralUser,
};
use crate::oauth::{CallbackParams, TokenSet};

/// One fetch-and-render unit's state: loading until its single fetch resolves
#[derive(Clone, Debug)]
pub enum Loadable<T> {
    Loading,
    Ready(T),
    Failed(String),
}

impl<T> Loadable<T> {
    pub fn from_result(r: Result<T, String>) -> Self {
        match r {
            Ok(v) => Loadable::Ready(v),
            Err(e) => Loadable::Failed(e),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Loadable::Loading)
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Loadable::Ready(v) => Some(v),
            _ => None,
        }
    }
}

/// Flatten an error chain for display
pub fn err_string(e: anyhow::Error) -> String {
    format!("{e:#}")
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    DefsLoaded(Result<Arc<Definitions>, String>),
    Settings(Result<CoreSettingsConfiguration, String>),
    Equipment(Result<DestinyCharacterResponse, String>),
    BungieUser {
        membership_id: String,
        result: Result<GeneralUser, String>,
    },
    /// Stored token found at startup (None when nobody has authorized yet)
    LatestToken(Option<TokenSet>),
    /// Redirect parameters from the local listener or a pasted URL
    OAuthCallback(CallbackParams),
    OAuthCompleted(Result<TokenSet, String>),
    /// Result of the authenticated task run as `membership_id`
    Vendor {
        membership_id: String,
        result: Result<DestinyVendorResponse, String>,
    },
    ApiUsage(Result<ApiUsage, String>),
    Log(String),
    Quit,
}

/// Work the app asks the task layer to start
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    FetchUser(String),
    ExchangeCode {
        params: CallbackParams,
        expected_state: Option<String>,
    },
    /// Membership data -> profile -> vendor, as the given Bungie.net user
    RunAuthenticatedTask(String),
}
