//! Fetch-and-render units
//!
//! Each unit is a tokio task that makes its request(s) once and reports back
//! with a single `AppEvent`. Startup units are spawned by [`spawn_startup`];
//! everything the app asks for later arrives as a [`Command`].

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::auth::OAuthSession;
use crate::bungie_api::{BungieClient, GetCharacterParams, GetProfileParams, GetVendorParams};
use crate::constants::demo;
use crate::defs::DefTable;
use crate::manifest::DefsLoader;
use crate::models::{
    BungieMembershipType, DestinyComponentType, DestinyVendorResponse, GroupUserInfoCard,
    UserMembershipData,
};
use crate::oauth::{complete_flow, OAuthClient};
use crate::storage::Store;
use crate::types::{err_string, AppEvent, Command};

/// Everything a unit may need to make its calls
#[derive(Clone)]
pub struct Services {
    pub anon: BungieClient,
    pub oauth: Option<OAuthClient>,
    pub store: Store,
    pub application_id: u64,
}

impl Services {
    /// Client that acts as the given Bungie.net user
    pub fn authed_client(&self, membership_id: &str) -> Result<BungieClient> {
        let oauth = self
            .oauth
            .clone()
            .ok_or_else(|| anyhow!("no OAuth client id configured"))?;
        let session = OAuthSession::new(oauth, self.store.clone(), membership_id);
        Ok(self.anon.with_oauth(Arc::new(session)))
    }
}

/// Kick off the units that run as soon as the app starts
pub fn spawn_startup(
    services: &Services,
    lang: &str,
    tables: &[DefTable],
    tx: &UnboundedSender<AppEvent>,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    // definitions
    {
        let loader = DefsLoader::new(services.anon.clone(), services.store.clone(), lang)
            .include_tables(tables);
        let tx = tx.clone();
        handles.push(tokio::spawn(async move {
            let res = loader.load_defs().await.map(Arc::new).map_err(err_string);
            if let Err(e) = &res {
                log::error!("[defs] load failed: {e}");
            }
            let _ = tx.send(AppEvent::DefsLoaded(res));
        }));
    }

    // what season is it
    {
        let client = services.anon.clone();
        let tx = tx.clone();
        handles.push(tokio::spawn(async move {
            let res = client.get_common_settings().await.map_err(err_string);
            let _ = tx.send(AppEvent::Settings(res));
        }));
    }

    // the demo hunter's equipment (visible even with a mostly private profile)
    {
        let client = services.anon.clone();
        let tx = tx.clone();
        handles.push(tokio::spawn(async move {
            let res = client
                .get_character(GetCharacterParams {
                    membership_type: BungieMembershipType::TigerXbox,
                    destiny_membership_id: demo::MEMBERSHIP_ID,
                    character_id: demo::CHARACTER_ID,
                    components: &[DestinyComponentType::CharacterEquipment],
                })
                .await
                .map_err(err_string);
            let _ = tx.send(AppEvent::Equipment(res));
        }));
    }

    // any token from an earlier run
    if let Some(oauth) = services.oauth.clone() {
        let store = services.store.clone();
        let tx = tx.clone();
        handles.push(tokio::spawn(async move {
            match OAuthSession::latest(&oauth, &store).await {
                Ok(latest) => {
                    let _ = tx.send(AppEvent::LatestToken(latest));
                }
                Err(e) => {
                    log::warn!("[auth] could not read stored tokens: {e:#}");
                    let _ = tx.send(AppEvent::LatestToken(None));
                }
            }
        }));
    }

    handles
}

/// Serve commands until the app drops its sender
pub async fn run_commands(
    services: Services,
    mut rx: UnboundedReceiver<Command>,
    tx: UnboundedSender<AppEvent>,
) {
    while let Some(cmd) = rx.recv().await {
        log::debug!("[tasks] {cmd:?}");
        let services = services.clone();
        let tx = tx.clone();
        match cmd {
            Command::FetchUser(id) => {
                tokio::spawn(async move {
                    let result = services
                        .anon
                        .get_bungie_net_user_by_id(&id)
                        .await
                        .map_err(err_string);
                    let _ = tx.send(AppEvent::BungieUser {
                        membership_id: id,
                        result,
                    });
                });
            }
            Command::ExchangeCode {
                params,
                expected_state,
            } => {
                tokio::spawn(async move {
                    let res = match &services.oauth {
                        Some(oauth) => {
                            let expected = expected_state.as_deref();
                            complete_flow(oauth, &services.store, &params, expected).await
                        }
                        None => Err(anyhow!("no OAuth client id configured")),
                    };
                    let _ = tx.send(AppEvent::OAuthCompleted(res.map_err(err_string)));
                });
            }
            Command::RunAuthenticatedTask(membership_id) => {
                tokio::spawn(async move {
                    let res = authenticated_task(&services, &membership_id, &tx)
                        .await
                        .map_err(err_string);
                    let _ = tx.send(AppEvent::Vendor {
                        membership_id,
                        result: res,
                    });
                });
            }
        }
    }
}

/// The cross-saved membership if there is one, else the only/first one
pub fn primary_membership(data: &UserMembershipData) -> Option<&GroupUserInfoCard> {
    match &data.primary_membership_id {
        Some(primary) => data
            .destiny_memberships
            .iter()
            .find(|m| &m.membership_id == primary),
        None => data.destiny_memberships.first(),
    }
}

/// Something only a logged-in user can do: look at their own vendor
async fn authenticated_task(
    services: &Services,
    membership_id: &str,
    tx: &UnboundedSender<AppEvent>,
) -> Result<DestinyVendorResponse> {
    let authed = services.authed_client(membership_id)?;

    let membership_info = authed
        .get_membership_data_for_current_user()
        .await
        .context("Failed to look up memberships")?;

    // fired alongside, only logged
    {
        let client = authed.clone();
        let tx = tx.clone();
        let app_id = services.application_id;
        tokio::spawn(async move {
            let res = client.get_application_api_usage(app_id).await;
            match &res {
                Ok(u) => log::info!(
                    "[app] api usage for {app_id}: {} calls, {} throttled",
                    u.total_calls(),
                    u.total_throttled()
                ),
                Err(e) => log::info!("[app] api usage for {app_id} unavailable: {e:#}"),
            }
            let _ = tx.send(AppEvent::ApiUsage(res.map_err(err_string)));
        });
    }

    let primary = primary_membership(&membership_info)
        .ok_or_else(|| anyhow!("Bungie.net user {membership_id} has no Destiny 2 account"))?;

    // the profile is public; which components we ask for decides what comes back
    let profile = services
        .anon
        .get_profile(GetProfileParams {
            membership_type: primary.membership_type,
            destiny_membership_id: &primary.membership_id,
            components: &[DestinyComponentType::Profiles],
        })
        .await
        .context("Failed to fetch profile")?;
    let character_id = profile
        .profile
        .and_then(|p| p.data)
        .and_then(|d| d.character_ids.into_iter().next())
        .ok_or_else(|| anyhow!("profile {} has no characters", primary.membership_id))?;

    // what she's selling, and the stats for anything she sells
    authed
        .get_vendor(GetVendorParams {
            membership_type: primary.membership_type,
            destiny_membership_id: &primary.membership_id,
            character_id: &character_id,
            vendor_hash: demo::ADA_1_VENDOR_HASH,
            components: &[
                DestinyComponentType::VendorSales,
                DestinyComponentType::ItemStats,
            ],
        })
        .await
        .context("Failed to fetch vendor")
}
