//! Bungie.net response shapes
//!
//! Only the fields the page displays are modelled; everything else in the
//! payloads is ignored by serde. Dictionaries keyed by integers use `BTreeMap`
//! so iteration runs in ascending key order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Envelope wrapped around every Platform response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerResponse<T> {
    pub response: Option<T>,
    pub error_code: i32,
    #[serde(default)]
    pub throttle_seconds: i32,
    #[serde(default)]
    pub error_status: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum BungieMembershipType {
    None,
    TigerXbox,
    TigerPsn,
    TigerSteam,
    TigerBlizzard,
    TigerStadia,
    TigerEgs,
    TigerDemon,
    BungieNext,
    All,
    Other(i32),
}

impl From<i32> for BungieMembershipType {
    fn from(v: i32) -> Self {
        match v {
            0 => Self::None,
            1 => Self::TigerXbox,
            2 => Self::TigerPsn,
            3 => Self::TigerSteam,
            4 => Self::TigerBlizzard,
            5 => Self::TigerStadia,
            6 => Self::TigerEgs,
            10 => Self::TigerDemon,
            254 => Self::BungieNext,
            -1 => Self::All,
            other => Self::Other(other),
        }
    }
}

impl From<BungieMembershipType> for i32 {
    fn from(v: BungieMembershipType) -> Self {
        match v {
            BungieMembershipType::None => 0,
            BungieMembershipType::TigerXbox => 1,
            BungieMembershipType::TigerPsn => 2,
            BungieMembershipType::TigerSteam => 3,
            BungieMembershipType::TigerBlizzard => 4,
            BungieMembershipType::TigerStadia => 5,
            BungieMembershipType::TigerEgs => 6,
            BungieMembershipType::TigerDemon => 10,
            BungieMembershipType::BungieNext => 254,
            BungieMembershipType::All => -1,
            BungieMembershipType::Other(v) => v,
        }
    }
}

/// Which slices of a profile/character/vendor the API should send back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinyComponentType {
    Profiles,
    Characters,
    CharacterInventories,
    CharacterEquipment,
    ItemStats,
    Vendors,
    VendorSales,
}

impl DestinyComponentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profiles => "Profiles",
            Self::Characters => "Characters",
            Self::CharacterInventories => "CharacterInventories",
            Self::CharacterEquipment => "CharacterEquipment",
            Self::ItemStats => "ItemStats",
            Self::Vendors => "Vendors",
            Self::VendorSales => "VendorSales",
        }
    }

    /// Query-string value: `Profiles,CharacterEquipment`
    pub fn join(components: &[DestinyComponentType]) -> String {
        components
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "i32")]
pub enum DestinyItemType {
    #[default]
    None,
    Currency,
    Armor,
    Weapon,
    Engram,
    Consumable,
    Emblem,
    Subclass,
    Mod,
    Ship,
    Vehicle,
    Emote,
    Ghost,
    Other(i32),
}

impl From<i32> for DestinyItemType {
    fn from(v: i32) -> Self {
        match v {
            0 => Self::None,
            1 => Self::Currency,
            2 => Self::Armor,
            3 => Self::Weapon,
            8 => Self::Engram,
            9 => Self::Consumable,
            14 => Self::Emblem,
            16 => Self::Subclass,
            19 => Self::Mod,
            21 => Self::Ship,
            22 => Self::Vehicle,
            23 => Self::Emote,
            24 => Self::Ghost,
            other => Self::Other(other),
        }
    }
}

// ----- Settings -----

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreSettingsConfiguration {
    pub destiny2_core_settings: Destiny2CoreSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Destiny2CoreSettings {
    pub current_season_hash: u32,
}

// ----- Components -----

#[derive(Debug, Clone, Deserialize)]
pub struct ComponentResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub privacy: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DestinyCharacterResponse {
    pub equipment: Option<ComponentResponse<DestinyInventoryComponent>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DestinyInventoryComponent {
    #[serde(default)]
    pub items: Vec<DestinyItemComponent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinyItemComponent {
    pub item_hash: u32,
    pub bucket_hash: u32,
    pub item_instance_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DestinyProfileResponse {
    pub profile: Option<ComponentResponse<DestinyProfileComponent>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinyProfileComponent {
    #[serde(default)]
    pub character_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinyVendorResponse {
    /// Keyed by vendorItemIndex
    pub sales: Option<ComponentResponse<BTreeMap<u32, DestinyVendorSaleItemComponent>>>,
    pub item_components: Option<DestinyItemComponentSet>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinyVendorSaleItemComponent {
    pub vendor_item_index: u32,
    pub item_hash: u32,
    #[serde(default)]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DestinyItemComponentSet {
    /// Keyed by vendorItemIndex
    pub stats: Option<ComponentResponse<BTreeMap<u32, DestinyItemStatsComponent>>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DestinyItemStatsComponent {
    /// Keyed by statHash
    #[serde(default)]
    pub stats: BTreeMap<u32, DestinyStat>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinyStat {
    pub stat_hash: u32,
    pub value: i32,
}

// ----- Users -----

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralUser {
    pub membership_id: String,
    #[serde(default)]
    pub display_name: String,
    pub cached_bungie_global_display_name: Option<String>,
    pub cached_bungie_global_display_name_code: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMembershipData {
    #[serde(default)]
    pub destiny_memberships: Vec<GroupUserInfoCard>,
    pub primary_membership_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupUserInfoCard {
    pub membership_id: String,
    pub membership_type: BungieMembershipType,
    #[serde(default)]
    pub display_name: String,
}

// ----- App -----

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiUsage {
    #[serde(default)]
    pub api_calls: Vec<Series>,
    #[serde(default)]
    pub throttled_requests: Vec<Series>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Series {
    #[serde(default)]
    pub datapoints: Vec<Datapoint>,
    #[serde(default)]
    pub target: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Datapoint {
    pub time: String,
    pub count: Option<f64>,
}

impl ApiUsage {
    pub fn total_calls(&self) -> f64 {
        sum_series(&self.api_calls)
    }
    pub fn total_throttled(&self) -> f64 {
        sum_series(&self.throttled_requests)
    }
}

fn sum_series(series: &[Series]) -> f64 {
    series
        .iter()
        .flat_map(|s| s.datapoints.iter())
        .filter_map(|d| d.count)
        .sum()
}

// ----- Manifest -----

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinyManifest {
    pub version: String,
    /// language -> definition name -> path relative to the base URL
    #[serde(default)]
    pub json_world_component_content_paths: HashMap<String, HashMap<String, String>>,
}
