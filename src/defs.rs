//! Typed definition tables, queried by numeric hash once loaded.

use anyhow::{anyhow, Context, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::models::DestinyItemType;

/// Definition tables d2x knows how to type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefTable {
    InventoryItemLite,
    Season,
    Stat,
}

impl DefTable {
    pub const ALL: [DefTable; 3] = [DefTable::InventoryItemLite, DefTable::Season, DefTable::Stat];

    /// Short name used in config and the cache
    pub fn name(&self) -> &'static str {
        match self {
            DefTable::InventoryItemLite => "InventoryItemLite",
            DefTable::Season => "Season",
            DefTable::Stat => "Stat",
        }
    }

    /// Key under jsonWorldComponentContentPaths
    pub fn definition_name(&self) -> String {
        format!("Destiny{}Definition", self.name())
    }
}

impl std::str::FromStr for DefTable {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().trim_start_matches("Destiny").trim_end_matches("Definition");
        DefTable::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                anyhow!("Unknown table '{s}'. Valid options: InventoryItemLite, Season, Stat")
            })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayProperties {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub icon: Option<String>,
}

impl DisplayProperties {
    /// Icons are stored as paths relative to the Bungie.net root
    pub fn icon_url(&self, base: &str) -> Option<String> {
        self.icon.as_ref().map(|p| format!("{base}{p}"))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItemLiteDef {
    pub hash: u32,
    #[serde(default)]
    pub display_properties: DisplayProperties,
    #[serde(default)]
    pub item_type: DestinyItemType,
    #[serde(default)]
    pub item_type_display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonDef {
    pub hash: u32,
    #[serde(default)]
    pub display_properties: DisplayProperties,
    #[serde(default)]
    pub season_number: i32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatDef {
    pub hash: u32,
    #[serde(default)]
    pub display_properties: DisplayProperties,
}

/// Loaded definition tables. Tables that were not included stay empty.
#[derive(Debug, Clone, Default)]
pub struct Definitions {
    pub version: String,
    items: BTreeMap<u32, InventoryItemLiteDef>,
    seasons: BTreeMap<u32, SeasonDef>,
    stats: BTreeMap<u32, StatDef>,
}

impl Definitions {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Default::default()
        }
    }

    /// Replace one table with the contents of its downloaded JSON
    /// (`{"<hash>": {...definition...}, ...}`)
    pub fn insert_table_json(&mut self, table: DefTable, raw: &str) -> Result<usize> {
        let ctx = || format!("Failed to parse {} table", table.name());
        let n = match table {
            DefTable::InventoryItemLite => {
                self.items = serde_json::from_str(raw).with_context(ctx)?;
                self.items.len()
            }
            DefTable::Season => {
                self.seasons = serde_json::from_str(raw).with_context(ctx)?;
                self.seasons.len()
            }
            DefTable::Stat => {
                self.stats = serde_json::from_str(raw).with_context(ctx)?;
                self.stats.len()
            }
        };
        Ok(n)
    }

    pub fn get_inventory_item_lite_def(&self, hash: u32) -> Option<&InventoryItemLiteDef> {
        self.items.get(&hash)
    }

    pub fn all_inventory_item_lite_defs(&self) -> impl Iterator<Item = &InventoryItemLiteDef> {
        self.items.values()
    }

    pub fn get_season_def(&self, hash: u32) -> Option<&SeasonDef> {
        self.seasons.get(&hash)
    }

    pub fn get_stat_def(&self, hash: u32) -> Option<&StatDef> {
        self.stats.get(&hash)
    }

    /// Uniform pick over the item definitions whose itemType is Weapon
    pub fn random_weapon<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&InventoryItemLiteDef> {
        let weapons: Vec<&InventoryItemLiteDef> = self
            .all_inventory_item_lite_defs()
            .filter(|d| d.item_type == DestinyItemType::Weapon)
            .collect();
        weapons.choose(rng).copied()
    }

    pub fn table_len(&self, table: DefTable) -> usize {
        match table {
            DefTable::InventoryItemLite => self.items.len(),
            DefTable::Season => self.seasons.len(),
            DefTable::Stat => self.stats.len(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::defs;
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn random_weapon_only_picks_weapons() {
        let d = defs();
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let pick = d.random_weapon(&mut rng).unwrap();
            assert_eq!(pick.item_type, DestinyItemType::Weapon, "seed {seed}");
        }
    }

    #[test]
    fn random_weapon_reaches_every_weapon() {
        let d = defs();
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(d.random_weapon(&mut rng).unwrap().hash);
        }
        assert_eq!(seen, [1u32, 2575506895].into_iter().collect());
    }

    #[test]
    fn no_weapons_means_no_pick() {
        let d = Definitions::new("empty");
        assert!(d.random_weapon(&mut StdRng::seed_from_u64(1)).is_none());
    }

    #[test]
    fn specific_hash_resolves_to_its_item() {
        let d = defs();
        let item = d.get_inventory_item_lite_def(2575506895).unwrap();
        assert_eq!(item.display_properties.name, "Kindled Orchid");
        assert_eq!(
            item.display_properties.icon_url("https://www.bungie.net").as_deref(),
            Some("https://www.bungie.net/common/orchid.jpg")
        );
        assert!(d.get_inventory_item_lite_def(999).is_none());
    }

    #[test]
    fn table_names_parse_in_short_and_long_form() {
        assert_eq!("Stat".parse::<DefTable>().unwrap(), DefTable::Stat);
        assert_eq!(
            "DestinyInventoryItemLiteDefinition".parse::<DefTable>().unwrap(),
            DefTable::InventoryItemLite
        );
        assert_eq!(DefTable::Season.definition_name(), "DestinySeasonDefinition");
        assert!("Vendor".parse::<DefTable>().is_err());
    }

    #[test]
    fn bad_table_json_names_the_table() {
        let mut d = Definitions::new("v");
        let err = d.insert_table_json(DefTable::Season, "[1,2]").unwrap_err();
        assert!(err.to_string().contains("Season"));
    }
}
