// SPDX-FileCopyrightText: 2026 Blockshop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store catalog: what can be bought and which console commands deliver it.
//!
//! The catalog is either the built-in item set or a TOML file with one
//! `[[items]]` table per item.

use std::collections::HashSet;
use std::path::Path;

use blockshop_config::StoreConfig;
use blockshop_core::BlockshopError;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ItemCategory {
    Ranks,
    Kits,
    Currency,
    Cosmetics,
}

/// How an item is delivered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ItemKind {
    Rank,
    ItemBundle,
    Currency,
    Cosmetic,
}

/// Kind-specific details. Which fields matter depends on [`ItemKind`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemMetadata {
    /// LuckPerms group granted by a rank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    /// Coins credited by a currency pack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cosmetic_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreItem {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: u32,
    pub category: ItemCategory,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub popular: bool,
    /// Raw console lines, with `{username}` style placeholders.
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub metadata: ItemMetadata,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    items: Vec<StoreItem>,
}

/// The set of purchasable items, in display order.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    items: Vec<StoreItem>,
}

impl Catalog {
    /// Builds a catalog, rejecting blank or duplicate ids.
    pub fn new(items: Vec<StoreItem>) -> Result<Self, BlockshopError> {
        let mut seen = HashSet::new();
        for item in &items {
            if item.id.trim().is_empty() {
                return Err(BlockshopError::Config(format!(
                    "catalog item `{}` has an empty id",
                    item.name
                )));
            }
            if !seen.insert(item.id.as_str()) {
                return Err(BlockshopError::Config(format!(
                    "duplicate catalog item id `{}`",
                    item.id
                )));
            }
        }
        Ok(Self { items })
    }

    /// Uses `store.catalog_path` when set, the built-in items otherwise.
    pub fn from_config(config: &StoreConfig) -> Result<Self, BlockshopError> {
        match &config.catalog_path {
            Some(path) => Self::load(Path::new(path)),
            None => Ok(Self::builtin()),
        }
    }

    pub fn load(path: &Path) -> Result<Self, BlockshopError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            BlockshopError::Config(format!("cannot read catalog {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
            .map_err(|e| BlockshopError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml_str(text: &str) -> Result<Self, BlockshopError> {
        let file: CatalogFile = toml::from_str(text)
            .map_err(|e| BlockshopError::Config(format!("invalid catalog: {e}")))?;
        Self::new(file.items)
    }

    /// Items matching `category` (any when `None`), optionally only popular ones.
    pub fn list(&self, category: Option<ItemCategory>, popular_only: bool) -> Vec<&StoreItem> {
        self.items
            .iter()
            .filter(|item| category.is_none_or(|c| item.category == c))
            .filter(|item| !popular_only || item.popular)
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&StoreItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn builtin() -> Self {
        let items = vec![
            rank_item(
                "vip-rank",
                "VIP Rank",
                "Unlock VIP privileges with /fly, colored chat, and exclusive perks!",
                199,
                "crown",
                true,
                "vip",
                &["essentials.fly", "essentials.heal", "essentials.feed"],
                &["give {username} diamond 16", "eco give {username} 5000"],
            ),
            rank_item(
                "mvp-rank",
                "MVP Rank",
                "Premium MVP rank with enhanced permissions and exclusive commands!",
                399,
                "star",
                false,
                "mvp",
                &["*"],
                &["give {username} netherite_ingot 8", "eco give {username} 15000"],
            ),
            rank_item(
                "legend-rank",
                "LEGEND Rank",
                "Ultimate LEGEND rank with all perks and god-mode privileges!",
                799,
                "trophy",
                false,
                "legend",
                &["*"],
                &["give {username} netherite_armor_set 1", "eco give {username} 50000"],
            ),
            StoreItem {
                id: "starter-kit".into(),
                name: "Starter Kit".into(),
                description:
                    "Perfect for new players! Includes diamond armor, tools, and supplies.".into(),
                price: 99,
                category: ItemCategory::Kits,
                kind: ItemKind::ItemBundle,
                icon: "sword".into(),
                popular: true,
                commands: lines(&[
                    "give {username} diamond_helmet 1",
                    "give {username} diamond_chestplate 1",
                    "give {username} diamond_leggings 1",
                    "give {username} diamond_boots 1",
                    "give {username} diamond_sword 1",
                    "give {username} diamond_pickaxe 1",
                    "give {username} golden_apple 64",
                    "give {username} bread 64",
                ]),
                metadata: ItemMetadata {
                    items: lines(&["diamond_armor_set", "diamond_tools", "food", "supplies"]),
                    ..ItemMetadata::default()
                },
            },
            StoreItem {
                id: "builder-kit".into(),
                name: "Builder's Kit".into(),
                description:
                    "Everything a master builder needs! Blocks, tools, and creative supplies."
                        .into(),
                price: 149,
                category: ItemCategory::Kits,
                kind: ItemKind::ItemBundle,
                icon: "building-blocks".into(),
                popular: false,
                commands: lines(&[
                    "give {username} stone 6400",
                    "give {username} oak_planks 6400",
                    "give {username} glass 1600",
                    "give {username} wool 1600",
                    "give {username} netherite_pickaxe 1",
                    "give {username} efficiency_book 1",
                ]),
                metadata: ItemMetadata {
                    items: lines(&["building_blocks", "tools", "materials"]),
                    ..ItemMetadata::default()
                },
            },
            coins_item(
                "coins-1000",
                "1,000 Coins",
                "Server currency to trade with other players and buy items!",
                149,
                "coin",
                true,
                1000,
            ),
            coins_item(
                "coins-5000",
                "5,000 Coins",
                "Large coin package for serious traders and builders!",
                599,
                "coin-stack",
                false,
                5000,
            ),
            StoreItem {
                id: "rainbow-trail".into(),
                name: "Rainbow Trail".into(),
                description: "Leave a beautiful rainbow trail wherever you go!".into(),
                price: 199,
                category: ItemCategory::Cosmetics,
                kind: ItemKind::Cosmetic,
                icon: "rainbow".into(),
                popular: false,
                commands: lines(&["trails give {username} rainbow"]),
                metadata: ItemMetadata {
                    cosmetic_type: Some("trail".into()),
                    effect: Some("rainbow".into()),
                    ..ItemMetadata::default()
                },
            },
        ];
        Self { items }
    }
}

fn lines(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[allow(clippy::too_many_arguments)]
fn rank_item(
    id: &str,
    name: &str,
    description: &str,
    price: u32,
    icon: &str,
    popular: bool,
    rank: &str,
    permissions: &[&str],
    extras: &[&str],
) -> StoreItem {
    let mut commands = vec![format!("lp user {{username}} parent set {rank}")];
    commands.extend(lines(extras));
    StoreItem {
        id: id.into(),
        name: name.into(),
        description: description.into(),
        price,
        category: ItemCategory::Ranks,
        kind: ItemKind::Rank,
        icon: icon.into(),
        popular,
        commands,
        metadata: ItemMetadata {
            rank: Some(rank.into()),
            permissions: lines(permissions),
            duration: Some("permanent".into()),
            ..ItemMetadata::default()
        },
    }
}

fn coins_item(
    id: &str,
    name: &str,
    description: &str,
    price: u32,
    icon: &str,
    popular: bool,
    amount: u64,
) -> StoreItem {
    StoreItem {
        id: id.into(),
        name: name.into(),
        description: description.into(),
        price,
        category: ItemCategory::Currency,
        kind: ItemKind::Currency,
        icon: icon.into(),
        popular,
        commands: vec![format!("eco give {{username}} {amount}")],
        metadata: ItemMetadata {
            amount: Some(amount),
            currency: Some("coins".into()),
            ..ItemMetadata::default()
        },
    }
}
