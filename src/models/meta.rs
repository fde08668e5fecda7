//! Game metadata and map models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Seasonal theme of a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MapSeason {
    NoSeason,
    Winterfest,
    Spring,
    Halloween,
    Autumn,
    Summer,
    #[serde(other)]
    Unknown,
}

/// Team size variant a map is played in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MapVariant {
    Regular,
    Duos,
    Trios,
    Squads,
    Mega,
    Royale,
    #[serde(other)]
    Unknown,
}

/// A map in a game's rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMap {
    pub name: String,
    pub season: MapSeason,
    pub variant: MapVariant,
    pub image: String,
}

/// Metadata for a game, including its XP table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameMetainfo {
    pub name: String,
    pub short_name: String,
    pub max_level: u32,
    pub allow_prestiging: bool,
    #[serde(default)]
    pub max_prestige: u32,

    /// XP required for each level, keyed by XP
    pub experience_to_level: BTreeMap<u64, u32>,
}
