//! Game identifiers and the per-game registry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{GameMetainfo, LeaderboardEpoch, ValidationError, YearMonth};

/// Error returned when parsing an unknown game identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown game: {0}")]
pub struct UnknownGame(pub String);

/// A game with statistics on the Hive API.
///
/// Serializes as the identifier the API uses in its paths (`wars`, `sky`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Game {
    #[serde(rename = "wars")]
    TreasureWars,
    #[serde(rename = "bed")]
    BedWars,
    #[serde(rename = "dr")]
    DeathRun,
    #[serde(rename = "hide")]
    HideAndSeek,
    #[serde(rename = "murder")]
    MurderMystery,
    #[serde(rename = "sg")]
    SurvivalGames,
    #[serde(rename = "sky")]
    SkyWars,
    #[serde(rename = "build")]
    JustBuild,
    #[serde(rename = "ground")]
    GroundWars,
    #[serde(rename = "drop")]
    BlockDrop,
    #[serde(rename = "ctf")]
    CaptureTheFlag,
    #[serde(rename = "party")]
    BlockParty,
    #[serde(rename = "bridge")]
    Bridge,
    #[serde(rename = "grav")]
    Gravity,
}

/// How XP maps to levels for a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "curve", rename_all = "snake_case")]
pub enum LevelCurve {
    /// Each level costs `increment` more XP than the previous one, until
    /// `increment_cap` after which every level costs the same.
    Quadratic {
        increment: u32,
        increment_cap: Option<u32>,
    },

    /// Level costs grow by a fixed percentage per level (The Bridge).
    Geometric,
}

/// Leveling parameters for a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelingConfig {
    #[serde(flatten)]
    pub curve: LevelCurve,
    pub max_level: u32,
    pub max_prestige: Option<u32>,
}

impl LevelingConfig {
    const fn quadratic(
        increment: u32,
        increment_cap: Option<u32>,
        max_level: u32,
        max_prestige: Option<u32>,
    ) -> Self {
        Self {
            curve: LevelCurve::Quadratic {
                increment,
                increment_cap,
            },
            max_level,
            max_prestige,
        }
    }

    /// Derive leveling parameters from the game's metadata endpoint.
    ///
    /// The XP table is keyed by the XP needed for each level. The increment is
    /// the XP of the second level and the cap is the first level whose XP step
    /// repeats the previous one.
    pub fn from_metainfo(game: Game, meta: &GameMetainfo) -> Self {
        let thresholds: Vec<u64> = meta.experience_to_level.keys().copied().collect();
        let max_level = thresholds.len() as u32;
        let max_prestige = meta.allow_prestiging.then_some(meta.max_prestige);

        if game == Game::Bridge {
            return Self {
                curve: LevelCurve::Geometric,
                max_level,
                max_prestige,
            };
        }

        let increment = thresholds.get(1).copied().unwrap_or(0);
        let mut increment_cap = None;
        let mut previous_step = increment;
        for level in 2..thresholds.len() {
            let step = thresholds[level].saturating_sub(thresholds[level - 1]);
            if step == previous_step {
                increment_cap = Some(level as u32);
                break;
            }
            previous_step = step;
        }

        Self::quadratic(increment as u32, increment_cap, max_level, max_prestige)
    }
}

/// Static registry entry for a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GameInfo {
    pub game: Game,
    pub levels: LevelingConfig,
    pub leaderboard_epoch: LeaderboardEpoch,
}

impl Game {
    /// Every game known to the registry.
    pub const ALL: [Game; 14] = [
        Game::TreasureWars,
        Game::BedWars,
        Game::DeathRun,
        Game::HideAndSeek,
        Game::MurderMystery,
        Game::SurvivalGames,
        Game::SkyWars,
        Game::JustBuild,
        Game::GroundWars,
        Game::BlockDrop,
        Game::CaptureTheFlag,
        Game::BlockParty,
        Game::Bridge,
        Game::Gravity,
    ];

    /// Identifier used in API paths.
    pub fn id(&self) -> &'static str {
        match self {
            Game::TreasureWars => "wars",
            Game::BedWars => "bed",
            Game::DeathRun => "dr",
            Game::HideAndSeek => "hide",
            Game::MurderMystery => "murder",
            Game::SurvivalGames => "sg",
            Game::SkyWars => "sky",
            Game::JustBuild => "build",
            Game::GroundWars => "ground",
            Game::BlockDrop => "drop",
            Game::CaptureTheFlag => "ctf",
            Game::BlockParty => "party",
            Game::Bridge => "bridge",
            Game::Gravity => "grav",
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Game::TreasureWars => "Treasure Wars",
            Game::BedWars => "BedWars",
            Game::DeathRun => "Death Run",
            Game::HideAndSeek => "Hide and Seek",
            Game::MurderMystery => "Murder Mystery",
            Game::SurvivalGames => "Survival Games",
            Game::SkyWars => "SkyWars",
            Game::JustBuild => "Just Build",
            Game::GroundWars => "Ground Wars",
            Game::BlockDrop => "Block Drop",
            Game::CaptureTheFlag => "Capture The Flag",
            Game::BlockParty => "Block Party",
            Game::Bridge => "The Bridge",
            Game::Gravity => "Gravity",
        }
    }

    /// Registry entry for this game.
    pub fn info(&self) -> GameInfo {
        let (levels, leaderboard_epoch) = match self {
            Game::TreasureWars => (
                LevelingConfig::quadratic(150, Some(52), 100, Some(5)),
                LeaderboardEpoch::new(YearMonth::new(2018, 12))
                    .archived_at(YearMonth::new(2024, 3)),
            ),
            Game::BedWars => (
                LevelingConfig::quadratic(150, Some(52), 100, Some(5)),
                LeaderboardEpoch::new(YearMonth::new(2024, 3)),
            ),
            Game::DeathRun => (
                LevelingConfig::quadratic(200, Some(42), 75, None),
                LeaderboardEpoch::new(YearMonth::new(2019, 1)),
            ),
            Game::HideAndSeek => (
                LevelingConfig::quadratic(100, None, 75, None),
                LeaderboardEpoch::new(YearMonth::new(2022, 6)),
            ),
            Game::MurderMystery => (
                LevelingConfig::quadratic(100, Some(82), 100, Some(5)),
                LeaderboardEpoch::new(YearMonth::new(2019, 6)),
            ),
            Game::SurvivalGames => (
                LevelingConfig::quadratic(150, None, 30, None),
                LeaderboardEpoch::new(YearMonth::new(2019, 8)),
            ),
            Game::SkyWars => (
                LevelingConfig::quadratic(150, Some(52), 75, None),
                LeaderboardEpoch::new(YearMonth::new(2020, 5)),
            ),
            Game::JustBuild => (
                LevelingConfig::quadratic(100, None, 20, None),
                LeaderboardEpoch::new(YearMonth::new(2022, 1)),
            ),
            Game::GroundWars => (
                LevelingConfig::quadratic(150, None, 20, None),
                LeaderboardEpoch::new(YearMonth::new(2022, 6)),
            ),
            Game::BlockDrop => (
                LevelingConfig::quadratic(150, Some(22), 25, None),
                LeaderboardEpoch::new(YearMonth::new(2022, 6)),
            ),
            Game::CaptureTheFlag => (
                LevelingConfig::quadratic(150, None, 50, None),
                LeaderboardEpoch::new(YearMonth::new(2022, 6)),
            ),
            Game::BlockParty => (
                LevelingConfig::quadratic(150, None, 25, None),
                LeaderboardEpoch::new(YearMonth::new(2023, 1)),
            ),
            Game::Bridge => (
                LevelingConfig {
                    curve: LevelCurve::Geometric,
                    max_level: 20,
                    max_prestige: None,
                },
                LeaderboardEpoch::new(YearMonth::new(2023, 6)),
            ),
            Game::Gravity => (
                LevelingConfig::quadratic(150, None, 25, None),
                LeaderboardEpoch::new(YearMonth::new(2023, 7)),
            ),
        };

        GameInfo {
            game: *self,
            levels,
            leaderboard_epoch,
        }
    }

    pub fn levels(&self) -> LevelingConfig {
        self.info().levels
    }

    pub fn leaderboard_epoch(&self) -> LeaderboardEpoch {
        self.info().leaderboard_epoch
    }

    /// Whether players can prestige in this game.
    pub fn supports_prestige(&self) -> bool {
        self.levels().max_prestige.is_some()
    }

    /// Check that monthly leaderboard data can exist for `date`.
    pub fn validate_month(&self, date: YearMonth) -> Result<(), ValidationError> {
        if !(1..=12).contains(&date.month) {
            return Err(ValidationError::InvalidMonth { month: date.month });
        }

        let epoch = self.leaderboard_epoch();
        if epoch.contains(date) {
            return Ok(());
        }

        match epoch.archived {
            Some(archived) if date > archived => Err(ValidationError::AfterArchive {
                game: *self,
                requested: date,
                archived,
            }),
            _ => Err(ValidationError::BeforeEpoch {
                game: *self,
                requested: date,
                epoch: epoch.start,
            }),
        }
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Game {
    type Err = UnknownGame;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Game::ALL
            .into_iter()
            .find(|game| game.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownGame(s.to_string()))
    }
}
