//! Statistics derivation engine.
//!
//! Augments raw API payloads in place with derived metrics:
//! - Losses and win percentage
//! - Kill, final kill and seeker kill ratios, kills and rounds per game
//! - Game specific rates (checkpoints, treasures, deathmatches, efficiency)
//! - Level from XP (all-time payloads)
//!
//! Computed values that are not numbers are never written, so a missing
//! input field results in a missing output field and any stale value under
//! that key is removed.

mod level;

pub use level::{calculate_level, geometric_level, quadratic_level};

use serde_json::Value;

use crate::models::{Game, RawStats, TimeScope};

/// Prefix of per-mode fields in monthly BedWars payloads.
const MONTHLY_SOLO_PREFIX: &str = "m_solo_";

/// Derive all computed fields for one statistics payload.
pub fn derive_stats(game: Game, scope: TimeScope, stats: &mut RawStats) {
    if game == Game::BedWars && scope == TimeScope::Monthly {
        strip_field_prefix(stats, MONTHLY_SOLO_PREFIX);
    }

    apply_win_stats(stats);
    apply_ratio(stats, "rpd", "played", "deaths");

    match game {
        Game::TreasureWars | Game::BedWars => {
            apply_kill_ratios(stats, None);
            apply_final_kill_ratios(stats);
            if game == Game::TreasureWars {
                apply_ratio(stats, "ddr", "treasure_destroyed", "deaths");
            }
        }
        Game::HideAndSeek => {
            apply_kill_ratios(stats, Some("hider_kills"));
            apply_ratio(stats, "skdr", "seeker_kills", "deaths");
        }
        Game::SurvivalGames => {
            apply_kill_ratios(stats, None);
            apply_ratio(stats, "dmpr", "deathmatches", "played");
        }
        Game::SkyWars | Game::GroundWars | Game::CaptureTheFlag | Game::Bridge => {
            apply_kill_ratios(stats, None)
        }
        Game::DeathRun => apply_ratio(stats, "cdr", "checkpoints", "deaths"),
        Game::MurderMystery => apply_efficiency(stats),
        Game::JustBuild | Game::BlockDrop | Game::BlockParty | Game::Gravity => {}
    }

    if scope == TimeScope::AllTime {
        let xp = if game.supports_prestige() {
            normalize_prestige(stats)
        } else {
            number(stats, "xp")
        };
        let level = xp.map_or(f64::NAN, |xp| calculate_level(&game.levels(), xp));
        set_number(stats, "level", level);
    }
}

/// Derive computed fields for every record of a leaderboard.
pub fn derive_leaderboard(game: Game, scope: TimeScope, records: &mut [RawStats]) {
    for record in records {
        derive_stats(game, scope, record);
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Division that falls back to the numerator when the denominator is zero.
pub fn safe_div(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        numerator
    } else {
        numerator / denominator
    }
}

/// Ratio rounded to two decimals; the numerator when the denominator is zero.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        numerator
    } else {
        round2(numerator / denominator)
    }
}

/// Format a 0-1 win rate the way the Hive site does (`"40.00%"`).
///
/// Halves round up, as in `round2`.
pub fn format_win_percentage(played: f64, victories: f64) -> String {
    if played == 0.0 {
        "0%".to_string()
    } else {
        format!("{:.2}%", round2(victories / played * 100.0))
    }
}

fn apply_win_stats(stats: &mut RawStats) {
    let (Some(played), Some(victories)) = (number(stats, "played"), number(stats, "victories"))
    else {
        for key in ["losses", "win_percentage_raw", "win_percentage"] {
            stats.remove(key);
        }
        return;
    };

    set_number(stats, "losses", played - victories);
    let raw = if played == 0.0 { 0.0 } else { victories / played };
    set_number(stats, "win_percentage_raw", raw);
    stats.insert(
        "win_percentage".to_string(),
        Value::String(format_win_percentage(played, victories)),
    );
}

/// `kdr` and `kpr`, reading kills from `alias` when `kills` is absent.
fn apply_kill_ratios(stats: &mut RawStats, alias: Option<&str>) {
    let kills = number(stats, "kills").or_else(|| alias.and_then(|key| number(stats, key)));
    set_computed(stats, "kdr", kills, number(stats, "deaths"), ratio);
    set_computed(stats, "kpr", kills, number(stats, "played"), ratio);
}

/// Tenths of murderer eliminations per coin.
fn apply_efficiency(stats: &mut RawStats) {
    let eliminations = number(stats, "murderer_eliminations").map(|n| n / 10.0);
    set_computed(stats, "efficiency", eliminations, number(stats, "coins"), safe_div);
}

fn apply_final_kill_ratios(stats: &mut RawStats) {
    apply_ratio(stats, "fkdr", "final_kills", "deaths");
    apply_ratio(stats, "fkpr", "final_kills", "played");
}

fn apply_ratio(stats: &mut RawStats, key: &str, numerator: &str, denominator: &str) {
    let (n, d) = (number(stats, numerator), number(stats, denominator));
    set_computed(stats, key, n, d, ratio);
}

/// Store `op(n, d)`, or drop `key` when an input is missing.
fn set_computed(
    stats: &mut RawStats,
    key: &str,
    numerator: Option<f64>,
    denominator: Option<f64>,
    op: fn(f64, f64) -> f64,
) {
    let value = match (numerator, denominator) {
        (Some(n), Some(d)) => op(n, d),
        _ => f64::NAN,
    };
    set_number(stats, key, value);
}

/// Default `prestige` to 0 and return the XP to level from.
///
/// A player who prestiged but has no XP in the current cycle levels from 0.
fn normalize_prestige(stats: &mut RawStats) -> Option<f64> {
    let prestige = number(stats, "prestige").unwrap_or(0.0);
    stats
        .entry("prestige")
        .or_insert_with(|| Value::from(0));

    match number(stats, "xp") {
        Some(xp) => Some(xp),
        None if prestige > 0.0 => Some(0.0),
        None => None,
    }
}

/// Move `prefix`ed fields to their unprefixed names.
fn strip_field_prefix(stats: &mut RawStats, prefix: &str) {
    let prefixed: Vec<String> = stats
        .keys()
        .filter(|key| key.starts_with(prefix))
        .cloned()
        .collect();

    for key in prefixed {
        if let Some(value) = stats.remove(&key) {
            stats.insert(key[prefix.len()..].to_string(), value);
        }
    }
}

fn number(stats: &RawStats, key: &str) -> Option<f64> {
    stats.get(key).and_then(Value::as_f64)
}

/// Store a computed number, or drop the key when it is not a number.
fn set_number(stats: &mut RawStats, key: &str, value: f64) {
    match json_number(value) {
        Some(value) => {
            stats.insert(key.to_string(), value);
        }
        None => {
            stats.remove(key);
        }
    }
}

fn json_number(value: f64) -> Option<Value> {
    if !value.is_finite() {
        return None;
    }
    // Whole numbers stay integers in the output JSON
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        return Some(Value::from(value as i64));
    }
    serde_json::Number::from_f64(value).map(Value::Number)
}
