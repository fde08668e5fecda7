//! # Hive Stats
//!
//! A client for the Hive game statistics API with derived statistics and
//! request caching.
//!
//! ## Architecture
//!
//! - **models**: Game registry, leaderboard epochs and payload types
//! - **calculate**: Derived statistics (ratios, win percentage, level from XP)
//! - **cache**: Request cache that coalesces identical in-flight requests
//! - **fetch**: HTTP fetching with rate-limit retries and cancellation
//! - **api**: `HiveClient` query functions
//! - **config**: Configuration loading and validation

pub mod api;
pub mod cache;
pub mod calculate;
pub mod config;
pub mod fetch;
pub mod models;

pub use api::{ApiError, HiveClient, LevelingCheck, MonthlyLeaderboardQuery};
pub use models::*;

use std::time::Duration;

/// Parse a human-friendly duration string (e.g., "1h", "5m", "90s").
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('h') {
        (n, 3600)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1)
    } else {
        // Default to seconds
        (s, 1)
    };

    let num: u64 = num_str.trim().parse().ok()?;
    num.checked_mul(multiplier).map(Duration::from_secs)
}
