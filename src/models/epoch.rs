//! Leaderboard epochs and request validation errors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Game;

/// Errors raised before a request is sent because its date cannot be valid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid month {month}: expected 1-12")]
    InvalidMonth { month: u32 },

    #[error("No {game} leaderboard before {epoch} (requested {requested})")]
    BeforeEpoch {
        game: Game,
        requested: YearMonth,
        epoch: YearMonth,
    },

    #[error("Invalid year-month '{0}': expected YYYY-MM")]
    InvalidFormat(String),

    #[error("Invalid {name} '{value}': must be a non-empty path segment")]
    InvalidPathValue { name: &'static str, value: String },

    #[error("{game} leaderboard was archived after {archived} (requested {requested})")]
    AfterArchive {
        game: Game,
        requested: YearMonth,
        archived: YearMonth,
    },
}

/// A calendar month. Months are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub const fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = ValidationError;

    /// Parse `YYYY-MM` (or `YYYY/MM`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidFormat(s.to_string());
        let (year, month) = s.trim().split_once(['-', '/']).ok_or_else(invalid)?;
        let year = year.parse().map_err(|_| invalid())?;
        let month = month.parse().map_err(|_| invalid())?;

        if !(1..=12).contains(&month) {
            return Err(ValidationError::InvalidMonth { month });
        }
        Ok(Self::new(year, month))
    }
}

/// Range of months with monthly leaderboard data for one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEpoch {
    /// First tracked month
    pub start: YearMonth,

    /// Last month before the leaderboard was frozen (None if still live)
    pub archived: Option<YearMonth>,
}

impl LeaderboardEpoch {
    pub const fn new(start: YearMonth) -> Self {
        Self {
            start,
            archived: None,
        }
    }

    pub const fn archived_at(mut self, archived: YearMonth) -> Self {
        self.archived = Some(archived);
        self
    }

    /// Check if a month falls within this epoch.
    pub fn contains(&self, month: YearMonth) -> bool {
        if month < self.start {
            return false;
        }
        match self.archived {
            Some(end) => month <= end,
            None => true,
        }
    }
}
