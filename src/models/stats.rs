//! Player statistics payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A raw statistics object as returned by the API.
pub type RawStats = Map<String, Value>;

/// Time window a statistics payload covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeScope {
    Monthly,
    AllTime,
}

/// Statistics for one player in one game, including derived fields.
///
/// Fields are kept loosely typed: which keys exist depends on the game and
/// on what the player has unlocked, and a missing key is meaningful.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerStats(RawStats);

impl PlayerStats {
    pub fn new(stats: RawStats) -> Self {
        Self(stats)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn username(&self) -> Option<&str> {
        self.get_str("username")
    }

    pub fn as_map(&self) -> &RawStats {
        &self.0
    }

    pub fn into_inner(self) -> RawStats {
        self.0
    }
}

impl From<RawStats> for PlayerStats {
    fn from(stats: RawStats) -> Self {
        Self(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> PlayerStats {
        let Value::Object(map) = json!({
            "username": "Steve",
            "played": 12,
            "win_percentage": "50.00%"
        }) else {
            unreachable!()
        };
        PlayerStats::new(map)
    }

    #[test]
    fn test_accessors() {
        let stats = sample();
        assert_eq!(stats.username(), Some("Steve"));
        assert_eq!(stats.get_f64("played"), Some(12.0));
        assert_eq!(stats.get_str("win_percentage"), Some("50.00%"));
        assert!(stats.get_f64("kills").is_none());
        assert!(!stats.contains_key("kills"));
    }

    #[test]
    fn test_serializes_transparently() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["played"], 12);

        let parsed: PlayerStats = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn test_time_scope_serialization() {
        assert_eq!(
            serde_json::to_string(&TimeScope::AllTime).unwrap(),
            "\"all_time\""
        );
    }
}
