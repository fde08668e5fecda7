//! Player profile models.

use serde::{Deserialize, Serialize};

/// Player rank on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rank {
    Regular,
    Plus,
    Youtuber,
    Streamer,
    Tiktok,
    Vip,
    Helper,
    Moderator,
    HiveTeam,
    StaffManager,
    CommunityManager,
    Owner,
    #[serde(other)]
    Unknown,
}

/// An equipped avatar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Avatar {
    pub url: String,
    pub name: String,
}

/// Main profile of a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    #[serde(rename = "UUID")]
    pub uuid: String,

    #[serde(default)]
    pub xuid: Option<String>,

    pub username: String,

    /// Username with its original capitalisation
    #[serde(default)]
    pub username_cc: Option<String>,

    #[serde(default)]
    pub rank: Option<Rank>,

    /// Unix timestamp of the first join
    #[serde(default)]
    pub first_played: Option<i64>,

    #[serde(default)]
    pub daily_login_streak: Option<u32>,
    #[serde(default)]
    pub longest_daily_login_streak: Option<u32>,
    #[serde(default)]
    pub hub_title_count: Option<u32>,
    #[serde(default)]
    pub costume_count: Option<u32>,
    #[serde(default)]
    pub avatar_count: Option<u32>,
    #[serde(default)]
    pub friend_count: Option<u32>,

    #[serde(default)]
    pub equipped_hub_title: Option<String>,
    #[serde(default)]
    pub equipped_costume: Option<String>,
    #[serde(default)]
    pub equipped_avatar: Option<Avatar>,
}

/// A player search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSummary {
    #[serde(rename = "UUID")]
    pub uuid: String,
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_player_deserialization() {
        let player: Player = serde_json::from_value(json!({
            "UUID": "0c1d5b8c-0000-0000-0000-000000000000",
            "xuid": "2535400000000000",
            "username": "steve",
            "username_cc": "Steve",
            "rank": "PLUS",
            "first_played": 1_600_000_000,
            "friend_count": 12,
            "equipped_hub_title": null,
            "equipped_avatar": { "url": "https://example.com/a.png", "name": "Creeper" }
        }))
        .unwrap();

        assert_eq!(player.username_cc.as_deref(), Some("Steve"));
        assert_eq!(player.rank, Some(Rank::Plus));
        assert_eq!(player.friend_count, Some(12));
        assert!(player.equipped_hub_title.is_none());
        assert_eq!(player.equipped_avatar.unwrap().name, "Creeper");
    }

    #[test]
    fn test_unknown_rank_is_tolerated() {
        let player: Player = serde_json::from_value(json!({
            "UUID": "abc",
            "username": "alex",
            "rank": "SOMETHING_NEW"
        }))
        .unwrap();

        assert_eq!(player.rank, Some(Rank::Unknown));
    }
}
