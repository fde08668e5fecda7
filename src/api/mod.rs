//! Hive API client.
//!
//! `HiveClient` builds request URLs, validates dates against the game
//! registry, fetches through the request cache and runs the derivation
//! engine over the returned statistics.

pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::cache::RequestCache;
use crate::calculate::{derive_leaderboard, derive_stats};
use crate::config::ApiConfig;
use crate::fetch::{
    AbortSignal, ApiRequest, FetchError, Fetcher, ReqwestTransport, RetryPolicy, Transport,
    RESOLVE_HUB_TITLES_HEADER,
};
use crate::models::{
    Game, GameMap, GameMetainfo, LevelingConfig, Player, PlayerStats, PlayerSummary, RawStats, TimeScope,
    ValidationError, YearMonth,
};

use routes::PathParams;

/// Errors returned by client queries.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Unexpected response from {endpoint}: expected {expected}")]
    UnexpectedShape {
        endpoint: &'static str,
        expected: &'static str,
    },

    #[error("Failed to decode response from {endpoint}: {message}")]
    Decode {
        endpoint: &'static str,
        message: String,
    },
}

impl ApiError {
    /// HTTP status of the failed request, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Fetch(err) => err.status(),
            _ => None,
        }
    }
}

/// Date and paging for a monthly leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthlyLeaderboardQuery {
    pub date: YearMonth,
    pub amount: Option<u32>,
    pub skip: Option<u32>,
}

impl MonthlyLeaderboardQuery {
    pub fn new(date: YearMonth) -> Self {
        Self {
            date,
            amount: None,
            skip: None,
        }
    }

    pub fn amount(mut self, amount: u32) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Skip entries; only sent together with an amount.
    pub fn skip(mut self, skip: u32) -> Self {
        self.skip = Some(skip);
        self
    }
}

/// Leveling parameters of one game as read from its live metainfo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelingCheck {
    pub game: Game,
    /// Derived from the metainfo, or the registry entry when the lookup failed.
    pub levels: LevelingConfig,
    pub matches_registry: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Client for the Hive statistics API.
///
/// Clones share the cache, so a client with a signal attached
/// (`with_signal`) still coalesces with its parent.
#[derive(Debug, Clone)]
pub struct HiveClient {
    base_url: Url,
    fetcher: Fetcher,
    cache: RequestCache,
    signal: Option<AbortSignal>,
}

impl HiveClient {
    /// Create a client that talks to the network with `reqwest`.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(&config.user_agent)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a client over a custom transport.
    pub fn with_transport(
        config: &ApiConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ApiError> {
        let base_url = parse_base_url(&config.base_url)?;
        let fetcher = Fetcher::new(transport, &config.api_version)?.with_retry_policy(RetryPolicy {
            max_rate_limit_retries: config.max_rate_limit_retries,
            ..RetryPolicy::default()
        });

        Ok(Self {
            base_url,
            fetcher,
            cache: RequestCache::new(Duration::from_secs(config.cache_ttl_secs)),
            signal: None,
        })
    }

    /// A client whose requests stop when `signal` aborts.
    pub fn with_signal(&self, signal: AbortSignal) -> Self {
        Self {
            signal: Some(signal),
            ..self.clone()
        }
    }

    pub fn api_base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn set_api_base_url(&mut self, url: &str) -> Result<(), ApiError> {
        self.base_url = parse_base_url(url)?;
        Ok(())
    }

    /// Cache responses for `ttl_secs` seconds. Zero disables caching for
    /// new requests.
    pub fn enable_cache(&self, ttl_secs: u64) {
        self.cache.set_ttl(Duration::from_secs(ttl_secs));
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// The response cache, for inspection.
    pub fn cache(&self) -> &RequestCache {
        &self.cache
    }

    /// Statistics of a player for one month (the current month when `date`
    /// is None).
    pub async fn get_monthly_player_statistics(
        &self,
        game: Game,
        identifier: &str,
        date: Option<YearMonth>,
    ) -> Result<PlayerStats, ApiError> {
        if let Some(date) = date {
            game.validate_month(date)?;
        }

        let params = PathParams::new()
            .with("game", game)
            .with("identifier", path_value("identifier", identifier)?)
            .with_opt("year", date.map(|d| d.year))
            .with_opt("month", date.map(|d| d.month));

        let value = self.request(routes::MONTHLY_PLAYER, &params, None).await?;
        let mut stats = expect_object(routes::MONTHLY_PLAYER, value)?;
        derive_stats(game, TimeScope::Monthly, &mut stats);
        Ok(PlayerStats::new(stats))
    }

    pub async fn get_all_time_player_statistics(
        &self,
        game: Game,
        identifier: &str,
    ) -> Result<PlayerStats, ApiError> {
        let params = PathParams::new()
            .with("game", game)
            .with("identifier", path_value("identifier", identifier)?);

        let value = self.request(routes::ALL_TIME_PLAYER, &params, None).await?;
        let mut stats = expect_object(routes::ALL_TIME_PLAYER, value)?;
        derive_stats(game, TimeScope::AllTime, &mut stats);
        Ok(PlayerStats::new(stats))
    }

    /// Monthly leaderboard; the current month when `query` is None.
    pub async fn get_monthly_leaderboard(
        &self,
        game: Game,
        query: Option<MonthlyLeaderboardQuery>,
    ) -> Result<Vec<PlayerStats>, ApiError> {
        if let Some(query) = query {
            game.validate_month(query.date)?;
        }

        let params = PathParams::new()
            .with("game", game)
            .with_opt("year", query.map(|q| q.date.year))
            .with_opt("month", query.map(|q| q.date.month))
            .with_opt("amount", query.and_then(|q| q.amount))
            .with_opt("skip", query.and_then(|q| q.skip));

        let value = self.request(routes::MONTHLY_LEADERBOARD, &params, None).await?;
        let mut records = expect_records(routes::MONTHLY_LEADERBOARD, value)?;
        derive_leaderboard(game, TimeScope::Monthly, &mut records);
        Ok(records.into_iter().map(PlayerStats::new).collect())
    }

    pub async fn get_all_time_leaderboard(&self, game: Game) -> Result<Vec<PlayerStats>, ApiError> {
        let params = PathParams::new().with("game", game);

        let value = self
            .request(routes::ALL_TIME_LEADERBOARD, &params, None)
            .await?;
        let mut records = expect_records(routes::ALL_TIME_LEADERBOARD, value)?;
        derive_leaderboard(game, TimeScope::AllTime, &mut records);
        Ok(records.into_iter().map(PlayerStats::new).collect())
    }

    /// Server-wide statistics, as returned by the API.
    pub async fn get_server_statistics(&self) -> Result<RawStats, ApiError> {
        let value = self
            .request(routes::SERVER_STATISTICS, &PathParams::new(), None)
            .await?;
        expect_object(routes::SERVER_STATISTICS, value)
    }

    pub async fn get_game_maps(&self, game: Game) -> Result<Vec<GameMap>, ApiError> {
        let params = PathParams::new().with("game", game);
        let value = self.request(routes::GAME_MAPS, &params, None).await?;
        decode(routes::GAME_MAPS, value)
    }

    pub async fn get_game_metainfo(&self, game: Game) -> Result<GameMetainfo, ApiError> {
        let params = PathParams::new().with("game", game);
        let value = self.request(routes::GAME_METAINFO, &params, None).await?;
        decode(routes::GAME_METAINFO, value)
    }

    /// Main profile of a player.
    pub async fn get_player_info(
        &self,
        identifier: &str,
        resolve_hub_titles: bool,
    ) -> Result<Player, ApiError> {
        let params = PathParams::new().with("identifier", path_value("identifier", identifier)?);
        let header = resolve_hub_titles.then_some((RESOLVE_HUB_TITLES_HEADER, "true"));

        let value = self.request(routes::PLAYER_INFO, &params, header).await?;
        let profile = match value {
            Value::Object(mut object) if object.contains_key("main") => {
                object.remove("main").unwrap_or(Value::Null)
            }
            other => other,
        };
        decode(routes::PLAYER_INFO, profile)
    }

    /// Compare the live leveling tables of `games` against the registry.
    ///
    /// A failed lookup is reported on its own entry and does not stop the
    /// remaining games.
    pub async fn check_leveling(&self, games: &[Game]) -> Vec<LevelingCheck> {
        let mut checks = Vec::with_capacity(games.len());
        for &game in games {
            let registry = game.levels();
            let check = match self.get_game_metainfo(game).await {
                Ok(meta) => {
                    let levels = LevelingConfig::from_metainfo(game, &meta);
                    if levels != registry {
                        warn!(%game, "Live leveling config differs from the registry");
                    }
                    LevelingCheck {
                        game,
                        levels,
                        matches_registry: levels == registry,
                        error: None,
                    }
                }
                Err(err) => {
                    warn!(%game, error = %err, "Could not read game metainfo");
                    LevelingCheck {
                        game,
                        levels: registry,
                        matches_registry: true,
                        error: Some(err.to_string()),
                    }
                }
            };
            checks.push(check);
        }
        checks
    }

    /// Players whose username starts with `partial`.
    pub async fn search_players(&self, partial: &str) -> Result<Vec<PlayerSummary>, ApiError> {
        let params = PathParams::new().with("partial", path_value("partial", partial)?);
        let value = self.request(routes::PLAYER_SEARCH, &params, None).await?;
        decode(routes::PLAYER_SEARCH, value)
    }

    async fn request(
        &self,
        template: &'static str,
        params: &PathParams,
        header: Option<(&'static str, &str)>,
    ) -> Result<Value, ApiError> {
        let url = routes::build_url(&self.base_url, template, params)?;
        debug!(endpoint = template, %url, "Querying");

        let mut request = ApiRequest::new(url);
        if let Some((name, value)) = header {
            request = request.with_header(name, value)?;
        }

        Ok(self
            .fetcher
            .fetch(&self.cache, &request, self.signal.as_ref())
            .await?)
    }
}

/// Reject values that would not survive as a single path segment.
fn path_value<'a>(name: &'static str, value: &'a str) -> Result<&'a str, ValidationError> {
    match value.trim() {
        "" | "." | ".." => Err(ValidationError::InvalidPathValue {
            name,
            value: value.to_string(),
        }),
        _ => Ok(value),
    }
}

fn parse_base_url(url: &str) -> Result<Url, FetchError> {
    let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
    if parsed.cannot_be_a_base() {
        return Err(FetchError::InvalidUrl(url.to_string()));
    }
    Ok(parsed)
}

fn expect_object(endpoint: &'static str, value: Value) -> Result<RawStats, ApiError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::UnexpectedShape {
            endpoint,
            expected: "an object",
        }),
    }
}

fn expect_records(endpoint: &'static str, value: Value) -> Result<Vec<RawStats>, ApiError> {
    let Value::Array(items) = value else {
        return Err(ApiError::UnexpectedShape {
            endpoint,
            expected: "an array",
        });
    };

    items
        .into_iter()
        .map(|item| expect_object(endpoint, item))
        .collect()
}

fn decode<T: DeserializeOwned>(endpoint: &'static str, value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Decode {
        endpoint,
        message: e.to_string(),
    })
}
