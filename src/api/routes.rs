//! API path templates and URL building.
//!
//! Templates use `{name}` placeholders. Values are percent-encoded as path
//! segments. A placeholder without a value (or with an empty one) ends the
//! path there, so optional trailing segments are simply left off.

use url::Url;

use crate::fetch::FetchError;

pub const MONTHLY_PLAYER: &str = "/game/monthly/player/{game}/{identifier}/{year}/{month}";
pub const ALL_TIME_PLAYER: &str = "/game/all/{game}/{identifier}";
pub const MONTHLY_LEADERBOARD: &str = "/game/monthly/{game}/{year}/{month}/{amount}/{skip}";
pub const ALL_TIME_LEADERBOARD: &str = "/game/all/{game}";
pub const SERVER_STATISTICS: &str = "/global/statistics";
pub const GAME_MAPS: &str = "/game/map/{game}";
pub const GAME_METAINFO: &str = "/game/meta/{game}";
pub const PLAYER_INFO: &str = "/game/all/main/{identifier}";
pub const PLAYER_SEARCH: &str = "/player/search/{partial}";

/// Values for a template's placeholders.
#[derive(Debug, Clone, Default)]
pub struct PathParams {
    values: Vec<(&'static str, String)>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, value: impl ToString) -> Self {
        self.values.push((name, value.to_string()));
        self
    }

    /// Add a value only when present.
    pub fn with_opt<T: ToString>(self, name: &'static str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.with(name, value),
            None => self,
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Append `template` to the path of `base`, substituting placeholders.
pub fn build_url(base: &Url, template: &str, params: &PathParams) -> Result<Url, FetchError> {
    let mut url = base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| FetchError::InvalidUrl(base.to_string()))?;
        segments.pop_if_empty();

        for segment in template.split('/').filter(|s| !s.is_empty()) {
            let Some(name) = placeholder(segment) else {
                segments.push(segment);
                continue;
            };

            match params.get(name) {
                Some("." | "..") => return Err(FetchError::InvalidUrl(template.to_string())),
                Some(value) if !value.is_empty() => {
                    segments.push(value);
                }
                _ => break,
            }
        }
    }

    Ok(url)
}

fn placeholder(segment: &str) -> Option<&str> {
    segment.strip_prefix('{')?.strip_suffix('}')
}
