use super::{types::Config, ConfigError, WatchlistEntry};
use crate::media::{MediaType, SearchItem};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Engine has at least one slot and a non-zero poll interval
/// - Every watchlist entry names a complete item
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Engine validation
    if config.engine.max_concurrent_downloads == 0 {
        return Err(ConfigError::ValidationError(
            "engine.max_concurrent_downloads must be at least 1".to_string(),
        ));
    }
    if config.engine.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "engine.poll_interval_ms cannot be 0".to_string(),
        ));
    }
    if config.engine.output_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "engine.output_buffer cannot be 0".to_string(),
        ));
    }

    for (idx, entry) in config.watchlist.iter().enumerate() {
        entry
            .to_search_item()
            .map_err(|e| ConfigError::ValidationError(format!("watchlist[{}]: {}", idx, e)))?;
        if entry.interval_secs == 0 {
            return Err(ConfigError::ValidationError(format!(
                "watchlist[{}]: interval_secs cannot be 0",
                idx
            )));
        }
    }

    Ok(())
}

impl WatchlistEntry {
    /// Build the search item this entry names.
    pub fn to_search_item(&self) -> Result<SearchItem, String> {
        if self.title.trim().is_empty() {
            return Err("title cannot be empty".to_string());
        }

        let item = match (self.media_type, self.year, self.season, self.episode) {
            (MediaType::Movie, Some(year), _, _) => SearchItem::movie(&self.title, year),
            (MediaType::Movie, None, _, _) => {
                return Err(format!("movie '{}' needs a year", self.title))
            }
            (MediaType::Episode, _, Some(season), Some(episode)) => {
                SearchItem::episode(&self.title, season, episode)
            }
            (MediaType::Episode, _, _, _) => {
                return Err(format!(
                    "episode of '{}' needs a season and an episode",
                    self.title
                ))
            }
            (MediaType::Season, _, Some(season), _) => SearchItem::season(&self.title, season),
            (MediaType::Season, _, None, _) => {
                return Err(format!("season of '{}' needs a season number", self.title))
            }
        };

        Ok(match &self.imdb {
            Some(imdb) => item.with_imdb(imdb.as_str()),
            None => item,
        })
    }
}
