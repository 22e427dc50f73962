use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::engine::EngineConfig;
use crate::media::MediaType;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub downloads: DownloadsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Items to acquire, polled by the bundled watchlist provider.
    #[serde(default)]
    pub watchlist: Vec<WatchlistEntry>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("sofa.db")
}

/// Where transfers are written.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadsConfig {
    #[serde(default = "default_downloads_dir")]
    pub dir: PathBuf,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            dir: default_downloads_dir(),
        }
    }
}

fn default_downloads_dir() -> PathBuf {
    PathBuf::from("downloads")
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// One item to acquire.
///
/// Movies need `year`, episodes need `season` and `episode`, seasons need
/// `season`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WatchlistEntry {
    pub title: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    #[serde(default)]
    pub year: Option<u16>,
    #[serde(default)]
    pub season: Option<u16>,
    #[serde(default)]
    pub episode: Option<u16>,
    #[serde(default)]
    pub imdb: Option<String>,
    /// How often the entry is re-announced (seconds).
    #[serde(default = "default_watch_interval")]
    pub interval_secs: u64,
}

fn default_watch_interval() -> u64 {
    3600 // 1 hour
}

/// Sanitized config for API responses
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
    pub downloads: DownloadsConfig,
    pub logging: LoggingConfig,
    pub watchlist_entries: usize,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            engine: config.engine.clone(),
            downloads: config.downloads.clone(),
            logging: config.logging.clone(),
            watchlist_entries: config.watchlist.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path.to_str().unwrap(), "sofa.db");
        assert_eq!(config.downloads.dir.to_str().unwrap(), "downloads");
        assert_eq!(config.engine.max_concurrent_downloads, 2);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.watchlist.is_empty());
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000

[database]
path = "/data/sofa.sqlite"

[engine]
max_concurrent_downloads = 4

[engine.retry]
max_retries = 2

[downloads]
dir = "/data/media"

[logging]
format = "json"

[[watchlist]]
title = "Batman"
type = "movie"
year = 2010
imdb = "tt0000001"

[[watchlist]]
title = "Lost"
type = "Episode"
season = 1
episode = 2
interval_secs = 600
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.engine.max_concurrent_downloads, 4);
        assert_eq!(config.engine.retry.max_retries, 2);
        assert_eq!(config.downloads.dir.to_str().unwrap(), "/data/media");
        assert_eq!(config.logging.format, LogFormat::Json);

        assert_eq!(config.watchlist.len(), 2);
        assert_eq!(config.watchlist[0].media_type, MediaType::Movie);
        assert_eq!(config.watchlist[0].interval_secs, 3600);
        assert_eq!(config.watchlist[1].episode, Some(2));
        assert_eq!(config.watchlist[1].interval_secs, 600);
    }

    #[test]
    fn test_sanitized_config() {
        let mut config = Config::default();
        config.watchlist.push(WatchlistEntry {
            title: "Batman".to_string(),
            media_type: MediaType::Movie,
            year: Some(2010),
            season: None,
            episode: None,
            imdb: None,
            interval_secs: 60,
        });

        let sanitized = SanitizedConfig::from(&config);
        assert_eq!(sanitized.server.port, 8080);
        assert_eq!(sanitized.database.path.to_str().unwrap(), "sofa.db");
        assert_eq!(sanitized.watchlist_entries, 1);
    }
}
