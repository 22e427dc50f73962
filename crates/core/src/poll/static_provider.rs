//! Fixed watchlist provider.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

use super::types::{Provider, ProviderError};
use crate::config::{ConfigError, WatchlistEntry};
use crate::media::SearchItem;

/// Provider that returns the same configured items on every poll.
pub struct StaticProvider {
    name: String,
    items: Vec<SearchItem>,
    interval: Duration,
}

impl StaticProvider {
    pub fn new(name: impl Into<String>, items: Vec<SearchItem>, interval: Duration) -> Self {
        Self {
            name: name.into(),
            items,
            interval,
        }
    }

    /// Build one provider per distinct interval of the watchlist.
    pub fn from_watchlist(entries: &[WatchlistEntry]) -> Result<Vec<Self>, ConfigError> {
        let mut by_interval: BTreeMap<u64, Vec<SearchItem>> = BTreeMap::new();
        for entry in entries {
            let item = entry
                .to_search_item()
                .map_err(ConfigError::ValidationError)?;
            by_interval.entry(entry.interval_secs).or_default().push(item);
        }

        Ok(by_interval
            .into_iter()
            .map(|(secs, items)| {
                Self::new(
                    format!("watchlist-{}s", secs),
                    items,
                    Duration::from_secs(secs),
                )
            })
            .collect())
    }

    pub fn items(&self) -> &[SearchItem] {
        &self.items
    }
}

#[async_trait]
impl Provider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn poll(&self) -> Result<Vec<SearchItem>, ProviderError> {
        Ok(self.items.clone())
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_returns_configured_items() {
        let provider = StaticProvider::new(
            "watchlist",
            vec![SearchItem::movie("Batman", 2010)],
            Duration::from_secs(60),
        );
        let items = provider.poll().await.unwrap();
        assert_eq!(items, vec![SearchItem::movie("Batman", 2010)]);
        assert_eq!(provider.interval(), Duration::from_secs(60));
        assert_eq!(provider.name(), "watchlist");
    }

    #[test]
    fn test_from_watchlist_groups_by_interval() {
        let config = crate::config::load_config_from_str(
            r#"
[[watchlist]]
title = "Batman"
type = "movie"
year = 2010
interval_secs = 60

[[watchlist]]
title = "Lost"
type = "season"
season = 1

[[watchlist]]
title = "Heat"
type = "movie"
year = 1995
interval_secs = 60
"#,
        )
        .unwrap();

        let providers = StaticProvider::from_watchlist(&config.watchlist).unwrap();
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].name(), "watchlist-60s");
        assert_eq!(
            providers[0].items(),
            &[SearchItem::movie("Batman", 2010), SearchItem::movie("Heat", 1995)]
        );
        assert_eq!(providers[1].interval(), Duration::from_secs(3600));
        assert_eq!(providers[1].items(), &[SearchItem::season("Lost", 1)]);
    }
}
