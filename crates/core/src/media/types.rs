//! Types for media items and their sources.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a persisted or configured enum value is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseMediaError {
    kind: &'static str,
    value: String,
}

impl ParseMediaError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Kind of media an item refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    #[serde(alias = "movie")]
    Movie,
    #[serde(alias = "episode")]
    Episode,
    /// A full season, downloaded as a pack.
    #[serde(alias = "season")]
    Season,
}

impl MediaType {
    /// Returns the string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "Movie",
            MediaType::Episode => "Episode",
            MediaType::Season => "Season",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = ParseMediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Movie" | "movie" => Ok(MediaType::Movie),
            "Episode" | "episode" => Ok(MediaType::Episode),
            "Season" | "season" => Ok(MediaType::Season),
            other => Err(ParseMediaError::new("media type", other)),
        }
    }
}

/// A normalized identity for one unit of media to acquire.
///
/// Two items are equal when their unique titles are equal; the IMDb id and
/// the type tag are carried along but do not take part in identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchItem {
    unique_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    imdb: Option<String>,
    media_type: MediaType,
}

impl SearchItem {
    /// A movie, identified as `"{title} {year}"`.
    pub fn movie(title: &str, year: u16) -> Self {
        Self {
            unique_title: format!("{} {}", title, year),
            imdb: None,
            media_type: MediaType::Movie,
        }
    }

    /// A single episode, identified as `"{title} S01E02"`.
    pub fn episode(title: &str, season: u16, episode: u16) -> Self {
        Self {
            unique_title: format!("{} S{:02}E{:02}", title, season, episode),
            imdb: None,
            media_type: MediaType::Episode,
        }
    }

    /// A whole season, identified as `"{title} S01"`.
    pub fn season(title: &str, season: u16) -> Self {
        Self {
            unique_title: format!("{} S{:02}", title, season),
            imdb: None,
            media_type: MediaType::Season,
        }
    }

    /// Rebuild an item from its persisted parts.
    pub fn from_parts(
        unique_title: impl Into<String>,
        media_type: MediaType,
        imdb: Option<String>,
    ) -> Self {
        Self {
            unique_title: unique_title.into(),
            imdb,
            media_type,
        }
    }

    /// Attach an external catalog (IMDb) identifier.
    pub fn with_imdb(mut self, imdb: impl Into<String>) -> Self {
        let imdb = imdb.into();
        self.imdb = if imdb.is_empty() { None } else { Some(imdb) };
        self
    }

    pub fn unique_title(&self) -> &str {
        &self.unique_title
    }

    pub fn imdb(&self) -> Option<&str> {
        self.imdb.as_deref()
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }
}

impl PartialEq for SearchItem {
    fn eq(&self, other: &Self) -> bool {
        self.unique_title == other.unique_title
    }
}

impl Eq for SearchItem {}

impl Hash for SearchItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.unique_title.hash(state);
    }
}

impl fmt::Display for SearchItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.unique_title)
    }
}

/// Resolution tier of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Quality {
    #[serde(rename = "SD")]
    Sd,
    #[serde(rename = "HD")]
    Hd,
    #[serde(rename = "FHD")]
    Fhd,
    #[serde(rename = "4K")]
    Uhd4k,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Sd => "SD",
            Quality::Hd => "HD",
            Quality::Fhd => "FHD",
            Quality::Uhd4k => "4K",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = ParseMediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SD" => Ok(Quality::Sd),
            "HD" => Ok(Quality::Hd),
            "FHD" => Ok(Quality::Fhd),
            "4K" => Ok(Quality::Uhd4k),
            other => Err(ParseMediaError::new("quality", other)),
        }
    }
}

/// Video encoding of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encoding {
    #[serde(rename = "XviD")]
    Xvid,
    #[serde(rename = "x264")]
    X264,
    #[serde(rename = "x265")]
    X265,
    #[serde(rename = "VC-1")]
    Vc1,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Xvid => "XviD",
            Encoding::X264 => "x264",
            Encoding::X265 => "x265",
            Encoding::Vc1 => "VC-1",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = ParseMediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "XviD" => Ok(Encoding::Xvid),
            "x264" => Ok(Encoding::X264),
            "x265" => Ok(Encoding::X265),
            "VC-1" => Ok(Encoding::Vc1),
            other => Err(ParseMediaError::new("encoding", other)),
        }
    }
}

/// A candidate download source for a [`SearchItem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Magnet {
    /// Magnet URI or any other locator understood by the extractors.
    pub location: String,
    pub quality: Quality,
    pub encoding: Encoding,
    /// The item this source was found for.
    pub item: SearchItem,
    /// Size in bytes.
    pub size_bytes: u64,
    pub seeders: u32,
    /// Ranking assigned by the scraper; recovery replays lower ratings first.
    pub rating: i32,
}

impl Magnet {
    /// Create a source with default metadata (SD, x264, no size or seeders).
    pub fn new(item: SearchItem, location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            quality: Quality::Sd,
            encoding: Encoding::X264,
            item,
            size_bytes: 0,
            seeders: 0,
            rating: 0,
        }
    }

    /// Set quality and encoding by classifying a release title.
    pub fn classified_from(mut self, release_title: &str) -> Self {
        self.quality = Quality::from_title(release_title);
        self.encoding = Encoding::from_title(release_title);
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = size_bytes;
        self
    }

    pub fn with_seeders(mut self, seeders: u32) -> Self {
        self.seeders = seeders;
        self
    }

    pub fn with_rating(mut self, rating: i32) -> Self {
        self.rating = rating;
        self
    }
}

/// A concrete, extracted unit ready for transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Download {
    /// Remote location; the engine deduplicates on this.
    pub location: String,
    /// Local path the transfer writes to.
    pub destination: PathBuf,
    pub item: SearchItem,
}

impl Download {
    pub fn new(item: SearchItem, location: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
            destination: destination.into(),
            item,
        }
    }
}

/// Pipeline status of a persisted media record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaStatus {
    Pending,
    Scraped,
    Extracting,
    Downloading,
    Downloaded,
    Error,
}

impl MediaStatus {
    /// Returns the string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaStatus::Pending => "Pending",
            MediaStatus::Scraped => "Scraped",
            MediaStatus::Extracting => "Extracting",
            MediaStatus::Downloading => "Downloading",
            MediaStatus::Downloaded => "Downloaded",
            MediaStatus::Error => "Error",
        }
    }

    /// Downloaded and Error end a pipeline run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MediaStatus::Downloaded | MediaStatus::Error)
    }

    /// Whether the pipeline has already picked the item up past the search stage.
    pub fn is_claimed(&self) -> bool {
        matches!(
            self,
            MediaStatus::Scraped
                | MediaStatus::Extracting
                | MediaStatus::Downloading
                | MediaStatus::Downloaded
        )
    }

    fn rank(&self) -> u8 {
        match self {
            MediaStatus::Pending => 0,
            MediaStatus::Scraped => 1,
            MediaStatus::Extracting => 2,
            MediaStatus::Downloading => 3,
            MediaStatus::Downloaded => 4,
            MediaStatus::Error => 5,
        }
    }

    /// Status only moves forward; Error is reachable from any non-terminal
    /// status. An errored item may start over from Pending, or go back to
    /// Downloading when one of its transfers is resubmitted.
    pub fn can_transition_to(&self, next: MediaStatus) -> bool {
        match (self, next) {
            (MediaStatus::Error, MediaStatus::Pending | MediaStatus::Downloading) => true,
            (MediaStatus::Error, _) | (MediaStatus::Downloaded, _) => false,
            (_, MediaStatus::Error) => true,
            (current, next) => next.rank() >= current.rank(),
        }
    }

    /// Status implied by every download of an item.
    ///
    /// Downloading while any download can still finish, then Downloaded if
    /// at least one of them succeeded, Error otherwise.
    pub fn from_downloads(pending: usize, done: usize) -> MediaStatus {
        if pending > 0 {
            MediaStatus::Downloading
        } else if done > 0 {
            MediaStatus::Downloaded
        } else {
            MediaStatus::Error
        }
    }
}

impl fmt::Display for MediaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaStatus {
    type Err = ParseMediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(MediaStatus::Pending),
            "Scraped" => Ok(MediaStatus::Scraped),
            "Extracting" => Ok(MediaStatus::Extracting),
            "Downloading" => Ok(MediaStatus::Downloading),
            "Downloaded" => Ok(MediaStatus::Downloaded),
            "Error" => Ok(MediaStatus::Error),
            other => Err(ParseMediaError::new("status", other)),
        }
    }
}

/// Durable projection of an item's progress through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaRecord {
    pub item: SearchItem,
    pub status: MediaStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_unique_titles() {
        assert_eq!(SearchItem::movie("Batman", 2010).unique_title(), "Batman 2010");
        assert_eq!(
            SearchItem::episode("Superman", 1, 3).unique_title(),
            "Superman S01E03"
        );
        assert_eq!(SearchItem::season("Superman", 12).unique_title(), "Superman S12");
    }

    #[test]
    fn test_identity_ignores_imdb() {
        let a = SearchItem::movie("Batman", 2010).with_imdb("tt1");
        let b = SearchItem::movie("Batman", 2010);
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(!set.insert(b));
    }

    #[test]
    fn test_empty_imdb_is_none() {
        let item = SearchItem::movie("Batman", 2010).with_imdb("");
        assert_eq!(item.imdb(), None);
    }

    #[test]
    fn test_media_type_roundtrip() {
        for t in [MediaType::Movie, MediaType::Episode, MediaType::Season] {
            assert_eq!(t.as_str().parse::<MediaType>().unwrap(), t);
        }
        assert!("Album".parse::<MediaType>().is_err());
    }

    #[test]
    fn test_quality_and_encoding_strings() {
        assert_eq!(Quality::Uhd4k.to_string(), "4K");
        assert_eq!("FHD".parse::<Quality>().unwrap(), Quality::Fhd);
        assert_eq!(Encoding::Vc1.to_string(), "VC-1");
        assert_eq!("XviD".parse::<Encoding>().unwrap(), Encoding::Xvid);
        assert_eq!(
            serde_json::to_string(&Quality::Uhd4k).unwrap(),
            "\"4K\""
        );
    }

    #[test]
    fn test_status_transitions() {
        use MediaStatus::*;
        assert!(Pending.can_transition_to(Scraped));
        assert!(Scraped.can_transition_to(Downloading));
        assert!(Downloading.can_transition_to(Downloading));
        assert!(Extracting.can_transition_to(Error));
        assert!(!Downloading.can_transition_to(Scraped));
        assert!(!Downloaded.can_transition_to(Error));
        assert!(Error.can_transition_to(Pending));
        assert!(Error.can_transition_to(Downloading));
        assert!(!Error.can_transition_to(Downloaded));
        assert!(!Downloaded.can_transition_to(Downloading));
    }

    #[test]
    fn test_status_from_downloads() {
        assert_eq!(MediaStatus::from_downloads(1, 1), MediaStatus::Downloading);
        assert_eq!(MediaStatus::from_downloads(0, 1), MediaStatus::Downloaded);
        assert_eq!(MediaStatus::from_downloads(0, 0), MediaStatus::Error);
    }

    #[test]
    fn test_status_claimed() {
        assert!(!MediaStatus::Pending.is_claimed());
        assert!(!MediaStatus::Error.is_claimed());
        assert!(MediaStatus::Downloading.is_claimed());
    }

    #[test]
    fn test_magnet_builder() {
        let magnet = Magnet::new(SearchItem::movie("Batman", 2010), "magnet:?xt=urn:btih:abc")
            .with_size(1024)
            .with_seeders(12)
            .with_rating(3);
        assert_eq!(magnet.quality, Quality::Sd);
        assert_eq!(magnet.encoding, Encoding::X264);
        assert_eq!(magnet.size_bytes, 1024);
        assert_eq!(magnet.seeders, 12);
        assert_eq!(magnet.rating, 3);
    }
}
