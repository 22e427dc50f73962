//! SQLite-backed media repository.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::types::{MediaRepository, RepositoryError};
use crate::media::{Download, Magnet, MediaRecord, MediaStatus, MediaType, SearchItem};

/// SQLite-backed media repository.
pub struct SqliteMediaRepository {
    conn: Mutex<Connection>,
}

type RawRecord = (String, String, Option<String>, String, String, String);

impl SqliteMediaRepository {
    /// Open (or create) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, RepositoryError> {
        let conn = Connection::open(path).map_err(|e| RepositoryError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory repository (useful for testing).
    pub fn in_memory() -> Result<Self, RepositoryError> {
        let conn =
            Connection::open_in_memory().map_err(|e| RepositoryError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), RepositoryError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS search_items (
                title TEXT PRIMARY KEY,
                type TEXT NOT NULL,
                imdb TEXT,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS torrents (
                title TEXT NOT NULL,
                url TEXT NOT NULL,
                quality TEXT NOT NULL,
                encoding TEXT NOT NULL,
                rating INTEGER NOT NULL DEFAULT 0,
                size INTEGER NOT NULL DEFAULT 0,
                seeders INTEGER NOT NULL DEFAULT 0,
                UNIQUE(title, url)
            );

            CREATE TABLE IF NOT EXISTS downloads (
                title TEXT NOT NULL,
                url TEXT NOT NULL,
                destination TEXT NOT NULL,
                filepath TEXT NOT NULL DEFAULT '',
                done INTEGER NOT NULL DEFAULT 0,
                error TEXT,
                UNIQUE(title, url)
            );

            CREATE INDEX IF NOT EXISTS idx_search_items_status ON search_items(status);
            CREATE INDEX IF NOT EXISTS idx_torrents_title ON torrents(title);
            CREATE INDEX IF NOT EXISTS idx_downloads_title ON downloads(title);
            "#,
        )
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        Ok(())
    }

    fn row_to_raw(row: &rusqlite::Row) -> rusqlite::Result<RawRecord> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ))
    }

    fn raw_to_record(raw: RawRecord) -> Result<MediaRecord, RepositoryError> {
        let (title, media_type, imdb, status, created_at, updated_at) = raw;

        let corrupt = |reason: String| RepositoryError::Corrupt {
            title: title.clone(),
            reason,
        };

        let media_type: MediaType = media_type.parse().map_err(|e| corrupt(format!("{}", e)))?;
        let status: MediaStatus = status.parse().map_err(|e| corrupt(format!("{}", e)))?;

        let created_at = parse_timestamp(&created_at);
        let updated_at = parse_timestamp(&updated_at);

        Ok(MediaRecord {
            item: SearchItem::from_parts(title, media_type, imdb),
            status,
            created_at,
            updated_at,
        })
    }

    fn parse_item(
        title: String,
        media_type: &str,
        imdb: Option<String>,
    ) -> Result<SearchItem, RepositoryError> {
        let media_type: MediaType = media_type.parse().map_err(|e| RepositoryError::Corrupt {
            title: title.clone(),
            reason: format!("{}", e),
        })?;
        Ok(SearchItem::from_parts(title, media_type, imdb))
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Fixed-width timestamps so text ordering matches time ordering.
fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn db_err(e: rusqlite::Error) -> RepositoryError {
    RepositoryError::Database(e.to_string())
}

fn current_status(conn: &Connection, title: &str) -> Result<MediaStatus, RepositoryError> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM search_items WHERE title = ?",
            params![title],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_err)?;

    let status = status.ok_or_else(|| RepositoryError::NotFound(title.to_string()))?;
    status.parse().map_err(|e| RepositoryError::Corrupt {
        title: title.to_string(),
        reason: format!("{}", e),
    })
}

impl MediaRepository for SqliteMediaRepository {
    fn store_item(&self, item: &SearchItem) -> Result<(), RepositoryError> {
        let conn = self.conn.lock().unwrap();
        let now = now();

        conn.execute(
            "INSERT OR IGNORE INTO search_items (title, type, imdb, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                item.unique_title(),
                item.media_type().as_str(),
                item.imdb(),
                MediaStatus::Pending.as_str(),
                now,
                now,
            ],
        )
        .map_err(db_err)?;

        Ok(())
    }

    fn add_download(&self, download: &Download) -> Result<(), RepositoryError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT OR IGNORE INTO downloads (title, url, destination) VALUES (?, ?, ?)",
            params![
                download.item.unique_title(),
                download.location,
                download.destination.to_string_lossy(),
            ],
        )
        .map_err(db_err)?;

        Ok(())
    }

    fn add_torrent(&self, magnet: &Magnet) -> Result<(), RepositoryError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT OR IGNORE INTO torrents (title, url, quality, encoding, rating, size, seeders) VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                magnet.item.unique_title(),
                magnet.location,
                magnet.quality.as_str(),
                magnet.encoding.as_str(),
                magnet.rating,
                magnet.size_bytes as i64,
                magnet.seeders,
            ],
        )
        .map_err(db_err)?;

        Ok(())
    }

    fn update_download(
        &self,
        download: &Download,
        filepath: &str,
        is_done: bool,
        error: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(db_err)?;
        let title = download.item.unique_title();

        tx.execute(
            "INSERT OR IGNORE INTO downloads (title, url, destination) VALUES (?, ?, ?)",
            params![
                title,
                download.location,
                download.destination.to_string_lossy(),
            ],
        )
        .map_err(db_err)?;

        tx.execute(
            "UPDATE downloads SET filepath = ?, done = ?, error = ? WHERE title = ? AND url = ?",
            params![filepath, is_done, error, title, download.location],
        )
        .map_err(db_err)?;

        let (pending, done): (i64, i64) = tx
            .query_row(
                r#"
                SELECT
                    COALESCE(SUM(CASE WHEN error IS NULL AND done = 0 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN error IS NULL AND done = 1 THEN 1 ELSE 0 END), 0)
                FROM downloads WHERE title = ?
                "#,
                params![title],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(db_err)?;
        let status = MediaStatus::from_downloads(pending as usize, done as usize);

        let current = current_status(&tx, title)?;
        if current == status || current.can_transition_to(status) {
            tx.execute(
                "UPDATE search_items SET status = ?, updated_at = ? WHERE title = ?",
                params![status.as_str(), now(), title],
            )
            .map_err(db_err)?;
        }

        tx.commit().map_err(db_err)
    }

    fn set_status(&self, title: &str, status: MediaStatus) -> Result<(), RepositoryError> {
        let conn = self.conn.lock().unwrap();

        let current = current_status(&conn, title)?;
        if current != status && !current.can_transition_to(status) {
            return Err(RepositoryError::InvalidTransition {
                title: title.to_string(),
                from: current,
                to: status,
            });
        }

        conn.execute(
            "UPDATE search_items SET status = ?, updated_at = ? WHERE title = ?",
            params![status.as_str(), now(), title],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn fetch(&self, title: &str) -> Result<Option<MediaRecord>, RepositoryError> {
        let conn = self.conn.lock().unwrap();

        let raw = conn
            .query_row(
                "SELECT title, type, imdb, status, created_at, updated_at FROM search_items WHERE title = ?",
                params![title],
                Self::row_to_raw,
            )
            .optional()
            .map_err(db_err)?;

        raw.map(Self::raw_to_record).transpose()
    }

    fn delete(&self, title: &str) -> Result<(), RepositoryError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(db_err)?;

        let deleted = tx
            .execute("DELETE FROM search_items WHERE title = ?", params![title])
            .map_err(db_err)?;
        if deleted == 0 {
            return Err(RepositoryError::NotFound(title.to_string()));
        }

        tx.execute("DELETE FROM torrents WHERE title = ?", params![title])
            .map_err(db_err)?;
        tx.execute("DELETE FROM downloads WHERE title = ?", params![title])
            .map_err(db_err)?;

        tx.commit().map_err(db_err)
    }

    fn in_progress_downloads(&self) -> Result<Vec<Download>, RepositoryError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                r#"
                SELECT m.title, m.type, m.imdb, d.url, d.destination
                FROM search_items m
                JOIN downloads d ON d.title = m.title
                WHERE m.status IN ('Extracting', 'Downloading')
                AND d.done = 0
                ORDER BY m.updated_at ASC
                "#,
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(db_err)?;

        let mut downloads = Vec::new();
        for row in rows {
            let (title, media_type, imdb, url, destination) = row.map_err(db_err)?;
            let item = Self::parse_item(title, &media_type, imdb)?;
            downloads.push(Download::new(item, url, PathBuf::from(destination)));
        }

        Ok(downloads)
    }

    fn non_extracted_torrents(&self) -> Result<Vec<Magnet>, RepositoryError> {
        let conn = self.conn.lock().unwrap();

        // Bare columns next to MIN() come from the row holding the minimum.
        let mut stmt = conn
            .prepare(
                r#"
                SELECT m.title, m.type, m.imdb, t.url, t.size, t.quality, t.encoding, MIN(t.rating), t.seeders
                FROM search_items m
                JOIN torrents t ON t.title = m.title
                WHERE m.status IN ('Extracting', 'Scraped')
                AND m.title NOT IN (SELECT d.title FROM downloads d)
                GROUP BY m.title
                ORDER BY MIN(t.rating) ASC, m.title ASC
                "#,
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, i32>(7)?,
                    row.get::<_, u32>(8)?,
                ))
            })
            .map_err(db_err)?;

        let mut magnets = Vec::new();
        for row in rows {
            let (title, media_type, imdb, url, size, quality, encoding, rating, seeders) =
                row.map_err(db_err)?;

            let corrupt = |reason: String| RepositoryError::Corrupt {
                title: title.clone(),
                reason,
            };
            let quality = quality.parse().map_err(|e| corrupt(format!("{}", e)))?;
            let encoding = encoding.parse().map_err(|e| corrupt(format!("{}", e)))?;

            let item = Self::parse_item(title, &media_type, imdb)?;
            magnets.push(
                Magnet::new(item, url)
                    .with_quality(quality)
                    .with_encoding(encoding)
                    .with_size(size.max(0) as u64)
                    .with_rating(rating)
                    .with_seeders(seeders),
            );
        }

        Ok(magnets)
    }

    fn list(&self, limit: usize) -> Result<Vec<MediaRecord>, RepositoryError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT title, type, imdb, status, created_at, updated_at FROM search_items ORDER BY updated_at DESC LIMIT ?",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map(params![limit as i64], Self::row_to_raw)
            .map_err(db_err)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(Self::raw_to_record(row.map_err(db_err)?)?);
        }
        Ok(records)
    }
}
