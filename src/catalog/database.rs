//! SQLite-backed media catalog.

use std::path::Path;

use rusqlite::{params, params_from_iter, Connection, OpenFlags, Row};

use super::{Catalog, CatalogError, CatalogResult, Location, MediaRecord, RecordFilter, StreamCounts};

const SCHEMA_VERSION: i64 = 1;

const RECORD_COLUMNS: &str = "path, size, duration, title, artist, album, extractor_id, \
     uploader, audio_count, video_count, subtitle_count, time_modified, time_created, \
     time_deleted, sample_hash";

/// Media catalog stored in a single SQLite table.
pub struct SqliteCatalog {
    conn: Connection,
}

impl std::fmt::Debug for SqliteCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCatalog").finish_non_exhaustive()
    }
}

impl SqliteCatalog {
    /// Open (or create) a catalog database at `path`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the parent directory cannot be created or
    /// the database cannot be opened or migrated.
    pub fn open(path: &Path) -> CatalogResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CatalogError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        let catalog = Self { conn };
        catalog.configure_pragmas()?;
        catalog.migrate()?;
        log::debug!("Catalog opened: {}", path.display());
        Ok(catalog)
    }

    /// Open a throwaway in-memory catalog.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the schema cannot be created.
    pub fn open_in_memory() -> CatalogResult<Self> {
        let catalog = Self {
            conn: Connection::open_in_memory()?,
        };
        catalog.migrate()?;
        Ok(catalog)
    }

    fn configure_pragmas(&self) -> CatalogResult<()> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    fn migrate(&self) -> CatalogResult<()> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version > SCHEMA_VERSION {
            return Err(CatalogError::UnsupportedSchema(version));
        }

        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS media (
                path           TEXT PRIMARY KEY,
                size           INTEGER NOT NULL DEFAULT 0,
                duration       REAL,
                title          TEXT,
                artist         TEXT,
                album          TEXT,
                extractor_id   TEXT,
                uploader       TEXT,
                audio_count    INTEGER NOT NULL DEFAULT 0,
                video_count    INTEGER NOT NULL DEFAULT 0,
                subtitle_count INTEGER NOT NULL DEFAULT 0,
                time_modified  INTEGER NOT NULL DEFAULT 0,
                time_created   INTEGER NOT NULL DEFAULT 0,
                time_deleted   INTEGER NOT NULL DEFAULT 0,
                sample_hash    TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_media_size ON media(size);
            CREATE INDEX IF NOT EXISTS idx_media_time_deleted ON media(time_deleted);
            PRAGMA user_version = 1;",
        )?;
        Ok(())
    }

    /// Insert or replace a record. Used by ingestion tools and tests; the
    /// dedupe engine itself never calls this.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` on database failure.
    pub fn upsert_record(&self, record: &MediaRecord) -> CatalogResult<()> {
        self.conn.execute(
            &format!(
                "INSERT OR REPLACE INTO media ({RECORD_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
            ),
            params![
                record.path,
                record.size,
                record.duration,
                record.title,
                record.artist,
                record.album,
                record.extractor_id,
                record.uploader,
                record.streams.audio,
                record.streams.video,
                record.streams.subtitle,
                record.time_modified,
                record.time_created,
                record.time_deleted,
                record.sample_hash,
            ],
        )?;
        Ok(())
    }

    /// Fetch a single record by path, including deleted ones.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` on database failure.
    pub fn get(&self, path: &str) -> CatalogResult<Option<MediaRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {RECORD_COLUMNS} FROM media WHERE path = ?1"))?;
        let mut rows = stmt.query_map(params![path], record_from_row)?;
        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Number of records, including deleted ones.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` on database failure.
    pub fn len(&self) -> CatalogResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM media", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Whether the catalog holds no records.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` on database failure.
    pub fn is_empty(&self) -> CatalogResult<bool> {
        Ok(self.len()? == 0)
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<MediaRecord> {
    let path: String = row.get(0)?;
    Ok(MediaRecord {
        location: Location::classify(&path),
        path,
        size: row.get(1)?,
        duration: row.get(2)?,
        title: row.get(3)?,
        artist: row.get(4)?,
        album: row.get(5)?,
        extractor_id: row.get(6)?,
        uploader: row.get(7)?,
        streams: StreamCounts {
            audio: count_column(row.get(8)?),
            video: count_column(row.get(9)?),
            subtitle: count_column(row.get(10)?),
        },
        time_modified: row.get(11)?,
        time_created: row.get(12)?,
        time_deleted: row.get(13)?,
        sample_hash: row.get(14)?,
    })
}

/// Negative stream counts are treated as zero.
fn count_column(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

impl Catalog for SqliteCatalog {
    fn query(&self, filter: &RecordFilter) -> CatalogResult<Vec<MediaRecord>> {
        let (conditions, values) = filter.to_sql();
        let mut sql = format!("SELECT {RECORD_COLUMNS} FROM media WHERE {conditions} ORDER BY rowid");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(values), record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!("Catalog query returned {} records", records.len());
        Ok(records)
    }

    fn set_sample_hash(&self, path: &str, hash: &str) -> CatalogResult<()> {
        self.conn.execute(
            "INSERT INTO media (path, sample_hash) VALUES (?1, ?2)
             ON CONFLICT(path) DO UPDATE SET sample_hash = excluded.sample_hash",
            params![path, hash],
        )?;
        Ok(())
    }

    fn mark_deleted(&self, path: &str, time_deleted: i64) -> CatalogResult<()> {
        let changed = self.conn.execute(
            "UPDATE media SET time_deleted = ?2 WHERE path = ?1",
            params![path, time_deleted],
        )?;
        if changed == 0 {
            log::warn!("Catalog has no record to mark deleted: {}", path);
        }
        Ok(())
    }
}
