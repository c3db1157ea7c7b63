pub mod filters;
pub mod meta;
pub mod models;
pub mod patch;
pub mod reconcile;
pub mod records;

#[cfg(test)]
mod tests;

use anyhow::{anyhow, Result};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

pub use filters::{CompiledFilter, FilterCriterion, MediaFilters};
pub use models::*;
pub use patch::{ColumnKind, FieldValue, RecordPatch, RecordTable};
pub use reconcile::{MetaDiff, ReconcileOutcome};
pub use records::{
    BulkOutcome, BulkUpdate, EpisodeMergeOutcome, EpisodePlan, UpdateOutcome, UpdateRequest,
    WatchOutcome,
};

use crate::error::AppError;

/// Timestamp format stored in created/updated columns.
pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn flag(row: &Row, idx: usize) -> rusqlite::Result<bool> {
    Ok(row.get::<_, Option<i64>>(idx)?.unwrap_or(0) == 1)
}

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

/// Result of adding many titles at once.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct BulkAddReport {
    pub added: Vec<(String, i64)>,
    pub failed: Vec<(String, String)>,
}

impl Database {
    pub fn new(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        // Enable WAL mode for concurrent reads
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
            PRAGMA temp_store=MEMORY;
        ",
        )?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        // Initialize schema
        db.init_schema()?;

        Ok(db)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }

    /// Run `f` inside one transaction; any error rolls every statement back.
    pub fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS genres (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_date TEXT
            );
            CREATE TABLE IF NOT EXISTS languages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_date TEXT
            );
            CREATE TABLE IF NOT EXISTS media_sources (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_date TEXT
            );
            CREATE TABLE IF NOT EXISTS media_editions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_date TEXT
            );
            CREATE TABLE IF NOT EXISTS media_qualities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_date TEXT
            );

            CREATE TABLE IF NOT EXISTS movies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                original_title TEXT,
                year INTEGER,
                runtime INTEGER,
                country TEXT,
                watched INTEGER NOT NULL DEFAULT 0,
                rating REAL,
                online_rating REAL,
                certification TEXT,
                release_date TEXT,
                tagline TEXT,
                plot TEXT,
                notes TEXT,
                director TEXT,
                writer TEXT,
                source_id INTEGER REFERENCES media_sources(id),
                quality_id INTEGER REFERENCES media_qualities(id),
                edition_id INTEGER REFERENCES media_editions(id),
                video_codec TEXT,
                audio_codec TEXT,
                size TEXT,
                disc_count INTEGER,
                to_burn INTEGER NOT NULL DEFAULT 0,
                backup_disc TEXT,
                tag TEXT,
                lookup_source TEXT,
                source_url TEXT,
                poster_url TEXT,
                online_id TEXT,
                created_date TEXT NOT NULL DEFAULT (datetime('now')),
                updated_date TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_movies_title ON movies(title);
            CREATE INDEX IF NOT EXISTS idx_movies_disc ON movies(backup_disc);

            CREATE TABLE IF NOT EXISTS tv_series (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                original_title TEXT,
                year INTEGER,
                seasons INTEGER,
                country TEXT,
                watched INTEGER NOT NULL DEFAULT 0,
                rating REAL,
                online_rating REAL,
                certification TEXT,
                release_date TEXT,
                tagline TEXT,
                plot TEXT,
                notes TEXT,
                director TEXT,
                writer TEXT,
                source_id INTEGER REFERENCES media_sources(id),
                size TEXT,
                to_burn INTEGER NOT NULL DEFAULT 0,
                backup_disc TEXT,
                tag TEXT,
                lookup_source TEXT,
                source_url TEXT,
                poster_url TEXT,
                online_id TEXT,
                created_date TEXT NOT NULL DEFAULT (datetime('now')),
                updated_date TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_series_title ON tv_series(title);

            CREATE TABLE IF NOT EXISTS tv_series_episodes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                series_id INTEGER NOT NULL REFERENCES tv_series(id),
                season INTEGER NOT NULL,
                episode INTEGER NOT NULL,
                title TEXT,
                plot TEXT,
                release_date TEXT,
                watched INTEGER NOT NULL DEFAULT 0,
                to_burn INTEGER NOT NULL DEFAULT 0,
                backup_disc TEXT,
                tag TEXT,
                size TEXT,
                quality_id INTEGER REFERENCES media_qualities(id),
                created_date TEXT NOT NULL DEFAULT (datetime('now')),
                updated_date TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_episodes_series
                ON tv_series_episodes(series_id, season, episode);

            -- Junctions carry a created timestamp; one row per pair
            CREATE TABLE IF NOT EXISTS movie_genres (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                movie_id INTEGER NOT NULL REFERENCES movies(id),
                genre_id INTEGER NOT NULL REFERENCES genres(id),
                created_date TEXT,
                UNIQUE(movie_id, genre_id)
            );
            CREATE TABLE IF NOT EXISTS movie_languages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                movie_id INTEGER NOT NULL REFERENCES movies(id),
                language_id INTEGER NOT NULL REFERENCES languages(id),
                created_date TEXT,
                UNIQUE(movie_id, language_id)
            );
            CREATE TABLE IF NOT EXISTS tv_series_genres (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                series_id INTEGER NOT NULL REFERENCES tv_series(id),
                genre_id INTEGER NOT NULL REFERENCES genres(id),
                created_date TEXT,
                UNIQUE(series_id, genre_id)
            );
            CREATE TABLE IF NOT EXISTS tv_series_languages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                series_id INTEGER NOT NULL REFERENCES tv_series(id),
                language_id INTEGER NOT NULL REFERENCES languages(id),
                created_date TEXT,
                UNIQUE(series_id, language_id)
            );

            CREATE TABLE IF NOT EXISTS actors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                online_id TEXT,
                lookup_source TEXT,
                source_url TEXT,
                created_date TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_actors_name ON actors(name);

            CREATE TABLE IF NOT EXISTS movie_cast (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                movie_id INTEGER NOT NULL REFERENCES movies(id),
                actor_id INTEGER NOT NULL REFERENCES actors(id),
                character TEXT,
                created_date TEXT
            );
            CREATE TABLE IF NOT EXISTS tv_series_cast (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                series_id INTEGER NOT NULL REFERENCES tv_series(id),
                actor_id INTEGER NOT NULL REFERENCES actors(id),
                character TEXT,
                episodes TEXT,
                created_date TEXT
            );

            -- App settings (key/value)
            CREATE TABLE IF NOT EXISTS app_settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT
            );
            "#,
        )?;

        // Migration: catalogs created before value tables carried created_date
        for kind in MetaKind::ALL {
            let _ = conn.execute(
                &format!("ALTER TABLE {} ADD COLUMN created_date TEXT", kind.table()),
                [],
            ); // Ignore error if column already exists
        }

        log::info!("Database schema initialized");
        Ok(())
    }

    // =========================================================================
    // Listing
    // =========================================================================

    pub fn get_media_count(&self, media_type: MediaType) -> Result<i64> {
        let conn = self.lock()?;
        let count = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", media_type.table()),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Filtered list rows ordered by title, plus the unfiltered total for the type.
    pub fn get_media(
        &self,
        media_type: MediaType,
        filters: &MediaFilters,
    ) -> Result<(Vec<MediaSummary>, i64)> {
        let CompiledFilter { clause, params } = filters.compile(media_type)?;
        let total = self.get_media_count(media_type)?;

        let sql = match media_type {
            MediaType::Movie => format!(
                "SELECT m.id, m.title, m.year, m.watched, m.to_burn, m.rating, m.size,
                        NULL, m.created_date
                 FROM movies m
                 {}
                 ORDER BY m.title COLLATE NOCASE",
                clause
            ),
            MediaType::Series => format!(
                "SELECT t.id, t.title, t.year, t.watched,
                        EXISTS (SELECT 1 FROM tv_series_episodes e
                                WHERE e.series_id = t.id AND e.to_burn = 1),
                        t.rating, t.size, t.seasons, t.created_date
                 FROM tv_series t
                 {}
                 ORDER BY t.title COLLATE NOCASE",
                clause
            ),
        };

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params), |row| {
            Ok(MediaSummary {
                id: row.get(0)?,
                title: row.get(1)?,
                year: row.get(2)?,
                watched: flag(row, 3)?,
                to_burn: flag(row, 4)?,
                rating: row.get(5)?,
                size: row.get(6)?,
                seasons: row.get(7)?,
                created_date: row.get(8)?,
            })
        })?;
        let media = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok((media, total))
    }

    /// Distinct non-empty backup disc labels for a media type (series include episode discs).
    pub fn get_discs(&self, media_type: MediaType) -> Result<Vec<String>> {
        let sql = match media_type {
            MediaType::Movie => {
                "SELECT DISTINCT backup_disc FROM movies
                 WHERE backup_disc IS NOT NULL AND backup_disc != ''
                 ORDER BY backup_disc"
            }
            MediaType::Series => {
                "SELECT backup_disc FROM tv_series
                 WHERE backup_disc IS NOT NULL AND backup_disc != ''
                 UNION
                 SELECT backup_disc FROM tv_series_episodes
                 WHERE backup_disc IS NOT NULL AND backup_disc != ''
                 ORDER BY 1"
            }
        };
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    // =========================================================================
    // Details
    // =========================================================================

    pub fn get_movie(&self, id: i64) -> Result<Option<Movie>> {
        let conn = self.lock()?;
        let movie = conn
            .query_row(
                "SELECT m.id, m.title, m.original_title, m.year, m.runtime, m.country, m.watched,
                        m.rating, m.online_rating, m.certification, m.release_date, m.tagline,
                        m.plot, m.notes, m.director, m.writer, s.name, q.name, e.name,
                        m.video_codec, m.audio_codec, m.size, m.disc_count, m.to_burn,
                        m.backup_disc, m.tag, m.lookup_source, m.source_url, m.poster_url,
                        m.online_id, m.created_date, m.updated_date
                 FROM movies m
                    LEFT JOIN media_sources s ON s.id = m.source_id
                    LEFT JOIN media_qualities q ON q.id = m.quality_id
                    LEFT JOIN media_editions e ON e.id = m.edition_id
                 WHERE m.id = ?",
                params![id],
                |row| {
                    Ok(Movie {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        original_title: row.get(2)?,
                        year: row.get(3)?,
                        runtime: row.get(4)?,
                        country: row.get(5)?,
                        watched: flag(row, 6)?,
                        rating: row.get(7)?,
                        online_rating: row.get(8)?,
                        certification: row.get(9)?,
                        release_date: row.get(10)?,
                        tagline: row.get(11)?,
                        plot: row.get(12)?,
                        notes: row.get(13)?,
                        director: row.get(14)?,
                        writer: row.get(15)?,
                        source: row.get(16)?,
                        quality: row.get(17)?,
                        edition: row.get(18)?,
                        video_codec: row.get(19)?,
                        audio_codec: row.get(20)?,
                        size: row.get(21)?,
                        disc_count: row.get(22)?,
                        to_burn: flag(row, 23)?,
                        backup_disc: row.get(24)?,
                        tag: row.get(25)?,
                        lookup_source: row.get(26)?,
                        source_url: row.get(27)?,
                        poster_url: row.get(28)?,
                        online_id: row.get(29)?,
                        created_date: row.get(30)?,
                        updated_date: row.get(31)?,
                    })
                },
            )
            .optional()?;
        Ok(movie)
    }

    pub fn get_series(&self, id: i64) -> Result<Option<Series>> {
        let conn = self.lock()?;
        let series = conn
            .query_row(
                "SELECT t.id, t.title, t.original_title, t.year, t.seasons, t.country, t.watched,
                        t.rating, t.online_rating, t.certification, t.release_date, t.tagline,
                        t.plot, t.notes, t.director, t.writer, s.name, t.size, t.to_burn,
                        t.backup_disc, t.tag, t.lookup_source, t.source_url, t.poster_url,
                        t.online_id, t.created_date, t.updated_date
                 FROM tv_series t
                    LEFT JOIN media_sources s ON s.id = t.source_id
                 WHERE t.id = ?",
                params![id],
                |row| {
                    Ok(Series {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        original_title: row.get(2)?,
                        year: row.get(3)?,
                        seasons: row.get(4)?,
                        country: row.get(5)?,
                        watched: flag(row, 6)?,
                        rating: row.get(7)?,
                        online_rating: row.get(8)?,
                        certification: row.get(9)?,
                        release_date: row.get(10)?,
                        tagline: row.get(11)?,
                        plot: row.get(12)?,
                        notes: row.get(13)?,
                        director: row.get(14)?,
                        writer: row.get(15)?,
                        source: row.get(16)?,
                        size: row.get(17)?,
                        to_burn: flag(row, 18)?,
                        backup_disc: row.get(19)?,
                        tag: row.get(20)?,
                        lookup_source: row.get(21)?,
                        source_url: row.get(22)?,
                        poster_url: row.get(23)?,
                        online_id: row.get(24)?,
                        created_date: row.get(25)?,
                        updated_date: row.get(26)?,
                    })
                },
            )
            .optional()?;
        Ok(series)
    }

    /// Genre or language names associated with a record.
    pub fn get_record_meta(&self, media_type: MediaType, id: i64, kind: MetaKind) -> Result<Vec<String>> {
        let junction = reconcile::Junction::new(media_type, kind)?;
        let conn = self.lock()?;
        reconcile::current_values(&conn, junction, id)
    }

    pub fn get_cast(&self, media_type: MediaType, id: i64) -> Result<Vec<CastEntry>> {
        let episodes_col = match media_type {
            MediaType::Movie => "NULL",
            MediaType::Series => "c.episodes",
        };
        let sql = format!(
            "SELECT c.id, a.id, a.name, c.character, {}
             FROM {} c
                INNER JOIN actors a ON a.id = c.actor_id
             WHERE c.{} = ?
             ORDER BY c.id",
            episodes_col,
            media_type.cast_table(),
            media_type.owner_column()
        );
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![id], |row| {
            Ok(CastEntry {
                id: row.get(0)?,
                actor_id: row.get(1)?,
                name: row.get(2)?,
                character: row.get(3)?,
                episodes: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Titles of other movies stored on the same backup disc.
    pub fn get_others_on_disc(&self, movie_id: i64) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT title FROM movies
             WHERE backup_disc = (SELECT backup_disc FROM movies WHERE id = ?1)
               AND backup_disc IS NOT NULL AND backup_disc != ''
               AND id != ?1
             ORDER BY title COLLATE NOCASE",
        )?;
        let rows = stmt.query_map(params![movie_id], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn get_movie_details(&self, id: i64) -> Result<MovieDetails> {
        let movie = self
            .get_movie(id)?
            .ok_or_else(|| AppError::NotFound(format!("movie {}", id)))?;
        Ok(MovieDetails {
            movie,
            genres: self.get_record_meta(MediaType::Movie, id, MetaKind::Genre)?,
            languages: self.get_record_meta(MediaType::Movie, id, MetaKind::Language)?,
            cast: self.get_cast(MediaType::Movie, id)?,
            others: self.get_others_on_disc(id)?,
        })
    }

    pub fn get_series_details(&self, id: i64) -> Result<SeriesDetails> {
        let series = self
            .get_series(id)?
            .ok_or_else(|| AppError::NotFound(format!("series {}", id)))?;
        Ok(SeriesDetails {
            series,
            episodes: self.get_series_episodes(id, None)?,
            genres: self.get_record_meta(MediaType::Series, id, MetaKind::Genre)?,
            languages: self.get_record_meta(MediaType::Series, id, MetaKind::Language)?,
            cast: self.get_cast(MediaType::Series, id)?,
        })
    }

    /// Episodes of a series, optionally limited to one season.
    pub fn get_series_episodes(&self, series_id: i64, season: Option<i64>) -> Result<Vec<EpisodeSummary>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, season, episode, title, watched, backup_disc, size
             FROM tv_series_episodes
             WHERE series_id = ?1 AND (?2 IS NULL OR season = ?2)
             ORDER BY season, episode",
        )?;
        let rows = stmt.query_map(params![series_id, season], |row| {
            Ok(EpisodeSummary {
                id: row.get(0)?,
                season: row.get(1)?,
                episode: row.get(2)?,
                title: row.get(3)?,
                watched: flag(row, 4)?,
                backup_disc: row.get(5)?,
                size: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn get_episode(&self, id: i64) -> Result<Option<Episode>> {
        let conn = self.lock()?;
        let episode = conn
            .query_row(
                "SELECT e.id, e.series_id, e.season, e.episode, e.title, e.plot, e.release_date,
                        e.watched, e.to_burn, e.backup_disc, e.tag, e.size, q.name
                 FROM tv_series_episodes e
                    LEFT JOIN media_qualities q ON q.id = e.quality_id
                 WHERE e.id = ?",
                params![id],
                |row| {
                    Ok(Episode {
                        id: row.get(0)?,
                        series_id: row.get(1)?,
                        season: row.get(2)?,
                        episode: row.get(3)?,
                        title: row.get(4)?,
                        plot: row.get(5)?,
                        release_date: row.get(6)?,
                        watched: flag(row, 7)?,
                        to_burn: flag(row, 8)?,
                        backup_disc: row.get(9)?,
                        tag: row.get(10)?,
                        size: row.get(11)?,
                        quality: row.get(12)?,
                    })
                },
            )
            .optional()?;
        Ok(episode)
    }

    pub fn get_episode_details(&self, id: i64) -> Result<Episode> {
        Ok(self
            .get_episode(id)?
            .ok_or_else(|| AppError::NotFound(format!("episode {}", id)))?)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    pub fn add_new_media(&self, media_type: MediaType, title: &str) -> Result<i64> {
        let conn = self.lock()?;
        let id = records::insert_media(&conn, media_type, title)?;
        log::info!("Added {} '{}' with id {}", media_type, title.trim(), id);
        Ok(id)
    }

    /// Add one record per non-blank title; failures are reported, not fatal.
    pub fn add_new_titles(&self, media_type: MediaType, titles: &[String]) -> Result<BulkAddReport> {
        let conn = self.lock()?;
        let mut report = BulkAddReport::default();
        for title in titles.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            match records::insert_media(&conn, media_type, title) {
                Ok(id) => report.added.push((title.to_string(), id)),
                Err(e) => {
                    log::warn!("Failed to add {} '{}': {}", media_type, title, e);
                    report.failed.push((title.to_string(), e.to_string()));
                }
            }
        }
        Ok(report)
    }

    pub fn add_new_episode(&self, series_id: i64, episode: &NewEpisode) -> Result<i64> {
        let conn = self.lock()?;
        records::insert_episode(&conn, series_id, episode)
    }

    pub fn update_record(&self, media_type: MediaType, id: i64, request: &UpdateRequest) -> Result<UpdateOutcome> {
        self.with_transaction(|conn| records::update_record(conn, media_type, id, request))
    }

    pub fn update_episode(&self, episode_id: i64, patch: &RecordPatch) -> Result<()> {
        if patch.table() != RecordTable::Episodes {
            return Err(AppError::Validation("Expected an episode patch".to_string()).into());
        }
        self.with_transaction(|conn| records::update_fields(conn, patch, episode_id))
    }

    /// Mark episodes of a series watched or unwatched in one transaction.
    pub fn set_episodes_watched(
        &self,
        series_id: i64,
        episode_ids: &[i64],
        watched: bool,
        mark_series: bool,
    ) -> Result<WatchOutcome> {
        let outcome = self.with_transaction(|conn| {
            records::set_episodes_watched(conn, series_id, episode_ids, watched, mark_series)
        })?;
        log::info!(
            "Marked {} episode(s) of series {} as {}",
            outcome.episodes,
            series_id,
            if watched { "watched" } else { "unwatched" }
        );
        Ok(outcome)
    }

    pub fn bulk_update(&self, media_type: MediaType, update: &BulkUpdate) -> Result<BulkOutcome> {
        self.with_transaction(|conn| records::bulk_update(conn, media_type, update))
    }

    pub fn reconcile_meta(
        &self,
        media_type: MediaType,
        id: i64,
        kind: MetaKind,
        desired: Option<Vec<String>>,
    ) -> Result<ReconcileOutcome> {
        self.with_transaction(|conn| {
            reconcile::reconcile(conn, media_type, id, kind, desired.as_deref())
        })
    }

    pub fn replace_cast(
        &self,
        media_type: MediaType,
        id: i64,
        cast: &[CastMember],
        source: Option<&SourceInfo>,
    ) -> Result<usize> {
        self.with_transaction(|conn| records::replace_cast(conn, media_type, id, cast, source))
    }

    pub fn merge_episodes(&self, series_id: i64, fetched: &[NewEpisode]) -> Result<EpisodeMergeOutcome> {
        self.with_transaction(|conn| records::merge_episodes(conn, series_id, fetched))
    }

    pub fn delete_media(&self, media_type: MediaType, id: i64) -> Result<bool> {
        let deleted = self.with_transaction(|conn| records::delete_media(conn, media_type, id))?;
        if deleted {
            log::info!("Deleted {} {}", media_type, id);
        }
        Ok(deleted)
    }

    pub fn delete_episodes(&self, ids: &[i64]) -> Result<usize> {
        self.with_transaction(|conn| records::delete_episodes(conn, ids))
    }

    // =========================================================================
    // Metadata values
    // =========================================================================

    pub fn get_meta_values(&self, kind: MetaKind) -> Result<Vec<MetaValue>> {
        let conn = self.lock()?;
        meta::list_meta_values(&conn, kind)
    }

    pub fn add_meta_value(&self, kind: MetaKind, name: &str) -> Result<i64> {
        let conn = self.lock()?;
        reconcile::ensure_meta_value(&conn, kind, name)
    }

    pub fn remove_meta_value(&self, kind: MetaKind, name: &str) -> Result<bool> {
        self.with_transaction(|conn| meta::remove_meta_value(conn, kind, name))
    }

    pub fn sync_meta_values(&self, kind: MetaKind, desired: &[String]) -> Result<MetaDiff> {
        self.with_transaction(|conn| meta::sync_meta_values(conn, kind, desired))
    }

    pub fn get_actors(&self) -> Result<Vec<Actor>> {
        let conn = self.lock()?;
        meta::list_actors(&conn)
    }

    // =========================================================================
    // Export
    // =========================================================================

    pub fn export_movies(&self) -> Result<Vec<MovieExportRow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT m.id, m.title, m.original_title, m.year, m.runtime, m.country, m.watched,
                    m.online_rating, m.rating, m.certification, m.release_date, m.tagline,
                    m.plot, m.notes, m.director, m.writer, s.name, q.name, e.name,
                    m.video_codec, m.audio_codec, m.size, m.disc_count, m.to_burn,
                    m.backup_disc, m.tag, m.lookup_source, m.source_url, m.poster_url,
                    (SELECT GROUP_CONCAT(g.name, ', ') FROM movie_genres mg
                        JOIN genres g ON g.id = mg.genre_id WHERE mg.movie_id = m.id),
                    (SELECT GROUP_CONCAT(l.name, ', ') FROM movie_languages ml
                        JOIN languages l ON l.id = ml.language_id WHERE ml.movie_id = m.id)
             FROM movies m
                LEFT JOIN media_sources s ON s.id = m.source_id
                LEFT JOIN media_qualities q ON q.id = m.quality_id
                LEFT JOIN media_editions e ON e.id = m.edition_id
             ORDER BY m.title COLLATE NOCASE",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(MovieExportRow {
                id: row.get(0)?,
                title: row.get(1)?,
                original_title: row.get(2)?,
                year: row.get(3)?,
                runtime: row.get(4)?,
                country: row.get(5)?,
                watched: flag(row, 6)?,
                online_rating: row.get(7)?,
                rating: row.get(8)?,
                certification: row.get(9)?,
                release_date: row.get(10)?,
                tagline: row.get(11)?,
                plot: row.get(12)?,
                notes: row.get(13)?,
                director: row.get(14)?,
                writer: row.get(15)?,
                source: row.get(16)?,
                quality: row.get(17)?,
                edition: row.get(18)?,
                video_codec: row.get(19)?,
                audio_codec: row.get(20)?,
                size: row.get(21)?,
                disc_count: row.get(22)?,
                to_burn: flag(row, 23)?,
                backup_disc: row.get(24)?,
                tag: row.get(25)?,
                lookup_source: row.get(26)?,
                source_url: row.get(27)?,
                poster_url: row.get(28)?,
                genres: row.get(29)?,
                languages: row.get(30)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// One row per episode; series without episodes produce one row with empty episode columns.
    pub fn export_series(&self) -> Result<Vec<SeriesExportRow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT t.id, t.title, t.original_title, t.year, t.seasons, t.country, t.watched,
                    t.online_rating, t.rating, t.release_date, t.certification, t.tagline,
                    t.plot, t.notes, t.lookup_source, t.source_url, t.poster_url,
                    e.season, e.episode, e.title, e.plot, e.watched, q.name, e.to_burn,
                    e.backup_disc, e.tag, e.size,
                    (SELECT GROUP_CONCAT(g.name, ', ') FROM tv_series_genres sg
                        JOIN genres g ON g.id = sg.genre_id WHERE sg.series_id = t.id),
                    (SELECT GROUP_CONCAT(l.name, ', ') FROM tv_series_languages sl
                        JOIN languages l ON l.id = sl.language_id WHERE sl.series_id = t.id)
             FROM tv_series t
                LEFT JOIN tv_series_episodes e ON e.series_id = t.id
                LEFT JOIN media_qualities q ON q.id = e.quality_id
             ORDER BY t.title COLLATE NOCASE, t.id, e.season, e.episode",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SeriesExportRow {
                id: row.get(0)?,
                title: row.get(1)?,
                original_title: row.get(2)?,
                year: row.get(3)?,
                seasons: row.get(4)?,
                country: row.get(5)?,
                watched: flag(row, 6)?,
                online_rating: row.get(7)?,
                rating: row.get(8)?,
                release_date: row.get(9)?,
                certification: row.get(10)?,
                tagline: row.get(11)?,
                plot: row.get(12)?,
                notes: row.get(13)?,
                lookup_source: row.get(14)?,
                source_url: row.get(15)?,
                poster_url: row.get(16)?,
                episode_season: row.get(17)?,
                episode: row.get(18)?,
                episode_title: row.get(19)?,
                episode_plot: row.get(20)?,
                episode_watched: row.get::<_, Option<i64>>(21)?.map(|v| v == 1),
                episode_quality: row.get(22)?,
                episode_to_burn: row.get::<_, Option<i64>>(23)?.map(|v| v == 1),
                episode_backup_disc: row.get(24)?,
                episode_tag: row.get(25)?,
                episode_size: row.get(26)?,
                genres: row.get(27)?,
                languages: row.get(28)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            "SELECT value FROM app_settings WHERE key = ?",
            params![key],
            |row| row.get(0),
        );
        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO app_settings (key, value, updated_at) VALUES (?, ?, ?)",
            params![key, value, now()],
        )?;
        Ok(())
    }

    pub fn get_all_settings(&self) -> Result<std::collections::HashMap<String, String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT key, value FROM app_settings")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut settings = std::collections::HashMap::new();
        for row in rows {
            let (key, value) = row?;
            settings.insert(key, value);
        }
        Ok(settings)
    }
}
