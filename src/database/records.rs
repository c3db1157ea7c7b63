//! Record writes: inserts, patch updates, bulk updates, deletes, cast and episode merges.
//!
//! Everything here takes a plain `&Connection` so callers can run it inside a
//! transaction (a `rusqlite::Transaction` derefs to `Connection`).

use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;

use super::models::{CastMember, MediaType, MetaKind, NewEpisode, SourceInfo};
use super::patch::{FieldValue, RecordPatch, RecordTable};
use super::reconcile::{self, ReconcileOutcome};
use super::now;
use crate::error::AppError;

pub fn record_table(media_type: MediaType) -> RecordTable {
    match media_type {
        MediaType::Movie => RecordTable::Movies,
        MediaType::Series => RecordTable::Series,
    }
}

fn check_table(patch: &RecordPatch, expected: RecordTable) -> Result<()> {
    if patch.table() != expected {
        return Err(AppError::Validation(format!(
            "Patch for {} cannot be applied to {}",
            patch.table().name(),
            expected.name()
        ))
        .into());
    }
    Ok(())
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

// ============================================================================
// Inserts
// ============================================================================

/// Create a skeletal movie or series with only a title.
pub fn insert_media(conn: &Connection, media_type: MediaType, title: &str) -> Result<i64> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".to_string()).into());
    }
    let ts = now();
    let sql = format!(
        "INSERT INTO {} (title, created_date, updated_date) VALUES (?, ?, ?)",
        media_type.table()
    );
    conn.execute(&sql, params![title, ts, ts])?;
    Ok(conn.last_insert_rowid())
}

pub fn series_exists(conn: &Connection, series_id: i64) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT id FROM tv_series WHERE id = ?", params![series_id], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

pub fn insert_episode(conn: &Connection, series_id: i64, episode: &NewEpisode) -> Result<i64> {
    if !series_exists(conn, series_id)? {
        return Err(AppError::NotFound(format!("series {}", series_id)).into());
    }
    if episode.season < 0 || episode.episode < 0 {
        return Err(AppError::Validation(format!(
            "Invalid episode number S{}E{}",
            episode.season, episode.episode
        ))
        .into());
    }
    let ts = now();
    conn.execute(
        "INSERT INTO tv_series_episodes
            (series_id, season, episode, title, plot, release_date, created_date, updated_date)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            series_id,
            episode.season,
            episode.episode,
            episode.title,
            episode.plot,
            episode.release_date,
            ts,
            ts
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

// ============================================================================
// Updates
// ============================================================================

/// Copy of `patch` with every referenced source, edition or quality name replaced
/// by its id. Unknown names are created.
pub fn resolve_references(conn: &Connection, patch: &RecordPatch) -> Result<RecordPatch> {
    let mut resolved = patch.clone();
    for (kind, name) in patch.references() {
        let id = reconcile::ensure_meta_value(conn, *kind, name)?;
        resolved.set(kind.reference_column(), id)?;
    }
    Ok(resolved)
}

/// Apply a patch to one row, stamping `updated_date`.
pub fn update_fields(conn: &Connection, patch: &RecordPatch, id: i64) -> Result<()> {
    let mut stamped = resolve_references(conn, patch)?;
    stamped.set("updated_date", FieldValue::Text(now()))?;
    let (assignments, mut values) = stamped.assignments();
    values.push(Value::Integer(id));

    let sql = format!(
        "UPDATE {} SET {} WHERE id = ?",
        patch.table().name(),
        assignments
    );
    log::debug!("UPDATE {} {}: {}", patch.table().name(), id, patch);
    let changed = conn.execute(&sql, params_from_iter(values))?;
    if changed == 0 {
        return Err(AppError::NotFound(format!("{} {}", patch.table().name(), id)).into());
    }
    Ok(())
}

pub fn update_source(conn: &Connection, media_type: MediaType, id: i64, source: &SourceInfo) -> Result<()> {
    let sql = format!(
        "UPDATE {} SET lookup_source = ?, source_url = ? WHERE id = ?",
        media_type.table()
    );
    conn.execute(&sql, params![source.lookup_source, source.source_url, id])?;
    Ok(())
}

/// A full save of one record: fields, lookup source, one episode and genre/language lists.
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub patch: RecordPatch,
    pub source_info: Option<SourceInfo>,
    /// Episode id and patch, series only.
    pub episode: Option<(i64, RecordPatch)>,
    pub genres: Option<Vec<String>>,
    pub languages: Option<Vec<String>>,
}

impl UpdateRequest {
    pub fn new(patch: RecordPatch) -> Self {
        Self {
            patch,
            source_info: None,
            episode: None,
            genres: None,
            languages: None,
        }
    }

    pub fn source(mut self, source: SourceInfo) -> Self {
        if !source.lookup_source.is_empty() || !source.source_url.is_empty() {
            self.source_info = Some(source);
        }
        self
    }

    pub fn episode(mut self, episode_id: i64, patch: RecordPatch) -> Self {
        self.episode = Some((episode_id, patch));
        self
    }

    pub fn genres(mut self, genres: Vec<String>) -> Self {
        self.genres = Some(genres);
        self
    }

    pub fn languages(mut self, languages: Vec<String>) -> Self {
        self.languages = Some(languages);
        self
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpdateOutcome {
    pub genres: ReconcileOutcome,
    pub languages: ReconcileOutcome,
}

pub fn update_record(
    conn: &Connection,
    media_type: MediaType,
    id: i64,
    request: &UpdateRequest,
) -> Result<UpdateOutcome> {
    check_table(&request.patch, record_table(media_type))?;
    update_fields(conn, &request.patch, id)?;

    if let Some(source) = &request.source_info {
        update_source(conn, media_type, id, source)?;
    }

    if let Some((episode_id, episode_patch)) = &request.episode {
        if media_type != MediaType::Series {
            return Err(AppError::Validation("Only series have episodes".to_string()).into());
        }
        check_table(episode_patch, RecordTable::Episodes)?;
        update_fields(conn, episode_patch, *episode_id)?;
    }

    Ok(UpdateOutcome {
        genres: reconcile::reconcile(conn, media_type, id, MetaKind::Genre, request.genres.as_deref())?,
        languages: reconcile::reconcile(
            conn,
            media_type,
            id,
            MetaKind::Language,
            request.languages.as_deref(),
        )?,
    })
}

// ============================================================================
// Bulk update
// ============================================================================

#[derive(Debug, Clone)]
pub struct BulkUpdate {
    pub ids: Vec<i64>,
    pub patch: RecordPatch,
    /// Genre to attach to every selected record.
    pub genre: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    pub updated: usize,
    pub genre_attached: usize,
}

/// One `UPDATE ... WHERE id IN (...)` covering every id, in input order.
pub fn build_bulk_statement(patch: &RecordPatch, ids: &[i64]) -> (String, Vec<Value>) {
    let (assignments, mut values) = patch.assignments();
    values.extend(ids.iter().map(|id| Value::Integer(*id)));
    let sql = format!(
        "UPDATE {} SET {} WHERE id IN ({})",
        patch.table().name(),
        assignments,
        placeholders(ids.len())
    );
    (sql, values)
}

pub fn bulk_update(conn: &Connection, media_type: MediaType, update: &BulkUpdate) -> Result<BulkOutcome> {
    if update.ids.is_empty() {
        return Err(AppError::Validation("No records selected".to_string()).into());
    }
    let genre = update.genre.as_deref().map(str::trim).filter(|g| !g.is_empty());
    if update.patch.is_empty() && genre.is_none() {
        return Err(AppError::Validation("Nothing to update".to_string()).into());
    }
    check_table(&update.patch, record_table(media_type))?;

    let mut stamped = resolve_references(conn, &update.patch)?;
    stamped.set("updated_date", FieldValue::Text(now()))?;
    let (sql, values) = build_bulk_statement(&stamped, &update.ids);
    log::info!(
        "Bulk update of {} {}(s): {}",
        update.ids.len(),
        media_type,
        update.patch
    );
    let updated = conn.execute(&sql, params_from_iter(values))?;

    let mut genre_attached = 0;
    if let Some(genre) = genre {
        for id in &update.ids {
            if reconcile::attach(conn, media_type, *id, MetaKind::Genre, genre)? {
                genre_attached += 1;
            }
        }
    }

    Ok(BulkOutcome {
        updated,
        genre_attached,
    })
}

// ============================================================================
// Episode watch state
// ============================================================================

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WatchOutcome {
    pub episodes: usize,
    pub series_updated: bool,
}

/// Set `watched` on episodes of one series, optionally mirroring it on the series itself.
pub fn set_episodes_watched(
    conn: &Connection,
    series_id: i64,
    episode_ids: &[i64],
    watched: bool,
    mark_series: bool,
) -> Result<WatchOutcome> {
    if !series_exists(conn, series_id)? {
        return Err(AppError::NotFound(format!("series {}", series_id)).into());
    }
    if episode_ids.is_empty() && !mark_series {
        return Err(AppError::Validation("No episodes selected".to_string()).into());
    }

    let ts = now();
    let mut episodes = 0;
    if !episode_ids.is_empty() {
        let sql = format!(
            "UPDATE tv_series_episodes SET watched = ?, updated_date = ?
             WHERE series_id = ? AND id IN ({})",
            placeholders(episode_ids.len())
        );
        let mut values = vec![
            Value::Integer(watched as i64),
            Value::Text(ts.clone()),
            Value::Integer(series_id),
        ];
        values.extend(episode_ids.iter().map(|id| Value::Integer(*id)));
        episodes = conn.execute(&sql, params_from_iter(values))?;
        if episodes != episode_ids.len() {
            return Err(AppError::NotFound(format!(
                "{} of {} episodes in series {}",
                episode_ids.len() - episodes,
                episode_ids.len(),
                series_id
            ))
            .into());
        }
    }

    if mark_series {
        conn.execute(
            "UPDATE tv_series SET watched = ?, updated_date = ? WHERE id = ?",
            params![watched, ts, series_id],
        )?;
    }

    Ok(WatchOutcome {
        episodes,
        series_updated: mark_series,
    })
}

// ============================================================================
// Deletes
// ============================================================================

/// Delete a movie or series with its cast, genre, language and (series) episode rows.
pub fn delete_media(conn: &Connection, media_type: MediaType, id: i64) -> Result<bool> {
    let owner = media_type.owner_column();
    let dependents: &[&str] = match media_type {
        MediaType::Movie => &["movie_cast", "movie_genres", "movie_languages"],
        MediaType::Series => &[
            "tv_series_cast",
            "tv_series_genres",
            "tv_series_languages",
            "tv_series_episodes",
        ],
    };
    for table in dependents {
        conn.execute(&format!("DELETE FROM {} WHERE {} = ?", table, owner), params![id])?;
    }
    let deleted = conn.execute(
        &format!("DELETE FROM {} WHERE id = ?", media_type.table()),
        params![id],
    )?;
    Ok(deleted > 0)
}

pub fn delete_episodes(conn: &Connection, ids: &[i64]) -> Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let sql = format!(
        "DELETE FROM tv_series_episodes WHERE id IN ({})",
        placeholders(ids.len())
    );
    Ok(conn.execute(&sql, params_from_iter(ids.iter()))?)
}

// ============================================================================
// Cast
// ============================================================================

/// Actor id for a cast member, matched by name or online id, created if unknown.
pub fn ensure_actor(conn: &Connection, member: &CastMember, source: Option<&SourceInfo>) -> Result<i64> {
    let name = member.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Actor name is required".to_string()).into());
    }
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM actors
             WHERE name = ?1 OR (?2 IS NOT NULL AND online_id = ?2)
             ORDER BY (online_id = ?2) DESC, id
             LIMIT 1",
            params![name, member.online_id],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }

    conn.execute(
        "INSERT INTO actors (name, online_id, lookup_source, source_url, created_date)
         VALUES (?, ?, ?, ?, ?)",
        params![
            name,
            member.online_id,
            source.map(|s| s.lookup_source.as_str()),
            source.map(|s| s.source_url.as_str()),
            now()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Replace every cast row of a record with `cast`. Returns the number of rows written.
pub fn replace_cast(
    conn: &Connection,
    media_type: MediaType,
    id: i64,
    cast: &[CastMember],
    source: Option<&SourceInfo>,
) -> Result<usize> {
    let table = media_type.cast_table();
    let owner = media_type.owner_column();
    conn.execute(&format!("DELETE FROM {} WHERE {} = ?", table, owner), params![id])?;

    let ts = now();
    for member in cast {
        let actor_id = ensure_actor(conn, member, source)?;
        match media_type {
            MediaType::Movie => conn.execute(
                "INSERT INTO movie_cast (movie_id, actor_id, character, created_date)
                 VALUES (?, ?, ?, ?)",
                params![id, actor_id, member.character, ts],
            )?,
            MediaType::Series => conn.execute(
                "INSERT INTO tv_series_cast (series_id, actor_id, character, episodes, created_date)
                 VALUES (?, ?, ?, ?, ?)",
                params![id, actor_id, member.character, member.episodes, ts],
            )?,
        };
    }
    Ok(cast.len())
}

// ============================================================================
// Episode merge
// ============================================================================

/// Fetched episodes split into those to insert and those matching a local episode id.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EpisodePlan {
    pub inserts: Vec<NewEpisode>,
    pub updates: Vec<(i64, NewEpisode)>,
}

/// Left-join fetched episodes against local `(id, season, episode)` keys.
pub fn classify_episodes(existing: &[(i64, i64, i64)], fetched: &[NewEpisode]) -> EpisodePlan {
    let local: HashMap<(i64, i64), i64> = existing
        .iter()
        .map(|(id, season, episode)| ((*season, *episode), *id))
        .collect();

    let mut plan = EpisodePlan::default();
    let mut seen = std::collections::HashSet::new();
    for ep in fetched {
        if !seen.insert((ep.season, ep.episode)) {
            continue;
        }
        match local.get(&(ep.season, ep.episode)) {
            Some(id) => plan.updates.push((*id, ep.clone())),
            None => plan.inserts.push(ep.clone()),
        }
    }
    plan
}

pub fn episode_keys(conn: &Connection, series_id: i64) -> Result<Vec<(i64, i64, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT id, season, episode FROM tv_series_episodes WHERE series_id = ? ORDER BY season, episode",
    )?;
    let rows = stmt.query_map(params![series_id], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EpisodeMergeOutcome {
    pub inserted: usize,
    pub updated: usize,
}

/// Insert new episodes and refresh title, plot and release date of existing ones.
pub fn merge_episodes(conn: &Connection, series_id: i64, fetched: &[NewEpisode]) -> Result<EpisodeMergeOutcome> {
    let existing = episode_keys(conn, series_id)?;
    let plan = classify_episodes(&existing, fetched);

    for ep in &plan.inserts {
        insert_episode(conn, series_id, ep)?;
    }
    let ts = now();
    for (id, ep) in &plan.updates {
        conn.execute(
            "UPDATE tv_series_episodes
             SET title = ?, plot = ?, release_date = ?, updated_date = ?
             WHERE id = ?",
            params![ep.title, ep.plot, ep.release_date, ts, id],
        )?;
    }

    Ok(EpisodeMergeOutcome {
        inserted: plan.inserts.len(),
        updated: plan.updates.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(season: i64, episode: i64) -> NewEpisode {
        NewEpisode {
            season,
            episode,
            title: Some(format!("S{}E{}", season, episode)),
            plot: None,
            release_date: None,
        }
    }

    #[test]
    fn bulk_statement_lists_every_id_in_order() {
        let mut patch = RecordPatch::new(RecordTable::Movies);
        patch.set("watched", true).unwrap();
        let (sql, values) = build_bulk_statement(&patch, &[9, 2, 5]);
        assert_eq!(sql, "UPDATE movies SET watched = ? WHERE id IN (?, ?, ?)");
        assert_eq!(
            values,
            vec![
                Value::Integer(1),
                Value::Integer(9),
                Value::Integer(2),
                Value::Integer(5)
            ]
        );
    }

    #[test]
    fn classify_matches_on_season_and_episode() {
        let existing = vec![(10, 1, 1), (11, 1, 2)];
        let plan = classify_episodes(&existing, &[ep(1, 1), ep(1, 2), ep(1, 3)]);
        assert_eq!(plan.inserts, vec![ep(1, 3)]);
        assert_eq!(plan.updates.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![10, 11]);
    }

    #[test]
    fn classify_ignores_repeated_fetched_keys() {
        let plan = classify_episodes(&[], &[ep(2, 1), ep(2, 1)]);
        assert_eq!(plan.inserts.len(), 1);
    }
}
