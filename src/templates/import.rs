//! Importers read rows from a file and save them as new catalog records.
//!
//! A column map translates source column names to catalog columns. Besides
//! the plain table columns it understands `genres` and `languages` (comma
//! lists), `source`, `edition` and `quality` (names resolved to ids, created
//! on demand) and, for series, `EPISODE_*` columns that describe one episode
//! per row. Consecutive rows with the same series title belong to one series.

use rusqlite::types::Value;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use crate::database::{
    records, reconcile, Database, MediaType, MetaKind, NewEpisode, RecordPatch, RecordTable,
};
use crate::error::AppError;

/// One source row keyed by source column name.
pub type SourceRow = HashMap<String, String>;

/// Source column name to catalog column name. Empty means "same names".
pub type ColumnMap = HashMap<String, String>;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub records: usize,
    pub episodes: usize,
    pub skipped: usize,
}

pub trait Importer: Send + Sync {
    fn name(&self) -> &str;

    fn read_rows(&self, path: &Path) -> Result<Vec<SourceRow>, AppError>;

    fn import_media(
        &self,
        db: &Database,
        media_type: MediaType,
        path: &Path,
        column_map: &ColumnMap,
    ) -> Result<ImportReport, AppError> {
        let rows = self.read_rows(path)?;
        log::info!("{}: read {} rows from {:?}", self.name(), rows.len(), path);
        import_rows(db, media_type, &rows, column_map)
    }
}

pub struct CsvImporter {
    name: String,
}

impl CsvImporter {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}

impl Importer for CsvImporter {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_rows(&self, path: &Path) -> Result<Vec<SourceRow>, AppError> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(
                headers
                    .iter()
                    .zip(record.iter())
                    .map(|(h, v)| (h.to_string(), v.to_string()))
                    .collect(),
            );
        }
        Ok(rows)
    }
}

pub struct JsonImporter {
    name: String,
}

impl JsonImporter {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}

impl Importer for JsonImporter {
    fn name(&self) -> &str {
        &self.name
    }

    /// Expects an array of flat objects.
    fn read_rows(&self, path: &Path) -> Result<Vec<SourceRow>, AppError> {
        let content = std::fs::read_to_string(path)?;
        let objects: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_str(&content)?;
        Ok(objects
            .into_iter()
            .map(|object| {
                object
                    .into_iter()
                    .map(|(key, value)| {
                        let raw = match value {
                            serde_json::Value::Null => String::new(),
                            serde_json::Value::String(s) => s,
                            other => other.to_string(),
                        };
                        (key, raw)
                    })
                    .collect()
            })
            .collect())
    }
}

/// Where a mapped column ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Skip,
    Title,
    Field(&'static str),
    Reference(MetaKind),
    List(MetaKind),
    EpisodeField(&'static str),
    EpisodeReference(MetaKind),
}

fn resolve_target(media_type: MediaType, column: &str) -> Result<Target, AppError> {
    let column = column.trim().to_ascii_lowercase();
    let table = records::record_table(media_type);
    let target = match column.as_str() {
        "id" | "" => Target::Skip,
        "title" => Target::Title,
        "genres" | "genre" => Target::List(MetaKind::Genre),
        "languages" | "language" => Target::List(MetaKind::Language),
        "source" => Target::Reference(MetaKind::Source),
        "edition" if media_type == MediaType::Movie => Target::Reference(MetaKind::Edition),
        "quality" if media_type == MediaType::Movie => Target::Reference(MetaKind::Quality),
        "quality" | "episode_quality" if media_type == MediaType::Series => {
            Target::EpisodeReference(MetaKind::Quality)
        }
        "episode" if media_type == MediaType::Series => Target::EpisodeField("episode"),
        other => match other.strip_prefix("episode_") {
            Some(field) if media_type == MediaType::Series => RecordTable::Episodes
                .column(field)
                .map(|(name, _)| Target::EpisodeField(name))
                .ok_or_else(|| AppError::Validation(format!("Unknown episode column '{}'", other)))?,
            _ => table
                .column(other)
                .map(|(name, _)| Target::Field(name))
                .ok_or_else(|| {
                    AppError::Validation(format!("Unknown {} column '{}'", media_type, other))
                })?,
        },
    };
    Ok(target)
}

fn resolve_map(
    media_type: MediaType,
    rows: &[SourceRow],
    column_map: &ColumnMap,
) -> Result<Vec<(String, Target)>, AppError> {
    let pairs: Vec<(String, String)> = if column_map.is_empty() {
        let mut headers: Vec<String> = rows.iter().flat_map(|r| r.keys().cloned()).collect();
        headers.sort();
        headers.dedup();
        headers.into_iter().map(|h| (h.clone(), h)).collect()
    } else {
        column_map.iter().map(|(s, c)| (s.clone(), c.clone())).collect()
    };

    let mut resolved = Vec::with_capacity(pairs.len());
    for (source, column) in pairs {
        resolved.push((source, resolve_target(media_type, &column)?));
    }
    if !resolved.iter().any(|(_, t)| *t == Target::Title) {
        return Err(AppError::Validation("No column is mapped to title".to_string()));
    }
    Ok(resolved)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn is_blank(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || trimmed == "None"
}

/// Values of one row split by destination.
#[derive(Default)]
struct RowParts<'a> {
    title: Option<&'a str>,
    fields: Vec<(&'static str, &'a str)>,
    references: Vec<(MetaKind, &'a str)>,
    lists: Vec<(MetaKind, &'a str)>,
    episode_fields: Vec<(&'static str, &'a str)>,
    episode_references: Vec<(MetaKind, &'a str)>,
}

impl<'a> RowParts<'a> {
    fn split(row: &'a SourceRow, targets: &[(String, Target)]) -> Self {
        let mut parts = RowParts::default();
        for (source, target) in targets {
            let Some(raw) = row.get(source).map(String::as_str) else {
                continue;
            };
            match *target {
                Target::Skip => {}
                Target::Title => parts.title = Some(raw.trim()).filter(|t| !t.is_empty()),
                Target::Field(col) => parts.fields.push((col, raw)),
                Target::Reference(kind) => parts.references.push((kind, raw)),
                Target::List(kind) => parts.lists.push((kind, raw)),
                Target::EpisodeField(col) => parts.episode_fields.push((col, raw)),
                Target::EpisodeReference(kind) => parts.episode_references.push((kind, raw)),
            }
        }
        parts
    }

    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.fields.iter().all(|(_, v)| is_blank(v))
            && self.episode_fields.iter().all(|(_, v)| is_blank(v))
    }

    fn has_episode(&self) -> bool {
        self.episode_fields.iter().any(|(_, v)| !is_blank(v))
    }
}

fn reference_patch(
    conn: &Connection,
    patch: &mut RecordPatch,
    references: &[(MetaKind, &str)],
) -> anyhow::Result<()> {
    for (kind, raw) in references {
        if is_blank(raw) {
            continue;
        }
        let id = reconcile::ensure_meta_value(conn, *kind, raw)?;
        patch.set(kind.reference_column(), id)?;
    }
    Ok(())
}

fn save_record(conn: &Connection, media_type: MediaType, title: &str, parts: &RowParts) -> anyhow::Result<i64> {
    let id = records::insert_media(conn, media_type, title)?;

    let mut patch = RecordPatch::new(records::record_table(media_type));
    for (col, raw) in &parts.fields {
        patch.set_loose(col, raw)?;
    }
    reference_patch(conn, &mut patch, &parts.references)?;
    if !patch.is_empty() {
        records::update_fields(conn, &patch, id)?;
    }

    for (kind, raw) in &parts.lists {
        let names = split_list(raw);
        if !names.is_empty() {
            reconcile::reconcile(conn, media_type, id, *kind, Some(names.as_slice()))?;
        }
    }
    Ok(id)
}

fn save_episode(conn: &Connection, series_id: i64, position: i64, parts: &RowParts) -> anyhow::Result<i64> {
    // Numbering and text go into the insert, everything else is patched afterwards.
    let mut head = RecordPatch::new(RecordTable::Episodes);
    let mut rest = RecordPatch::new(RecordTable::Episodes);
    for (col, raw) in &parts.episode_fields {
        if matches!(*col, "season" | "episode" | "title" | "plot" | "release_date") {
            head.set_loose(col, raw)?;
        } else {
            rest.set_loose(col, raw)?;
        }
    }
    reference_patch(conn, &mut rest, &parts.episode_references)?;

    let number = |col: &str| match head.get(col) {
        Some(Value::Integer(n)) => Some(*n),
        _ => None,
    };
    let text = |col: &str| match head.get(col) {
        Some(Value::Text(s)) => Some(s.clone()),
        _ => None,
    };
    let episode = NewEpisode {
        season: number("season").unwrap_or(1),
        episode: number("episode").unwrap_or(position),
        title: text("title"),
        plot: text("plot"),
        release_date: text("release_date"),
    };
    let episode_id = records::insert_episode(conn, series_id, &episode)?;
    if !rest.is_empty() {
        records::update_fields(conn, &rest, episode_id)?;
    }
    Ok(episode_id)
}

/// Save all rows in a single transaction.
pub fn import_rows(
    db: &Database,
    media_type: MediaType,
    rows: &[SourceRow],
    column_map: &ColumnMap,
) -> Result<ImportReport, AppError> {
    if rows.is_empty() {
        return Ok(ImportReport::default());
    }
    let targets = resolve_map(media_type, rows, column_map)?;

    let report = db.with_transaction(|conn| {
        let mut report = ImportReport::default();
        let mut current: Option<(String, i64)> = None;
        let mut position = 0;

        for (index, row) in rows.iter().enumerate() {
            let parts = RowParts::split(row, &targets);
            if parts.is_empty() {
                report.skipped += 1;
                continue;
            }
            let Some(title) = parts.title else {
                return Err(AppError::Validation(format!("Row {} has no title", index + 1)).into());
            };

            let continuing = match &current {
                Some((prev, id)) if media_type == MediaType::Series && prev == title => Some(*id),
                _ => None,
            };
            let record_id = match continuing {
                Some(id) => id,
                None => {
                    let id = save_record(conn, media_type, title, &parts)?;
                    report.records += 1;
                    position = 0;
                    current = Some((title.to_string(), id));
                    id
                }
            };

            if media_type == MediaType::Series && parts.has_episode() {
                position += 1;
                save_episode(conn, record_id, position, &parts)?;
                report.episodes += 1;
            }
        }
        Ok(report)
    })?;

    log::info!(
        "Imported {} {} records, {} episodes ({} blank rows skipped)",
        report.records,
        media_type,
        report.episodes,
        report.skipped
    );
    Ok(report)
}
