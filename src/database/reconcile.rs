//! Convergence of a record's many-to-many metadata (genres, languages) to a desired list.

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashSet;

use super::models::{MediaType, MetaKind};
use crate::error::AppError;

/// Junction table linking one media type to one metadata kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Junction {
    pub media_type: MediaType,
    pub kind: MetaKind,
}

impl Junction {
    pub fn new(media_type: MediaType, kind: MetaKind) -> Result<Self, AppError> {
        match kind {
            MetaKind::Genre | MetaKind::Language => Ok(Self { media_type, kind }),
            other => Err(AppError::Validation(format!(
                "{} is a single reference, not a list",
                other
            ))),
        }
    }

    pub fn table(&self) -> &'static str {
        match (self.media_type, self.kind) {
            (MediaType::Movie, MetaKind::Language) => "movie_languages",
            (MediaType::Series, MetaKind::Language) => "tv_series_languages",
            (MediaType::Movie, _) => "movie_genres",
            (MediaType::Series, _) => "tv_series_genres",
        }
    }
}

/// Names to remove from and add to a record, in first-seen order.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct MetaDiff {
    pub to_remove: Vec<String>,
    pub to_add: Vec<String>,
}

impl MetaDiff {
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    pub added: usize,
    pub removed: usize,
}

/// Trim, drop blanks and de-duplicate while keeping first-seen order.
pub fn normalize_names<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .iter()
        .map(|v| v.as_ref().trim())
        .filter(|v| !v.is_empty())
        .filter(|v| seen.insert(v.to_string()))
        .map(str::to_string)
        .collect()
}

/// Set difference over display names: `current - desired` and `desired - current`.
pub fn diff<S: AsRef<str>, T: AsRef<str>>(current: &[S], desired: &[T]) -> MetaDiff {
    let current = normalize_names(current);
    let desired = normalize_names(desired);
    let current_set: HashSet<&str> = current.iter().map(String::as_str).collect();
    let desired_set: HashSet<&str> = desired.iter().map(String::as_str).collect();

    MetaDiff {
        to_remove: current
            .iter()
            .filter(|v| !desired_set.contains(v.as_str()))
            .cloned()
            .collect(),
        to_add: desired
            .iter()
            .filter(|v| !current_set.contains(v.as_str()))
            .cloned()
            .collect(),
    }
}

pub fn find_meta_value(conn: &Connection, kind: MetaKind, name: &str) -> Result<Option<i64>> {
    let sql = format!("SELECT id FROM {} WHERE name = ?", kind.table());
    let id = conn
        .query_row(&sql, params![name.trim()], |row| row.get(0))
        .optional()?;
    Ok(id)
}

/// Id of the named metadata value, creating it the first time it is seen.
pub fn ensure_meta_value(conn: &Connection, kind: MetaKind, name: &str) -> Result<i64> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation(format!("Empty {} name", kind)).into());
    }
    if let Some(id) = find_meta_value(conn, kind, name)? {
        return Ok(id);
    }
    let sql = format!("INSERT INTO {} (name, created_date) VALUES (?, ?)", kind.table());
    conn.execute(&sql, params![name, super::now()])?;
    let id = conn.last_insert_rowid();
    log::debug!("Created {} '{}' with id {}", kind, name, id);
    Ok(id)
}

/// Names currently associated with a record through the junction table.
pub fn current_values(conn: &Connection, junction: Junction, owner_id: i64) -> Result<Vec<String>> {
    let sql = format!(
        "SELECT v.name FROM {junction} j
         JOIN {values} v ON v.id = j.{reference}
         WHERE j.{owner} = ?
         ORDER BY j.id",
        junction = junction.table(),
        values = junction.kind.table(),
        reference = junction.kind.reference_column(),
        owner = junction.media_type.owner_column(),
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![owner_id], |row| row.get::<_, String>(0))?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

fn remove_association(conn: &Connection, junction: Junction, owner_id: i64, name: &str) -> Result<()> {
    let sql = format!(
        "DELETE FROM {junction} WHERE {owner} = ?1
           AND {reference} IN (SELECT id FROM {values} WHERE name = ?2)",
        junction = junction.table(),
        owner = junction.media_type.owner_column(),
        reference = junction.kind.reference_column(),
        values = junction.kind.table(),
    );
    conn.execute(&sql, params![owner_id, name])?;
    Ok(())
}

fn add_association(conn: &Connection, junction: Junction, owner_id: i64, value_id: i64) -> Result<bool> {
    let sql = format!(
        "INSERT OR IGNORE INTO {junction} ({owner}, {reference}, created_date) VALUES (?, ?, ?)",
        junction = junction.table(),
        owner = junction.media_type.owner_column(),
        reference = junction.kind.reference_column(),
    );
    let inserted = conn.execute(&sql, params![owner_id, value_id, super::now()])?;
    Ok(inserted > 0)
}

/// Converge a record's genres or languages to `desired`.
///
/// `None` leaves the associations untouched. `Some(&[])` clears them.
pub fn reconcile(
    conn: &Connection,
    media_type: MediaType,
    owner_id: i64,
    kind: MetaKind,
    desired: Option<&[String]>,
) -> Result<ReconcileOutcome> {
    let Some(desired) = desired else {
        return Ok(ReconcileOutcome::default());
    };
    let junction = Junction::new(media_type, kind)?;
    let current = current_values(conn, junction, owner_id)?;
    let changes = diff(&current, desired);
    if changes.is_empty() {
        return Ok(ReconcileOutcome::default());
    }

    for name in &changes.to_remove {
        remove_association(conn, junction, owner_id, name)?;
    }
    for name in &changes.to_add {
        let value_id = ensure_meta_value(conn, kind, name)?;
        add_association(conn, junction, owner_id, value_id)?;
    }

    log::info!(
        "{} {} {}s: -{:?} +{:?}",
        media_type,
        owner_id,
        kind,
        changes.to_remove,
        changes.to_add
    );
    Ok(ReconcileOutcome {
        added: changes.to_add.len(),
        removed: changes.to_remove.len(),
    })
}

/// Add one value to a record if it is not already associated. Returns whether a row was written.
pub fn attach(
    conn: &Connection,
    media_type: MediaType,
    owner_id: i64,
    kind: MetaKind,
    name: &str,
) -> Result<bool> {
    let junction = Junction::new(media_type, kind)?;
    let value_id = ensure_meta_value(conn, kind, name)?;
    add_association(conn, junction, owner_id, value_id)
}
