//! Maintenance of the metadata value tables themselves (preferences screen).

use anyhow::Result;
use rusqlite::{params, Connection};

use super::models::{Actor, MetaKind, MetaValue};
use super::reconcile::{self, MetaDiff};

pub fn list_meta_values(conn: &Connection, kind: MetaKind) -> Result<Vec<MetaValue>> {
    let sql = format!("SELECT id, name FROM {} ORDER BY name COLLATE NOCASE", kind.table());
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        Ok(MetaValue {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Tables and columns that reference a metadata value.
fn references(kind: MetaKind) -> &'static [(&'static str, &'static str)] {
    match kind {
        MetaKind::Genre => &[("movie_genres", "genre_id"), ("tv_series_genres", "genre_id")],
        MetaKind::Language => &[
            ("movie_languages", "language_id"),
            ("tv_series_languages", "language_id"),
        ],
        MetaKind::Source => &[("movies", "source_id"), ("tv_series", "source_id")],
        MetaKind::Edition => &[("movies", "edition_id")],
        MetaKind::Quality => &[("movies", "quality_id"), ("tv_series_episodes", "quality_id")],
    }
}

/// Remove a value. Junction rows are deleted; record references are set to NULL.
pub fn remove_meta_value(conn: &Connection, kind: MetaKind, name: &str) -> Result<bool> {
    let Some(id) = reconcile::find_meta_value(conn, kind, name)? else {
        return Ok(false);
    };

    for (table, column) in references(kind) {
        let sql = match kind {
            MetaKind::Genre | MetaKind::Language => {
                format!("DELETE FROM {} WHERE {} = ?", table, column)
            }
            _ => format!("UPDATE {} SET {} = NULL WHERE {} = ?", table, column, column),
        };
        conn.execute(&sql, params![id])?;
    }
    conn.execute(&format!("DELETE FROM {} WHERE id = ?", kind.table()), params![id])?;
    log::info!("Removed {} '{}'", kind, name.trim());
    Ok(true)
}

/// Converge a whole metadata table to `desired`, cleaning up references to removed values.
pub fn sync_meta_values(conn: &Connection, kind: MetaKind, desired: &[String]) -> Result<MetaDiff> {
    let current: Vec<String> = list_meta_values(conn, kind)?
        .into_iter()
        .map(|v| v.name)
        .collect();
    let changes = reconcile::diff(&current, desired);

    for name in &changes.to_remove {
        remove_meta_value(conn, kind, name)?;
    }
    for name in &changes.to_add {
        reconcile::ensure_meta_value(conn, kind, name)?;
    }
    Ok(changes)
}

pub fn list_actors(conn: &Connection) -> Result<Vec<Actor>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, online_id, lookup_source, source_url FROM actors ORDER BY name COLLATE NOCASE",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(Actor {
            id: row.get(0)?,
            name: row.get(1)?,
            online_id: row.get(2)?,
            lookup_source: row.get(3)?,
            source_url: row.get(4)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}
