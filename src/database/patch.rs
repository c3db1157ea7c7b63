//! Sparse, typed record patches.
//!
//! A [`RecordPatch`] collects `column = value` assignments for one catalog
//! table. Every column has a declared [`ColumnKind`] and values are coerced to
//! it when they are set, so the SQL representation of a field depends on the
//! schema and never on what the value happens to look like.

use rusqlite::types::Value;
use std::fmt;

use super::models::MetaKind;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Real,
    /// Stored as 0/1.
    Flag,
}

/// Catalog tables that accept patches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordTable {
    Movies,
    Series,
    Episodes,
}

const MOVIE_COLUMNS: &[(&str, ColumnKind)] = &[
    ("title", ColumnKind::Text),
    ("original_title", ColumnKind::Text),
    ("year", ColumnKind::Integer),
    ("runtime", ColumnKind::Integer),
    ("country", ColumnKind::Text),
    ("watched", ColumnKind::Flag),
    ("rating", ColumnKind::Real),
    ("online_rating", ColumnKind::Real),
    ("certification", ColumnKind::Text),
    ("release_date", ColumnKind::Text),
    ("tagline", ColumnKind::Text),
    ("plot", ColumnKind::Text),
    ("notes", ColumnKind::Text),
    ("director", ColumnKind::Text),
    ("writer", ColumnKind::Text),
    ("source_id", ColumnKind::Integer),
    ("quality_id", ColumnKind::Integer),
    ("edition_id", ColumnKind::Integer),
    ("video_codec", ColumnKind::Text),
    ("audio_codec", ColumnKind::Text),
    ("size", ColumnKind::Text),
    ("disc_count", ColumnKind::Integer),
    ("to_burn", ColumnKind::Flag),
    ("backup_disc", ColumnKind::Text),
    ("tag", ColumnKind::Text),
    ("lookup_source", ColumnKind::Text),
    ("source_url", ColumnKind::Text),
    ("poster_url", ColumnKind::Text),
    ("online_id", ColumnKind::Text),
    ("updated_date", ColumnKind::Text),
];

const SERIES_COLUMNS: &[(&str, ColumnKind)] = &[
    ("title", ColumnKind::Text),
    ("original_title", ColumnKind::Text),
    ("year", ColumnKind::Integer),
    ("seasons", ColumnKind::Integer),
    ("country", ColumnKind::Text),
    ("watched", ColumnKind::Flag),
    ("rating", ColumnKind::Real),
    ("online_rating", ColumnKind::Real),
    ("certification", ColumnKind::Text),
    ("release_date", ColumnKind::Text),
    ("tagline", ColumnKind::Text),
    ("plot", ColumnKind::Text),
    ("notes", ColumnKind::Text),
    ("director", ColumnKind::Text),
    ("writer", ColumnKind::Text),
    ("source_id", ColumnKind::Integer),
    ("size", ColumnKind::Text),
    ("to_burn", ColumnKind::Flag),
    ("backup_disc", ColumnKind::Text),
    ("tag", ColumnKind::Text),
    ("lookup_source", ColumnKind::Text),
    ("source_url", ColumnKind::Text),
    ("poster_url", ColumnKind::Text),
    ("online_id", ColumnKind::Text),
    ("updated_date", ColumnKind::Text),
];

const EPISODE_COLUMNS: &[(&str, ColumnKind)] = &[
    ("season", ColumnKind::Integer),
    ("episode", ColumnKind::Integer),
    ("title", ColumnKind::Text),
    ("plot", ColumnKind::Text),
    ("release_date", ColumnKind::Text),
    ("watched", ColumnKind::Flag),
    ("to_burn", ColumnKind::Flag),
    ("backup_disc", ColumnKind::Text),
    ("tag", ColumnKind::Text),
    ("size", ColumnKind::Text),
    ("quality_id", ColumnKind::Integer),
    ("updated_date", ColumnKind::Text),
];

impl RecordTable {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Movies => "movies",
            Self::Series => "tv_series",
            Self::Episodes => "tv_series_episodes",
        }
    }

    pub fn columns(&self) -> &'static [(&'static str, ColumnKind)] {
        match self {
            Self::Movies => MOVIE_COLUMNS,
            Self::Series => SERIES_COLUMNS,
            Self::Episodes => EPISODE_COLUMNS,
        }
    }

    /// Resolve a column name (case-insensitive) to its canonical name and kind.
    pub fn column(&self, name: &str) -> Option<(&'static str, ColumnKind)> {
        let wanted = name.trim().to_ascii_lowercase();
        self.columns()
            .iter()
            .find(|(col, _)| *col == wanted)
            .copied()
    }
}

/// Value handed to [`RecordPatch::set`]. `Null` is an explicit "clear this field".
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Flag(bool),
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Real(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Flag(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

fn invalid(column: &str, kind: ColumnKind, raw: impl fmt::Display) -> AppError {
    AppError::Validation(format!(
        "Invalid value '{}' for {} column '{}'",
        raw,
        match kind {
            ColumnKind::Text => "text",
            ColumnKind::Integer => "integer",
            ColumnKind::Real => "numeric",
            ColumnKind::Flag => "yes/no",
        },
        column
    ))
}

/// Whole-valued reals inside the i64 range.
fn real_to_integer(r: f64) -> Option<i64> {
    if r.is_finite() && r.fract() == 0.0 && r >= i64::MIN as f64 && r < i64::MAX as f64 {
        Some(r as i64)
    } else {
        None
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

fn coerce(column: &str, kind: ColumnKind, value: FieldValue) -> Result<Value, AppError> {
    let coerced = match (kind, value) {
        // Flags are NOT NULL; clearing one means "no".
        (ColumnKind::Flag, FieldValue::Null) => Value::Integer(0),
        (_, FieldValue::Null) => Value::Null,

        (ColumnKind::Text, FieldValue::Text(s)) => Value::Text(s),
        (ColumnKind::Text, FieldValue::Integer(i)) => Value::Text(i.to_string()),
        (ColumnKind::Text, FieldValue::Real(r)) => Value::Text(r.to_string()),
        (ColumnKind::Text, FieldValue::Flag(b)) => Value::Text(b.to_string()),

        (ColumnKind::Integer, FieldValue::Integer(i)) => Value::Integer(i),
        (ColumnKind::Integer, FieldValue::Flag(b)) => Value::Integer(b as i64),
        (ColumnKind::Integer, FieldValue::Real(r)) => match real_to_integer(r) {
            Some(i) => Value::Integer(i),
            None => return Err(invalid(column, kind, r)),
        },
        (ColumnKind::Integer, FieldValue::Text(s)) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                Value::Integer(i)
            } else {
                match trimmed.parse::<f64>().ok().and_then(real_to_integer) {
                    Some(i) => Value::Integer(i),
                    None => return Err(invalid(column, kind, s)),
                }
            }
        }

        (ColumnKind::Real, FieldValue::Real(r)) if r.is_finite() => Value::Real(r),
        (ColumnKind::Real, FieldValue::Integer(i)) => Value::Real(i as f64),
        (ColumnKind::Real, FieldValue::Text(s)) => match s.trim().parse::<f64>() {
            Ok(r) if r.is_finite() => Value::Real(r),
            _ => return Err(invalid(column, kind, s)),
        },

        (ColumnKind::Flag, FieldValue::Flag(b)) => Value::Integer(b as i64),
        (ColumnKind::Flag, FieldValue::Integer(i)) => Value::Integer((i != 0) as i64),
        (ColumnKind::Flag, FieldValue::Real(r)) => Value::Integer((r != 0.0) as i64),
        (ColumnKind::Flag, FieldValue::Text(s)) => match parse_flag(&s) {
            Some(b) => Value::Integer(b as i64),
            None => return Err(invalid(column, kind, s)),
        },

        (kind, other) => return Err(invalid(column, kind, format!("{:?}", other))),
    };
    Ok(coerced)
}

/// Sparse set of column assignments for one table. Unset columns are left untouched.
///
/// Source, edition and quality can be given by name with [`RecordPatch::set_reference`];
/// those names are turned into ids by the write that applies the patch, inside its
/// transaction.
#[derive(Debug, Clone)]
pub struct RecordPatch {
    table: RecordTable,
    fields: Vec<(&'static str, Value)>,
    references: Vec<(MetaKind, String)>,
}

impl RecordPatch {
    pub fn new(table: RecordTable) -> Self {
        Self {
            table,
            fields: Vec::new(),
            references: Vec::new(),
        }
    }

    pub fn table(&self) -> RecordTable {
        self.table
    }

    /// Set a column, coercing the value to the column's declared type.
    pub fn set(&mut self, column: &str, value: impl Into<FieldValue>) -> Result<&mut Self, AppError> {
        let (name, kind) = self.table.column(column).ok_or_else(|| {
            AppError::Validation(format!(
                "Unknown column '{}' for {}",
                column,
                self.table.name()
            ))
        })?;
        let value = coerce(name, kind, value.into())?;

        self.references.retain(|(k, _)| k.reference_column() != name);
        match self.fields.iter_mut().find(|(col, _)| *col == name) {
            Some(existing) => existing.1 = value,
            None => self.fields.push((name, value)),
        }
        Ok(self)
    }

    /// Set a column from free-form text (imports, command line).
    ///
    /// The empty string and the literal `None` both mean NULL; anything else
    /// is coerced by the column type.
    pub fn set_loose(&mut self, column: &str, raw: &str) -> Result<&mut Self, AppError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "None" {
            self.set(column, FieldValue::Null)
        } else {
            self.set(column, FieldValue::Text(raw.to_string()))
        }
    }

    /// Reference a source, edition or quality by name. Blank or `None` clears it.
    pub fn set_reference(&mut self, kind: MetaKind, name: &str) -> Result<&mut Self, AppError> {
        let (column, _) = self.table.column(kind.reference_column()).ok_or_else(|| {
            AppError::Validation(format!("{} has no {} column", self.table.name(), kind))
        })?;
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed == "None" {
            return self.set(column, FieldValue::Null);
        }
        self.fields.retain(|(col, _)| *col != column);
        self.references.retain(|(k, _)| *k != kind);
        self.references.push((kind, trimmed.to_string()));
        Ok(self)
    }

    /// Reference names still waiting for their ids.
    pub fn references(&self) -> &[(MetaKind, String)] {
        &self.references
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.references.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len() + self.references.len()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        let wanted = column.trim().to_ascii_lowercase();
        self.fields
            .iter()
            .find(|(col, _)| *col == wanted)
            .map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|(col, _)| *col)
    }

    /// `col = ?` assignments joined by commas, with the values in placeholder order.
    /// Unresolved references are not included.
    pub fn assignments(&self) -> (String, Vec<Value>) {
        let sql = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect::<Vec<_>>()
            .join(", ");
        let values = self.fields.iter().map(|(_, v)| v.clone()).collect();
        (sql, values)
    }
}

/// Literal rendering for logs: `col = NULL`, `col = 2024`, `col = "text"`.
impl fmt::Display for RecordPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (col, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match value {
                Value::Null => write!(f, "{} = NULL", col)?,
                Value::Integer(v) => write!(f, "{} = {}", col, v)?,
                Value::Real(v) => write!(f, "{} = {}", col, v)?,
                Value::Text(s) => write!(f, "{} = \"{}\"", col, s.replace('"', "\"\""))?,
                Value::Blob(b) => write!(f, "{} = <{} bytes>", col, b.len())?,
            }
        }
        for (i, (kind, name)) in self.references.iter().enumerate() {
            if i > 0 || !self.fields.is_empty() {
                write!(f, ", ")?;
            }
            write!(f, "{} = \"{}\"", kind, name.replace('"', "\"\""))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_and_literal_none_render_as_null() {
        let mut patch = RecordPatch::new(RecordTable::Movies);
        patch.set("plot", FieldValue::Null).unwrap();
        patch.set_loose("tagline", "None").unwrap();
        patch.set_loose("notes", "").unwrap();

        let rendered = patch.to_string();
        assert!(rendered.contains("plot = NULL"));
        assert!(rendered.contains("tagline = NULL"));
        assert!(rendered.contains("notes = NULL"));
    }

    #[test]
    fn numeric_column_renders_unquoted() {
        let mut patch = RecordPatch::new(RecordTable::Movies);
        patch.set_loose("year", "2024").unwrap();
        assert_eq!(patch.to_string(), "year = 2024");
        assert_eq!(patch.get("year"), Some(&Value::Integer(2024)));
    }

    #[test]
    fn text_renders_double_quoted() {
        let mut patch = RecordPatch::new(RecordTable::Movies);
        patch.set("country", "New Zealand").unwrap();
        assert_eq!(patch.to_string(), "country = \"New Zealand\"");
    }

    #[test]
    fn numeric_looking_title_stays_text() {
        let mut patch = RecordPatch::new(RecordTable::Movies);
        patch.set_loose("title", "2001").unwrap();
        assert_eq!(patch.get("title"), Some(&Value::Text("2001".to_string())));
        assert_eq!(patch.to_string(), "title = \"2001\"");
    }

    #[test]
    fn assignments_use_placeholders_in_insertion_order() {
        let mut patch = RecordPatch::new(RecordTable::Series);
        patch.set("title", "Dark").unwrap();
        patch.set("seasons", 3i64).unwrap();
        patch.set("watched", true).unwrap();

        let (sql, values) = patch.assignments();
        assert_eq!(sql, "title = ?, seasons = ?, watched = ?");
        assert_eq!(
            values,
            vec![
                Value::Text("Dark".into()),
                Value::Integer(3),
                Value::Integer(1)
            ]
        );
    }

    #[test]
    fn setting_twice_overwrites() {
        let mut patch = RecordPatch::new(RecordTable::Movies);
        patch.set("rating", 7.0).unwrap();
        patch.set("rating", 8.5).unwrap();
        assert_eq!(patch.len(), 1);
        assert_eq!(patch.get("rating"), Some(&Value::Real(8.5)));
    }

    #[test]
    fn unknown_and_id_columns_are_rejected() {
        let mut patch = RecordPatch::new(RecordTable::Movies);
        assert!(matches!(patch.set("id", 4i64), Err(AppError::Validation(_))));
        assert!(matches!(patch.set("seasons", 4i64), Err(AppError::Validation(_))));
    }

    #[test]
    fn flags_accept_exported_booleans() {
        let mut patch = RecordPatch::new(RecordTable::Episodes);
        patch.set_loose("watched", "True").unwrap();
        patch.set_loose("to_burn", "FALSE").unwrap();
        assert_eq!(patch.get("watched"), Some(&Value::Integer(1)));
        assert_eq!(patch.get("to_burn"), Some(&Value::Integer(0)));
        assert!(patch.set_loose("watched", "maybe").is_err());
    }

    #[test]
    fn integer_column_rejects_out_of_range_reals() {
        let mut patch = RecordPatch::new(RecordTable::Movies);
        assert!(matches!(patch.set_loose("year", "1e30"), Err(AppError::Validation(_))));
        assert!(matches!(patch.set("year", f64::INFINITY), Err(AppError::Validation(_))));
        assert!(matches!(patch.set("rating", f64::NAN), Err(AppError::Validation(_))));
        assert!(matches!(patch.set_loose("rating", "inf"), Err(AppError::Validation(_))));
        assert!(patch.is_empty());
        patch.set("year", 1999.0).unwrap();
        assert_eq!(patch.get("year"), Some(&Value::Integer(1999)));
    }

    #[test]
    fn references_wait_for_resolution() {
        let mut patch = RecordPatch::new(RecordTable::Movies);
        patch.set_reference(MetaKind::Source, " Blu-ray ").unwrap();
        patch.set_reference(MetaKind::Edition, "None").unwrap();
        assert_eq!(patch.references(), &[(MetaKind::Source, "Blu-ray".to_string())]);
        assert_eq!(patch.get("edition_id"), Some(&Value::Null));
        assert_eq!(patch.len(), 2);
        assert_eq!(patch.to_string(), "edition_id = NULL, source = \"Blu-ray\"");

        patch.set("source_id", 4i64).unwrap();
        assert!(patch.references().is_empty());
    }

    #[test]
    fn series_have_no_edition_reference() {
        let mut patch = RecordPatch::new(RecordTable::Series);
        assert!(matches!(
            patch.set_reference(MetaKind::Edition, "Extended"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn integer_column_rejects_text() {
        let mut patch = RecordPatch::new(RecordTable::Movies);
        assert!(patch.set_loose("runtime", "two hours").is_err());
        patch.set_loose("runtime", "148.0").unwrap();
        assert_eq!(patch.get("runtime"), Some(&Value::Integer(148)));
    }
}
