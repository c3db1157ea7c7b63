//! Compiles list filters into a parameterized WHERE clause.

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use super::models::MediaType;
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "key", content = "value")]
pub enum FilterCriterion {
    Title(String),
    Director(String),
    Actor(String),
    /// Genre id.
    Genre(i64),
    /// Language id.
    Language(i64),
    Watched(bool),
    ToBurn(bool),
    Year(i64),
    /// Source id.
    Source(i64),
    /// Edition id.
    Edition(i64),
    /// Quality id.
    Quality(i64),
    BackupDisc(String),
}

impl FilterCriterion {
    fn key(&self) -> &'static str {
        match self {
            Self::Title(_) => "title",
            Self::Director(_) => "director",
            Self::Actor(_) => "actor",
            Self::Genre(_) => "genre",
            Self::Language(_) => "language",
            Self::Watched(_) => "watched",
            Self::ToBurn(_) => "to_burn",
            Self::Year(_) => "year",
            Self::Source(_) => "source",
            Self::Edition(_) => "edition",
            Self::Quality(_) => "quality",
            Self::BackupDisc(_) => "backup_disc",
        }
    }
}

/// Set of active filters, at most one per key, kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaFilters {
    criteria: Vec<FilterCriterion>,
}

/// A WHERE clause (or the empty string) and its bound values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledFilter {
    pub clause: String,
    pub params: Vec<Value>,
}

/// Escape LIKE wildcards so user text matches literally.
fn like_pattern(text: &str) -> Value {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    Value::Text(format!("%{}%", escaped))
}

impl MediaFilters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a criterion, replacing any existing criterion with the same key.
    pub fn with(mut self, criterion: FilterCriterion) -> Self {
        self.set(criterion);
        self
    }

    pub fn set(&mut self, criterion: FilterCriterion) {
        match self.criteria.iter_mut().find(|c| c.key() == criterion.key()) {
            Some(existing) => *existing = criterion,
            None => self.criteria.push(criterion),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn criteria(&self) -> &[FilterCriterion] {
        &self.criteria
    }

    pub fn compile(&self, media_type: MediaType) -> Result<CompiledFilter, AppError> {
        let a = media_type.alias();
        let owner = media_type.owner_column();
        let mut conditions: Vec<String> = Vec::with_capacity(self.criteria.len());
        let mut params: Vec<Value> = Vec::new();

        for criterion in &self.criteria {
            let condition = match criterion {
                FilterCriterion::Title(text) => {
                    params.push(like_pattern(text));
                    format!("{a}.title LIKE ? ESCAPE '\\'")
                }
                FilterCriterion::Director(text) => {
                    params.push(like_pattern(text));
                    format!("{a}.director LIKE ? ESCAPE '\\'")
                }
                FilterCriterion::Actor(text) => {
                    params.push(like_pattern(text));
                    format!(
                        "EXISTS (SELECT 1 FROM {cast} c JOIN actors ac ON ac.id = c.actor_id
                                 WHERE c.{owner} = {a}.id AND ac.name LIKE ? ESCAPE '\\')",
                        cast = media_type.cast_table(),
                    )
                }
                FilterCriterion::Genre(id) => {
                    params.push(Value::Integer(*id));
                    let table = match media_type {
                        MediaType::Movie => "movie_genres",
                        MediaType::Series => "tv_series_genres",
                    };
                    format!("? IN (SELECT genre_id FROM {table} WHERE {owner} = {a}.id)")
                }
                FilterCriterion::Language(id) => {
                    params.push(Value::Integer(*id));
                    let table = match media_type {
                        MediaType::Movie => "movie_languages",
                        MediaType::Series => "tv_series_languages",
                    };
                    format!("? IN (SELECT language_id FROM {table} WHERE {owner} = {a}.id)")
                }
                FilterCriterion::Watched(flag) => {
                    params.push(Value::Integer(*flag as i64));
                    format!("{a}.watched = ?")
                }
                FilterCriterion::ToBurn(flag) => match media_type {
                    MediaType::Movie => {
                        params.push(Value::Integer(*flag as i64));
                        format!("{a}.to_burn = ?")
                    }
                    // A series is "to burn" when any of its episodes is.
                    MediaType::Series => format!(
                        "{}EXISTS (SELECT 1 FROM tv_series_episodes e WHERE e.series_id = {a}.id AND e.to_burn = 1)",
                        if *flag { "" } else { "NOT " }
                    ),
                },
                FilterCriterion::Year(year) => {
                    params.push(Value::Integer(*year));
                    format!("{a}.year = ?")
                }
                FilterCriterion::Source(id) => {
                    params.push(Value::Integer(*id));
                    format!("{a}.source_id = ?")
                }
                FilterCriterion::Edition(id) | FilterCriterion::Quality(id) => {
                    if media_type == MediaType::Series {
                        return Err(AppError::Validation(format!(
                            "Series cannot be filtered by {}",
                            criterion.key()
                        )));
                    }
                    params.push(Value::Integer(*id));
                    let column = if matches!(criterion, FilterCriterion::Edition(_)) {
                        "edition_id"
                    } else {
                        "quality_id"
                    };
                    format!("{a}.{column} = ?")
                }
                FilterCriterion::BackupDisc(disc) => match media_type {
                    MediaType::Movie => {
                        params.push(Value::Text(disc.clone()));
                        format!("{a}.backup_disc = ?")
                    }
                    MediaType::Series => {
                        params.push(Value::Text(disc.clone()));
                        params.push(Value::Text(disc.clone()));
                        format!(
                            "({a}.backup_disc = ? OR EXISTS (SELECT 1 FROM tv_series_episodes e WHERE e.series_id = {a}.id AND e.backup_disc = ?))"
                        )
                    }
                },
            };
            conditions.push(condition);
        }

        let clause = conditions
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} {}", if i == 0 { "WHERE" } else { "AND" }, c))
            .collect::<Vec<_>>()
            .join(" ");

        Ok(CompiledFilter { clause, params })
    }
}
