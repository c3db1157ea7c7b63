//! Online metadata lookup providers.
//!
//! A provider answers three questions: which titles match a search, what are
//! the full details of one title, and which episodes belong to a season.
//! Implementations are registered by name in the template registry.

pub mod offline;
pub mod tmdb;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::database::{
    CastMember, FieldValue, MediaType, NewEpisode, RecordPatch, SourceInfo,
};
use crate::error::AppError;

pub use offline::OfflineProvider;
pub use tmdb::TmdbClient;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub year: Option<i64>,
    pub online_id: String,
}

/// Content fields returned by a provider. Absent fields are left untouched on merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchedContent {
    /// Display title at the provider; only used for search results and logs.
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub year: Option<i64>,
    pub runtime: Option<i64>,
    pub seasons: Option<i64>,
    pub country: Option<String>,
    pub online_rating: Option<f64>,
    pub certification: Option<String>,
    pub release_date: Option<String>,
    pub tagline: Option<String>,
    pub plot: Option<String>,
    pub director: Option<String>,
    pub writer: Option<String>,
    pub poster_url: Option<String>,
}

impl FetchedContent {
    /// Patch carrying every present field. The local title is never overwritten.
    pub fn to_patch(&self, media_type: MediaType, online_id: &str) -> Result<RecordPatch, AppError> {
        let mut patch = RecordPatch::new(crate::database::records::record_table(media_type));

        let text_fields = [
            ("original_title", &self.original_title),
            ("country", &self.country),
            ("certification", &self.certification),
            ("release_date", &self.release_date),
            ("tagline", &self.tagline),
            ("plot", &self.plot),
            ("director", &self.director),
            ("writer", &self.writer),
            ("poster_url", &self.poster_url),
        ];
        for (column, value) in text_fields {
            if let Some(value) = value {
                patch.set(column, value.as_str())?;
            }
        }
        if let Some(year) = self.year {
            patch.set("year", year)?;
        }
        if let Some(rating) = self.online_rating {
            patch.set("online_rating", rating)?;
        }
        match media_type {
            MediaType::Movie => {
                if let Some(runtime) = self.runtime {
                    patch.set("runtime", runtime)?;
                }
            }
            MediaType::Series => {
                if let Some(seasons) = self.seasons {
                    patch.set("seasons", seasons)?;
                }
            }
        }
        if !online_id.is_empty() {
            patch.set("online_id", FieldValue::Text(online_id.to_string()))?;
        }
        Ok(patch)
    }
}

/// Full details of one title as returned by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedMedia {
    pub media_type: MediaType,
    pub online_id: String,
    pub content: FetchedContent,
    pub lookup: SourceInfo,
    #[serde(default)]
    pub genres: Option<Vec<String>>,
    #[serde(default)]
    pub languages: Option<Vec<String>>,
    #[serde(default)]
    pub cast: Vec<CastMember>,
}

#[async_trait]
pub trait LookupProvider: Send + Sync {
    /// Registry name, e.g. "TMDb".
    fn name(&self) -> &str;

    /// Label written to `lookup_source` on saved records.
    fn source_label(&self) -> &str;

    async fn search_media(&self, media_type: MediaType, title: &str) -> Result<Vec<SearchHit>, AppError>;

    async fn get_media_details(&self, media_type: MediaType, online_id: &str) -> Result<FetchedMedia, AppError>;

    async fn get_season_episodes(&self, online_id: &str, season: i64) -> Result<Vec<NewEpisode>, AppError>;
}

/// Leading four-digit year of a `YYYY-MM-DD` date.
pub(crate) fn year_of(date: &str) -> Option<i64> {
    date.get(..4).and_then(|y| y.parse().ok())
}

/// Treat empty strings from providers as absent.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
