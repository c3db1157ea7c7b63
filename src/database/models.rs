use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// The two top-level catalog kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Movie,
    Series,
}

impl MediaType {
    pub fn table(&self) -> &'static str {
        match self {
            Self::Movie => "movies",
            Self::Series => "tv_series",
        }
    }

    /// Table alias used by list queries and the filter compiler.
    pub fn alias(&self) -> &'static str {
        match self {
            Self::Movie => "m",
            Self::Series => "t",
        }
    }

    /// Column in junction/cast tables that points back at this media row.
    pub fn owner_column(&self) -> &'static str {
        match self {
            Self::Movie => "movie_id",
            Self::Series => "series_id",
        }
    }

    pub fn cast_table(&self) -> &'static str {
        match self {
            Self::Movie => "movie_cast",
            Self::Series => "tv_series_cast",
        }
    }

    /// Directory name for locally stored posters.
    pub fn poster_dir(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Series => "series",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Movie => write!(f, "movie"),
            Self::Series => write!(f, "series"),
        }
    }
}

impl std::str::FromStr for MediaType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "movie" | "movies" => Ok(Self::Movie),
            "series" | "tv" | "tv_series" | "show" => Ok(Self::Series),
            other => Err(AppError::Validation(format!("Unknown media type: {}", other))),
        }
    }
}

/// Tag-like reference values shared across catalog entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaKind {
    Genre,
    Language,
    Source,
    Edition,
    Quality,
}

impl MetaKind {
    pub const ALL: [MetaKind; 5] = [
        MetaKind::Genre,
        MetaKind::Language,
        MetaKind::Source,
        MetaKind::Edition,
        MetaKind::Quality,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            Self::Genre => "genres",
            Self::Language => "languages",
            Self::Source => "media_sources",
            Self::Edition => "media_editions",
            Self::Quality => "media_qualities",
        }
    }

    /// Column name used when this value is referenced from a junction or record row.
    pub fn reference_column(&self) -> &'static str {
        match self {
            Self::Genre => "genre_id",
            Self::Language => "language_id",
            Self::Source => "source_id",
            Self::Edition => "edition_id",
            Self::Quality => "quality_id",
        }
    }
}

impl std::fmt::Display for MetaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Genre => write!(f, "genre"),
            Self::Language => write!(f, "language"),
            Self::Source => write!(f, "source"),
            Self::Edition => write!(f, "edition"),
            Self::Quality => write!(f, "quality"),
        }
    }
}

impl std::str::FromStr for MetaKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().trim_end_matches('s') {
            "genre" => Ok(Self::Genre),
            "language" => Ok(Self::Language),
            "source" => Ok(Self::Source),
            "edition" => Ok(Self::Edition),
            "quality" | "qualitie" => Ok(Self::Quality),
            other => Err(AppError::Validation(format!("Unknown metadata type: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaValue {
    pub id: i64,
    pub name: String,
}

/// Row shown in the main catalog list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaSummary {
    pub id: i64,
    pub title: String,
    pub year: Option<i64>,
    pub watched: bool,
    pub to_burn: bool,
    pub rating: Option<f64>,
    pub size: Option<String>,
    pub seasons: Option<i64>,
    pub created_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub original_title: Option<String>,
    pub year: Option<i64>,
    pub runtime: Option<i64>,
    pub country: Option<String>,
    pub watched: bool,
    pub rating: Option<f64>,
    pub online_rating: Option<f64>,
    pub certification: Option<String>,
    pub release_date: Option<String>,
    pub tagline: Option<String>,
    pub plot: Option<String>,
    pub notes: Option<String>,
    pub director: Option<String>,
    pub writer: Option<String>,
    pub source: Option<String>,
    pub quality: Option<String>,
    pub edition: Option<String>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub size: Option<String>,
    pub disc_count: Option<i64>,
    pub to_burn: bool,
    pub backup_disc: Option<String>,
    pub tag: Option<String>,
    pub lookup_source: Option<String>,
    pub source_url: Option<String>,
    pub poster_url: Option<String>,
    pub online_id: Option<String>,
    pub created_date: Option<String>,
    pub updated_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    pub id: i64,
    pub title: String,
    pub original_title: Option<String>,
    pub year: Option<i64>,
    pub seasons: Option<i64>,
    pub country: Option<String>,
    pub watched: bool,
    pub rating: Option<f64>,
    pub online_rating: Option<f64>,
    pub certification: Option<String>,
    pub release_date: Option<String>,
    pub tagline: Option<String>,
    pub plot: Option<String>,
    pub notes: Option<String>,
    pub director: Option<String>,
    pub writer: Option<String>,
    pub source: Option<String>,
    pub size: Option<String>,
    pub to_burn: bool,
    pub backup_disc: Option<String>,
    pub tag: Option<String>,
    pub lookup_source: Option<String>,
    pub source_url: Option<String>,
    pub poster_url: Option<String>,
    pub online_id: Option<String>,
    pub created_date: Option<String>,
    pub updated_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: i64,
    pub series_id: i64,
    pub season: i64,
    pub episode: i64,
    pub title: Option<String>,
    pub plot: Option<String>,
    pub release_date: Option<String>,
    pub watched: bool,
    pub to_burn: bool,
    pub backup_disc: Option<String>,
    pub tag: Option<String>,
    pub size: Option<String>,
    pub quality: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub id: i64,
    pub season: i64,
    pub episode: i64,
    pub title: Option<String>,
    pub watched: bool,
    pub backup_disc: Option<String>,
    pub size: Option<String>,
}

/// Episode as it arrives from a lookup provider or the "add episode" action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEpisode {
    pub season: i64,
    pub episode: i64,
    pub title: Option<String>,
    pub plot: Option<String>,
    pub release_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub name: String,
    pub online_id: Option<String>,
    pub lookup_source: Option<String>,
    pub source_url: Option<String>,
}

/// One actor credited on a movie or series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastEntry {
    pub id: i64,
    pub actor_id: i64,
    pub name: String,
    pub character: Option<String>,
    /// Appearance note, series only.
    pub episodes: Option<String>,
}

/// Cast credit to be written; actors are created on demand from `(name, online_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastMember {
    pub online_id: Option<String>,
    pub name: String,
    pub character: Option<String>,
    pub episodes: Option<String>,
}

/// Where a record's details were looked up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub lookup_source: String,
    pub source_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MovieDetails {
    pub movie: Movie,
    pub genres: Vec<String>,
    pub languages: Vec<String>,
    pub cast: Vec<CastEntry>,
    /// Other titles on the same backup disc.
    pub others: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesDetails {
    pub series: Series,
    pub episodes: Vec<EpisodeSummary>,
    pub genres: Vec<String>,
    pub languages: Vec<String>,
    pub cast: Vec<CastEntry>,
}

// ============================================================================
// Export rows
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieExportRow {
    pub id: i64,
    pub title: String,
    pub original_title: Option<String>,
    pub year: Option<i64>,
    pub runtime: Option<i64>,
    pub country: Option<String>,
    pub watched: bool,
    pub online_rating: Option<f64>,
    pub rating: Option<f64>,
    pub certification: Option<String>,
    pub release_date: Option<String>,
    pub tagline: Option<String>,
    pub plot: Option<String>,
    pub notes: Option<String>,
    pub director: Option<String>,
    pub writer: Option<String>,
    pub source: Option<String>,
    pub quality: Option<String>,
    pub edition: Option<String>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub size: Option<String>,
    pub disc_count: Option<i64>,
    pub to_burn: bool,
    pub backup_disc: Option<String>,
    pub tag: Option<String>,
    pub lookup_source: Option<String>,
    pub source_url: Option<String>,
    pub poster_url: Option<String>,
    pub genres: Option<String>,
    pub languages: Option<String>,
}

/// One row per episode; series without episodes export a single row with empty episode columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesExportRow {
    pub id: i64,
    pub title: String,
    pub original_title: Option<String>,
    pub year: Option<i64>,
    pub seasons: Option<i64>,
    pub country: Option<String>,
    pub watched: bool,
    pub online_rating: Option<f64>,
    pub rating: Option<f64>,
    pub release_date: Option<String>,
    pub certification: Option<String>,
    pub tagline: Option<String>,
    pub plot: Option<String>,
    pub notes: Option<String>,
    pub lookup_source: Option<String>,
    pub source_url: Option<String>,
    pub poster_url: Option<String>,
    pub episode_season: Option<i64>,
    pub episode: Option<i64>,
    pub episode_title: Option<String>,
    pub episode_plot: Option<String>,
    pub episode_watched: Option<bool>,
    pub episode_quality: Option<String>,
    pub episode_to_burn: Option<bool>,
    pub episode_backup_disc: Option<String>,
    pub episode_tag: Option<String>,
    pub episode_size: Option<String>,
    pub genres: Option<String>,
    pub languages: Option<String>,
}
