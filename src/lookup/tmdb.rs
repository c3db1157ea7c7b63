//! TMDb (themoviedb.org) lookup provider.
//!
//! Calls the v3 REST API with an API key. Movie details come with credits and
//! release dates appended; series details with aggregate credits and content
//! ratings so one request covers everything a merge needs besides episodes.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use super::{non_empty, year_of, FetchedContent, FetchedMedia, LookupProvider, SearchHit};
use crate::database::{CastMember, MediaType, NewEpisode, SourceInfo};
use crate::error::AppError;

const TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";
const TMDB_SITE_URL: &str = "https://www.themoviedb.org";
const POSTER_BASE_URL: &str = "https://image.tmdb.org/t/p/w500";
const DEFAULT_LANGUAGE: &str = "en-US";
const DEFAULT_REGION: &str = "US";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_CAST: usize = 20;

pub struct TmdbClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    language: String,
    region: String,
}

impl TmdbClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            base_url: TMDB_BASE_URL.to_string(),
            api_key: api_key.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            region: DEFAULT_REGION.to_string(),
        }
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = region.to_uppercase();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        self
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, AppError> {
        if self.api_key.is_empty() {
            return Err(AppError::Lookup(
                "TMDb API key is not configured (set TMDB_API_KEY)".to_string(),
            ));
        }
        let url = format!("{}{}", self.base_url, path);
        log::debug!("TMDb request: {}", path);

        let response = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str()), ("language", self.language.as_str())])
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::Lookup(format!("Failed to call TMDb: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("TMDb {}", path)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Lookup(format!("TMDb returned {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Lookup(format!("Failed to parse TMDb response: {}", e)))
    }

    fn source_info(&self, media_type: MediaType, online_id: &str) -> SourceInfo {
        let kind = match media_type {
            MediaType::Movie => "movie",
            MediaType::Series => "tv",
        };
        SourceInfo {
            lookup_source: "TMDb".to_string(),
            source_url: format!("{}/{}/{}", TMDB_SITE_URL, kind, online_id),
        }
    }

    fn movie_details(&self, online_id: &str, details: MovieDetails) -> FetchedMedia {
        let certification = details
            .release_dates
            .results
            .iter()
            .find(|r| r.iso_3166_1 == self.region)
            .and_then(|r| {
                r.release_dates
                    .iter()
                    .filter_map(|d| non_empty(d.certification.clone()))
                    .next()
            });
        let crew_names = |jobs: &[&str]| -> Option<String> {
            let names: Vec<&str> = details
                .credits
                .crew
                .iter()
                .filter(|c| c.job.as_deref().is_some_and(|job| jobs.contains(&job)))
                .map(|c| c.name.as_str())
                .collect();
            (!names.is_empty()).then(|| dedup_join(&names))
        };

        let content = FetchedContent {
            title: Some(details.title.clone()),
            original_title: non_empty(details.original_title.clone()),
            year: details.release_date.as_deref().and_then(year_of),
            runtime: details.runtime.filter(|r| *r > 0),
            seasons: None,
            country: join_names(details.production_countries.iter().map(|c| c.name.as_str())),
            online_rating: details.vote_average,
            certification,
            release_date: non_empty(details.release_date.clone()),
            tagline: non_empty(details.tagline.clone()),
            plot: non_empty(details.overview.clone()),
            director: crew_names(&["Director"]),
            writer: crew_names(&["Screenplay", "Writer", "Story"]),
            poster_url: details
                .poster_path
                .as_deref()
                .map(|p| format!("{}{}", POSTER_BASE_URL, p)),
        };

        let cast = details
            .credits
            .cast
            .iter()
            .take(MAX_CAST)
            .map(|c| CastMember {
                online_id: Some(c.id.to_string()),
                name: c.name.clone(),
                character: non_empty(c.character.clone()),
                episodes: None,
            })
            .collect();

        FetchedMedia {
            media_type: MediaType::Movie,
            online_id: online_id.to_string(),
            content,
            lookup: self.source_info(MediaType::Movie, online_id),
            genres: Some(details.genres.iter().map(|g| g.name.clone()).collect()),
            languages: Some(details.spoken_languages.iter().map(|l| l.display_name()).collect()),
            cast,
        }
    }

    fn series_details(&self, online_id: &str, details: SeriesDetails) -> FetchedMedia {
        let certification = details
            .content_ratings
            .results
            .iter()
            .find(|r| r.iso_3166_1 == self.region)
            .and_then(|r| non_empty(r.rating.clone()));

        let content = FetchedContent {
            title: Some(details.name.clone()),
            original_title: non_empty(details.original_name.clone()),
            year: details.first_air_date.as_deref().and_then(year_of),
            runtime: None,
            seasons: details.number_of_seasons,
            country: join_names(details.origin_country.iter().map(String::as_str)),
            online_rating: details.vote_average,
            certification,
            release_date: non_empty(details.first_air_date.clone()),
            tagline: non_empty(details.tagline.clone()),
            plot: non_empty(details.overview.clone()),
            director: join_names(details.created_by.iter().map(|c| c.name.as_str())),
            writer: None,
            poster_url: details
                .poster_path
                .as_deref()
                .map(|p| format!("{}{}", POSTER_BASE_URL, p)),
        };

        let cast = details
            .aggregate_credits
            .cast
            .iter()
            .take(MAX_CAST)
            .map(|c| CastMember {
                online_id: Some(c.id.to_string()),
                name: c.name.clone(),
                character: join_names(
                    c.roles
                        .iter()
                        .filter_map(|r| r.character.as_deref())
                        .filter(|ch| !ch.trim().is_empty()),
                ),
                episodes: c.total_episode_count.map(|n| n.to_string()),
            })
            .collect();

        FetchedMedia {
            media_type: MediaType::Series,
            online_id: online_id.to_string(),
            content,
            lookup: self.source_info(MediaType::Series, online_id),
            genres: Some(details.genres.iter().map(|g| g.name.clone()).collect()),
            languages: Some(details.spoken_languages.iter().map(|l| l.display_name()).collect()),
            cast,
        }
    }
}

fn join_names<'a>(names: impl Iterator<Item = &'a str>) -> Option<String> {
    let names: Vec<&str> = names.collect();
    (!names.is_empty()).then(|| dedup_join(&names))
}

fn dedup_join(names: &[&str]) -> String {
    let mut unique: Vec<&str> = Vec::with_capacity(names.len());
    for &name in names {
        if !unique.contains(&name) {
            unique.push(name);
        }
    }
    unique.join(", ")
}

#[async_trait]
impl LookupProvider for TmdbClient {
    fn name(&self) -> &str {
        "TMDb"
    }

    fn source_label(&self) -> &str {
        "TMDb"
    }

    async fn search_media(&self, media_type: MediaType, title: &str) -> Result<Vec<SearchHit>, AppError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::Validation("Search title is required".to_string()));
        }
        let hits = match media_type {
            MediaType::Movie => {
                let page: SearchPage<MovieHit> =
                    self.get_json("/search/movie", &[("query", title)]).await?;
                page.results
                    .into_iter()
                    .map(|r| SearchHit {
                        year: r.release_date.as_deref().and_then(year_of),
                        title: r.title,
                        online_id: r.id.to_string(),
                    })
                    .collect::<Vec<_>>()
            }
            MediaType::Series => {
                let page: SearchPage<SeriesHit> =
                    self.get_json("/search/tv", &[("query", title)]).await?;
                page.results
                    .into_iter()
                    .map(|r| SearchHit {
                        year: r.first_air_date.as_deref().and_then(year_of),
                        title: r.name,
                        online_id: r.id.to_string(),
                    })
                    .collect::<Vec<_>>()
            }
        };
        log::info!("TMDb search '{}' ({}): {} results", title, media_type, hits.len());
        Ok(hits)
    }

    async fn get_media_details(&self, media_type: MediaType, online_id: &str) -> Result<FetchedMedia, AppError> {
        match media_type {
            MediaType::Movie => {
                let details: MovieDetails = self
                    .get_json(
                        &format!("/movie/{}", online_id),
                        &[("append_to_response", "credits,release_dates")],
                    )
                    .await?;
                Ok(self.movie_details(online_id, details))
            }
            MediaType::Series => {
                let details: SeriesDetails = self
                    .get_json(
                        &format!("/tv/{}", online_id),
                        &[("append_to_response", "aggregate_credits,content_ratings")],
                    )
                    .await?;
                Ok(self.series_details(online_id, details))
            }
        }
    }

    async fn get_season_episodes(&self, online_id: &str, season: i64) -> Result<Vec<NewEpisode>, AppError> {
        let details: SeasonDetails = self
            .get_json(&format!("/tv/{}/season/{}", online_id, season), &[])
            .await?;
        Ok(details
            .episodes
            .into_iter()
            .map(|e| NewEpisode {
                season: e.season_number.unwrap_or(season),
                episode: e.episode_number,
                title: non_empty(e.name),
                plot: non_empty(e.overview),
                release_date: non_empty(e.air_date),
            })
            .collect())
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct SearchPage<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct MovieHit {
    id: u64,
    title: String,
    release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SeriesHit {
    id: u64,
    name: String,
    first_air_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpokenLanguage {
    #[serde(default)]
    english_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    iso_639_1: Option<String>,
}

impl SpokenLanguage {
    fn display_name(&self) -> String {
        non_empty(self.english_name.clone())
            .or_else(|| non_empty(self.name.clone()))
            .or_else(|| self.iso_639_1.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
struct Credits {
    #[serde(default)]
    cast: Vec<CastCredit>,
    #[serde(default)]
    crew: Vec<CrewCredit>,
}

#[derive(Debug, Deserialize)]
struct CastCredit {
    id: u64,
    name: String,
    character: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CrewCredit {
    name: String,
    job: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ReleaseDates {
    #[serde(default)]
    results: Vec<CountryReleases>,
}

#[derive(Debug, Deserialize)]
struct CountryReleases {
    iso_3166_1: String,
    #[serde(default)]
    release_dates: Vec<ReleaseDate>,
}

#[derive(Debug, Deserialize)]
struct ReleaseDate {
    certification: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MovieDetails {
    title: String,
    original_title: Option<String>,
    release_date: Option<String>,
    runtime: Option<i64>,
    overview: Option<String>,
    tagline: Option<String>,
    poster_path: Option<String>,
    vote_average: Option<f64>,
    #[serde(default)]
    production_countries: Vec<Named>,
    #[serde(default)]
    genres: Vec<Named>,
    #[serde(default)]
    spoken_languages: Vec<SpokenLanguage>,
    #[serde(default)]
    credits: Credits,
    #[serde(default)]
    release_dates: ReleaseDates,
}

#[derive(Debug, Default, Deserialize)]
struct AggregateCredits {
    #[serde(default)]
    cast: Vec<AggregateCast>,
}

#[derive(Debug, Deserialize)]
struct AggregateCast {
    id: u64,
    name: String,
    #[serde(default)]
    roles: Vec<Role>,
    total_episode_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Role {
    character: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ContentRatings {
    #[serde(default)]
    results: Vec<ContentRating>,
}

#[derive(Debug, Deserialize)]
struct ContentRating {
    iso_3166_1: String,
    rating: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SeriesDetails {
    name: String,
    original_name: Option<String>,
    first_air_date: Option<String>,
    overview: Option<String>,
    tagline: Option<String>,
    poster_path: Option<String>,
    vote_average: Option<f64>,
    number_of_seasons: Option<i64>,
    #[serde(default)]
    origin_country: Vec<String>,
    #[serde(default)]
    created_by: Vec<Named>,
    #[serde(default)]
    genres: Vec<Named>,
    #[serde(default)]
    spoken_languages: Vec<SpokenLanguage>,
    #[serde(default)]
    aggregate_credits: AggregateCredits,
    #[serde(default)]
    content_ratings: ContentRatings,
}

#[derive(Debug, Deserialize)]
struct SeasonDetails {
    #[serde(default)]
    episodes: Vec<SeasonEpisode>,
}

#[derive(Debug, Deserialize)]
struct SeasonEpisode {
    episode_number: i64,
    season_number: Option<i64>,
    name: Option<String>,
    overview: Option<String>,
    air_date: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> TmdbClient {
        TmdbClient::new("test-key").with_region("gb")
    }

    #[test]
    fn movie_payload_maps_to_fetched_media() {
        let json = r#"{
            "title": "Arrival",
            "original_title": "Arrival",
            "release_date": "2016-11-10",
            "runtime": 116,
            "overview": "Linguist Louise Banks leads an elite team.",
            "tagline": "Why are they here?",
            "poster_path": "/x2FJsf1ElAgr63Y3PNPtJrcmpoe.jpg",
            "vote_average": 7.6,
            "production_countries": [{"name": "United States of America"}],
            "genres": [{"name": "Drama"}, {"name": "Science Fiction"}],
            "spoken_languages": [{"english_name": "English", "iso_639_1": "en"}],
            "credits": {
                "cast": [{"id": 9273, "name": "Amy Adams", "character": "Louise Banks"}],
                "crew": [
                    {"name": "Denis Villeneuve", "job": "Director"},
                    {"name": "Eric Heisserer", "job": "Screenplay"},
                    {"name": "Ted Chiang", "job": "Story"}
                ]
            },
            "release_dates": {"results": [
                {"iso_3166_1": "US", "release_dates": [{"certification": "PG-13"}]},
                {"iso_3166_1": "GB", "release_dates": [{"certification": ""}, {"certification": "12A"}]}
            ]}
        }"#;
        let details: MovieDetails = serde_json::from_str(json).unwrap();
        let fetched = client().movie_details("329865", details);

        assert_eq!(fetched.content.year, Some(2016));
        assert_eq!(fetched.content.certification.as_deref(), Some("12A"));
        assert_eq!(fetched.content.director.as_deref(), Some("Denis Villeneuve"));
        assert_eq!(fetched.content.writer.as_deref(), Some("Eric Heisserer, Ted Chiang"));
        assert_eq!(
            fetched.content.poster_url.as_deref(),
            Some("https://image.tmdb.org/t/p/w500/x2FJsf1ElAgr63Y3PNPtJrcmpoe.jpg")
        );
        assert_eq!(fetched.genres, Some(vec!["Drama".to_string(), "Science Fiction".to_string()]));
        assert_eq!(fetched.languages, Some(vec!["English".to_string()]));
        assert_eq!(fetched.cast[0].online_id.as_deref(), Some("9273"));
        assert_eq!(fetched.lookup.source_url, "https://www.themoviedb.org/movie/329865");
    }

    #[test]
    fn series_payload_maps_seasons_and_episode_counts() {
        let json = r#"{
            "name": "Dark",
            "original_name": "Dark",
            "first_air_date": "2017-12-01",
            "number_of_seasons": 3,
            "origin_country": ["DE"],
            "created_by": [{"name": "Baran bo Odar"}, {"name": "Jantje Friese"}],
            "genres": [{"name": "Drama"}],
            "aggregate_credits": {"cast": [
                {"id": 1, "name": "Louis Hofmann", "roles": [{"character": "Jonas Kahnwald"}], "total_episode_count": 26}
            ]}
        }"#;
        let details: SeriesDetails = serde_json::from_str(json).unwrap();
        let fetched = client().series_details("70523", details);

        assert_eq!(fetched.content.seasons, Some(3));
        assert_eq!(fetched.content.runtime, None);
        assert_eq!(fetched.content.director.as_deref(), Some("Baran bo Odar, Jantje Friese"));
        assert_eq!(fetched.cast[0].episodes.as_deref(), Some("26"));
        assert_eq!(fetched.languages, Some(vec![]));
    }

    #[tokio::test]
    async fn missing_api_key_is_a_lookup_error() {
        let client = TmdbClient::new("").with_base_url("http://127.0.0.1:9");
        let err = client.search_media(MediaType::Movie, "Alien").await.unwrap_err();
        assert_eq!(err.kind(), "lookup");
    }
}
