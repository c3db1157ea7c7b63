//! Static JSON data for a browsable catalog site.
//!
//! Movies produce a `summary.json` with per-quality counts, one
//! `dashboard_<quality>.json` list per quality and one `m<id>.json` detail
//! file per title. Series produce a `shows.json` summary and one `s<id>.json`
//! per series holding its episodes.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use super::publish::Publisher;
use crate::database::{Database, MediaType, MovieExportRow, SeriesExportRow};
use crate::error::AppError;

const NO_QUALITY: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualitySummary {
    pub quality: String,
    pub total: usize,
    pub to_burn: usize,
    pub to_burn_pct: f64,
    pub unseen: usize,
    pub unseen_pct: f64,
}

#[derive(Debug, Serialize)]
struct DashboardEntry<'a> {
    id: String,
    title: &'a str,
    year: Option<i64>,
    genres: Option<&'a str>,
    watched: bool,
    to_burn: bool,
    backup_disc: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct MovieDetail<'a> {
    id: String,
    external_id: Option<&'a str>,
    title: &'a str,
    year: Option<i64>,
    genres: Option<&'a str>,
    watched: bool,
    to_burn: bool,
    online_rating: Option<f64>,
    rating: Option<f64>,
    backup_disc: Option<&'a str>,
    size: Option<&'a str>,
    poster_url: Option<&'a str>,
    plot: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShowSummary {
    pub id: String,
    pub title: String,
    pub seasons: usize,
    pub episodes: usize,
}

#[derive(Debug, Serialize)]
struct EpisodeEntry<'a> {
    season: i64,
    episode: Option<i64>,
    title: Option<&'a str>,
    plot: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ShowDetail<'a> {
    #[serde(flatten)]
    summary: &'a ShowSummary,
    external_id: Option<&'a str>,
    online_rating: Option<f64>,
    poster_url: Option<&'a str>,
    plot: Option<&'a str>,
    episode_list: Vec<EpisodeEntry<'a>>,
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

/// Last path segment of a lookup URL, e.g. `tt0113277` from an IMDb title link.
fn external_id(source_url: Option<&str>) -> Option<&str> {
    source_url
        .map(|url| url.trim().trim_end_matches('/'))
        .filter(|url| !url.is_empty())
        .and_then(|url| url.rsplit('/').next())
}

/// File-name friendly form of a quality name.
fn slug(quality: &str) -> String {
    quality
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

fn quality_of(movie: &MovieExportRow) -> &str {
    movie
        .quality
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .unwrap_or(NO_QUALITY)
}

/// One summary row per quality, in name order.
pub fn summarize_movies(movies: &[MovieExportRow]) -> Vec<QualitySummary> {
    let mut groups: BTreeMap<&str, Vec<&MovieExportRow>> = BTreeMap::new();
    for movie in movies {
        groups.entry(quality_of(movie)).or_default().push(movie);
    }
    groups
        .into_iter()
        .map(|(quality, rows)| {
            let total = rows.len();
            let to_burn = rows.iter().filter(|m| m.to_burn).count();
            let unseen = rows.iter().filter(|m| !m.watched).count();
            QualitySummary {
                quality: quality.to_string(),
                total,
                to_burn,
                to_burn_pct: percent(to_burn, total),
                unseen,
                unseen_pct: percent(unseen, total),
            }
        })
        .collect()
}

/// Season and episode counts per series. Rows of one series are adjacent.
pub fn summarize_series(rows: &[SeriesExportRow]) -> Vec<ShowSummary> {
    let mut shows: Vec<ShowSummary> = Vec::new();
    let mut seasons: Vec<i64> = Vec::new();
    for row in rows {
        let id = format!("s{}", row.id);
        if shows.last().map(|s| &s.id) != Some(&id) {
            seasons.clear();
            shows.push(ShowSummary {
                id,
                title: row.title.clone(),
                seasons: 0,
                episodes: 0,
            });
        }
        if let (Some(show), Some(season)) = (shows.last_mut(), row.episode_season) {
            show.episodes += 1;
            if !seasons.contains(&season) {
                seasons.push(season);
                show.seasons += 1;
            }
        }
    }
    shows
}

/// Builds the catalog site data in a staging directory and copies it to a destination.
pub struct CatalogSitePublisher {
    name: String,
    staging_dir: PathBuf,
    destination: Option<PathBuf>,
    generated: Option<(MediaType, Vec<PathBuf>)>,
}

impl CatalogSitePublisher {
    pub fn new(name: &str, staging_dir: &Path, destination: Option<&Path>) -> Self {
        Self {
            name: name.to_string(),
            staging_dir: staging_dir.to_path_buf(),
            destination: destination.map(Path::to_path_buf),
            generated: None,
        }
    }

    fn write<T: Serialize + ?Sized>(
        &self,
        dir: &Path,
        file_name: &str,
        value: &T,
        written: &mut Vec<PathBuf>,
    ) -> Result<(), AppError> {
        let path = dir.join(file_name);
        let writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(writer, value)?;
        written.push(path);
        Ok(())
    }

    fn generate_movies(&self, movies: &[MovieExportRow], dir: &Path) -> Result<Vec<PathBuf>, AppError> {
        let mut written = Vec::new();
        let summary = summarize_movies(movies);
        self.write(dir, "summary.json", &summary, &mut written)?;

        for row in &summary {
            let entries: Vec<DashboardEntry> = movies
                .iter()
                .filter(|m| quality_of(m) == row.quality)
                .map(|m| DashboardEntry {
                    id: format!("m{}", m.id),
                    title: &m.title,
                    year: m.year,
                    genres: m.genres.as_deref(),
                    watched: m.watched,
                    to_burn: m.to_burn,
                    backup_disc: m.backup_disc.as_deref(),
                })
                .collect();
            self.write(dir, &format!("dashboard_{}.json", slug(&row.quality)), &entries, &mut written)?;
        }

        for m in movies {
            let detail = MovieDetail {
                id: format!("m{}", m.id),
                external_id: external_id(m.source_url.as_deref()),
                title: &m.title,
                year: m.year,
                genres: m.genres.as_deref(),
                watched: m.watched,
                to_burn: m.to_burn,
                online_rating: m.online_rating,
                rating: m.rating,
                backup_disc: m.backup_disc.as_deref(),
                size: m.size.as_deref(),
                poster_url: m.poster_url.as_deref(),
                plot: m.plot.as_deref(),
            };
            self.write(dir, &format!("m{}.json", m.id), &detail, &mut written)?;
        }
        Ok(written)
    }

    fn generate_series(&self, rows: &[SeriesExportRow], dir: &Path) -> Result<Vec<PathBuf>, AppError> {
        let mut written = Vec::new();
        let shows = summarize_series(rows);
        self.write(dir, "shows.json", &shows, &mut written)?;

        for show in &shows {
            let series_rows: Vec<&SeriesExportRow> = rows
                .iter()
                .filter(|r| format!("s{}", r.id) == show.id)
                .collect();
            let Some(first) = series_rows.first() else {
                continue;
            };
            let detail = ShowDetail {
                summary: show,
                external_id: external_id(first.source_url.as_deref()),
                online_rating: first.online_rating,
                poster_url: first.poster_url.as_deref(),
                plot: first.plot.as_deref(),
                episode_list: series_rows
                    .iter()
                    .filter_map(|r| {
                        r.episode_season.map(|season| EpisodeEntry {
                            season,
                            episode: r.episode,
                            title: r.episode_title.as_deref(),
                            plot: r.episode_plot.as_deref(),
                        })
                    })
                    .collect(),
            };
            self.write(dir, &format!("{}.json", show.id), &detail, &mut written)?;
        }
        Ok(written)
    }
}

impl Publisher for CatalogSitePublisher {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate_content(&mut self, db: &Database, media_type: MediaType) -> Result<usize, AppError> {
        let dir = self.staging_dir.join(media_type.poster_dir());
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        std::fs::create_dir_all(&dir)?;

        let (titles, written) = match media_type {
            MediaType::Movie => {
                let movies = db.export_movies()?;
                (movies.len(), self.generate_movies(&movies, &dir)?)
            }
            MediaType::Series => {
                let rows = db.export_series()?;
                let written = self.generate_series(&rows, &dir)?;
                (summarize_series(&rows).len(), written)
            }
        };
        log::info!(
            "{}: generated {} files for {} {} titles in {:?}",
            self.name,
            written.len(),
            titles,
            media_type,
            dir
        );
        self.generated = Some((media_type, written));
        Ok(titles)
    }

    fn publish_content(&mut self) -> Result<PathBuf, AppError> {
        let (media_type, files) = self
            .generated
            .as_ref()
            .ok_or_else(|| AppError::Validation("Nothing generated to publish".to_string()))?;
        let destination = self
            .destination
            .as_ref()
            .ok_or_else(|| AppError::Template(format!("{} has no publish destination configured", self.name)))?
            .join(media_type.poster_dir());

        std::fs::create_dir_all(&destination)?;
        for file in files {
            let file_name = file
                .file_name()
                .ok_or_else(|| AppError::Other(format!("Invalid data file path {:?}", file)))?;
            std::fs::copy(file, destination.join(file_name))?;
        }
        log::info!("{}: published {} files to {:?}", self.name, files.len(), destination);
        Ok(destination)
    }
}
