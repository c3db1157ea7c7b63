use serde::Serialize;

use super::{build_patch, media_table, AppContext};
use crate::database::{
    BulkAddReport, BulkOutcome, BulkUpdate, Episode, EpisodeSummary, MediaFilters, MediaSummary, MediaType,
    MovieDetails, NewEpisode, RecordTable, SeriesDetails, SourceInfo, UpdateOutcome, UpdateRequest, WatchOutcome,
};
use crate::error::AppError;
use crate::worker::poster;

#[derive(Debug, Serialize)]
pub struct MediaListResponse {
    pub media: Vec<MediaSummary>,
    pub shown: usize,
    pub total: i64,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum MediaDetails {
    Movie(Box<MovieDetails>),
    Series(Box<SeriesDetails>),
}

/// Changes for one record, as collected from the command line.
#[derive(Debug, Default, Clone)]
pub struct MediaChanges {
    pub fields: Vec<(String, String)>,
    pub source: Option<SourceInfo>,
    pub episode: Option<(i64, Vec<(String, String)>)>,
    pub genres: Option<Vec<String>>,
    pub languages: Option<Vec<String>>,
}

/// Add one record per title.
pub fn add_media(ctx: &AppContext, media_type: MediaType, titles: &[String]) -> Result<BulkAddReport, AppError> {
    log::info!("add_media: {} {} titles", titles.len(), media_type);
    let report = ctx.db.add_new_titles(media_type, titles)?;
    if report.added.is_empty() && report.failed.is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    Ok(report)
}

pub fn list_media(ctx: &AppContext, media_type: MediaType, filters: &MediaFilters) -> Result<MediaListResponse, AppError> {
    log::info!("list_media {} with {} filters", media_type, filters.criteria().len());
    let (media, total) = ctx.db.get_media(media_type, filters)?;
    Ok(MediaListResponse {
        shown: media.len(),
        media,
        total,
    })
}

pub fn get_media_details(ctx: &AppContext, media_type: MediaType, id: i64) -> Result<MediaDetails, AppError> {
    match media_type {
        MediaType::Movie => Ok(MediaDetails::Movie(Box::new(ctx.db.get_movie_details(id)?))),
        MediaType::Series => Ok(MediaDetails::Series(Box::new(ctx.db.get_series_details(id)?))),
    }
}

pub fn update_media(
    ctx: &AppContext,
    media_type: MediaType,
    id: i64,
    changes: MediaChanges,
) -> Result<UpdateOutcome, AppError> {
    log::info!("update_media {} {}: {} fields", media_type, id, changes.fields.len());
    let patch = build_patch(media_table(media_type), &changes.fields)?;
    let mut request = UpdateRequest::new(patch);
    if let Some(source) = changes.source {
        request = request.source(source);
    }
    if let Some((episode_id, fields)) = &changes.episode {
        request = request.episode(*episode_id, build_patch(RecordTable::Episodes, fields)?);
    }
    request.genres = changes.genres;
    request.languages = changes.languages;

    ctx.db.update_record(media_type, id, &request).map_err(|e| {
        log::error!("Failed to update {} {}: {}", media_type, id, e);
        AppError::from(e)
    })
}

pub fn bulk_update_media(
    ctx: &AppContext,
    media_type: MediaType,
    ids: Vec<i64>,
    fields: &[(String, String)],
    genre: Option<String>,
) -> Result<BulkOutcome, AppError> {
    log::info!("bulk_update_media {} on {} records", media_type, ids.len());
    let update = BulkUpdate {
        ids,
        patch: build_patch(media_table(media_type), fields)?,
        genre,
    };
    ctx.db.bulk_update(media_type, &update).map_err(AppError::from)
}

/// Delete a record and its poster file.
pub fn delete_media(ctx: &AppContext, media_type: MediaType, id: i64) -> Result<bool, AppError> {
    let deleted = ctx.db.delete_media(media_type, id)?;
    if deleted {
        if let Err(e) = poster::remove_poster(ctx.poster_root(), media_type, id) {
            log::warn!("Failed to remove poster for {} {}: {}", media_type, id, e);
        }
    }
    Ok(deleted)
}

pub fn add_episode(ctx: &AppContext, series_id: i64, episode: &NewEpisode) -> Result<i64, AppError> {
    log::info!("add_episode S{}E{} to series {}", episode.season, episode.episode, series_id);
    ctx.db.add_new_episode(series_id, episode).map_err(AppError::from)
}

pub fn update_episode(ctx: &AppContext, episode_id: i64, fields: &[(String, String)]) -> Result<(), AppError> {
    let patch = build_patch(RecordTable::Episodes, fields)?;
    ctx.db.update_episode(episode_id, &patch).map_err(AppError::from)
}

pub fn delete_episodes(ctx: &AppContext, ids: &[i64]) -> Result<usize, AppError> {
    log::info!("delete_episodes {:?}", ids);
    ctx.db.delete_episodes(ids).map_err(AppError::from)
}

/// Mark episodes watched or unwatched, optionally the series as well.
pub fn set_episodes_watched(
    ctx: &AppContext,
    series_id: i64,
    episode_ids: &[i64],
    watched: bool,
    mark_series: bool,
) -> Result<WatchOutcome, AppError> {
    ctx.db
        .set_episodes_watched(series_id, episode_ids, watched, mark_series)
        .map_err(|e| {
            log::error!("Failed to update watch state of series {}: {}", series_id, e);
            AppError::from(e)
        })
}

pub fn list_episodes(ctx: &AppContext, series_id: i64, season: Option<i64>) -> Result<Vec<EpisodeSummary>, AppError> {
    ctx.db.get_series_episodes(series_id, season).map_err(AppError::from)
}

pub fn get_episode_details(ctx: &AppContext, episode_id: i64) -> Result<Episode, AppError> {
    ctx.db.get_episode_details(episode_id).map_err(AppError::from)
}

pub fn list_discs(ctx: &AppContext, media_type: MediaType) -> Result<Vec<String>, AppError> {
    ctx.db.get_discs(media_type).map_err(AppError::from)
}
