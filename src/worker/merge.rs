use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

use super::poster;
use super::JobEvent;
use crate::database::{
    records, Database, EpisodeMergeOutcome, MediaType, NewEpisode, ReconcileOutcome,
    UpdateRequest,
};
use crate::error::AppError;
use crate::lookup::{FetchedMedia, LookupProvider};

#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeReport {
    pub id: i64,
    pub episodes: EpisodeMergeOutcome,
    pub cast: usize,
    pub genres: ReconcileOutcome,
    pub languages: ReconcileOutcome,
    pub poster: Option<PathBuf>,
}

async fn report(progress: Option<&mpsc::Sender<JobEvent>>, message: String) {
    log::info!("{}", message);
    if let Some(tx) = progress {
        let _ = tx.send(JobEvent::Progress(message)).await;
    }
}

/// Save a fetched record over the local record `local_id`.
///
/// Season episode lists and the poster are fetched first. All database
/// writes then run in one transaction. The poster is downloaded next to its
/// final path and only moved into place once the transaction commits.
pub async fn merge_fetched_details(
    db: &Database,
    provider: &dyn LookupProvider,
    local_id: i64,
    fetched: &FetchedMedia,
    poster_root: Option<&Path>,
    progress: Option<&mpsc::Sender<JobEvent>>,
) -> Result<MergeReport, AppError> {
    let media_type = fetched.media_type;
    let request = UpdateRequest {
        patch: fetched.content.to_patch(media_type, &fetched.online_id)?,
        source_info: Some(fetched.lookup.clone()),
        episode: None,
        genres: fetched.genres.clone(),
        languages: fetched.languages.clone(),
    };

    let mut episodes: Vec<NewEpisode> = Vec::new();
    if media_type == MediaType::Series {
        let seasons = fetched.content.seasons.unwrap_or(0);
        for season in 1..=seasons {
            report(
                progress,
                format!("Fetching season {} of {} from {}", season, seasons, provider.name()),
            )
            .await;
            episodes.extend(provider.get_season_episodes(&fetched.online_id, season).await?);
        }
    }

    let mut staged_poster: Option<(PathBuf, PathBuf)> = None;
    if let (Some(root), Some(url)) = (poster_root, fetched.content.poster_url.as_deref()) {
        report(progress, "Downloading poster".to_string()).await;
        let target = poster::poster_path(root, media_type, local_id);
        let staging = target.with_extension("jpg.part");
        match poster::download_poster(url, &staging).await {
            Ok(_) => staged_poster = Some((staging, target)),
            Err(e) => log::warn!("Skipping poster for {} {}: {}", media_type, local_id, e),
        }
    }

    report(progress, format!("Saving {} {}", media_type, local_id)).await;
    let saved = db.with_transaction(|conn| {
        let outcome = records::update_record(conn, media_type, local_id, &request)?;
        let episodes = if episodes.is_empty() {
            EpisodeMergeOutcome::default()
        } else {
            records::merge_episodes(conn, local_id, &episodes)?
        };
        let cast = records::replace_cast(
            conn,
            media_type,
            local_id,
            &fetched.cast,
            Some(&fetched.lookup),
        )?;
        Ok((outcome, episodes, cast))
    });

    let (outcome, episodes, cast) = match saved {
        Ok(saved) => saved,
        Err(e) => {
            if let Some((staging, _)) = &staged_poster {
                let _ = std::fs::remove_file(staging);
            }
            return Err(e.into());
        }
    };

    let poster = match staged_poster {
        Some((staging, target)) => match std::fs::rename(&staging, &target) {
            Ok(()) => Some(target),
            Err(e) => {
                log::warn!("Failed to move poster into place: {}", e);
                let _ = std::fs::remove_file(&staging);
                None
            }
        },
        None => None,
    };

    let merged = MergeReport {
        id: local_id,
        episodes,
        cast,
        genres: outcome.genres,
        languages: outcome.languages,
        poster,
    };
    log::info!(
        "Merged {} {} from {}: {} episodes added, {} updated, {} cast",
        media_type,
        local_id,
        provider.name(),
        merged.episodes.inserted,
        merged.episodes.updated,
        merged.cast
    );
    Ok(merged)
}
