//! Lookup provider backed by a local JSON catalog.
//!
//! Useful without network access and as a deterministic provider in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{FetchedMedia, LookupProvider, SearchHit};
use crate::database::{MediaType, NewEpisode};
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineSeason {
    pub online_id: String,
    pub season: i64,
    pub episodes: Vec<NewEpisode>,
}

/// On-disk shape of an offline catalog file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OfflineCatalog {
    #[serde(default)]
    pub media: Vec<FetchedMedia>,
    #[serde(default)]
    pub seasons: Vec<OfflineSeason>,
}

pub struct OfflineProvider {
    name: String,
    catalog: OfflineCatalog,
}

impl OfflineProvider {
    pub fn new(name: &str, catalog: OfflineCatalog) -> Self {
        Self {
            name: name.to_string(),
            catalog,
        }
    }

    pub fn from_file(name: &str, path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Lookup(format!("Failed to read {}: {}", path.display(), e)))?;
        let catalog: OfflineCatalog = serde_json::from_str(&content)?;
        log::info!(
            "Loaded offline catalog {} ({} titles)",
            path.display(),
            catalog.media.len()
        );
        Ok(Self::new(name, catalog))
    }
}

#[async_trait]
impl LookupProvider for OfflineProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_label(&self) -> &str {
        &self.name
    }

    async fn search_media(&self, media_type: MediaType, title: &str) -> Result<Vec<SearchHit>, AppError> {
        let needle = title.trim().to_lowercase();
        Ok(self
            .catalog
            .media
            .iter()
            .filter(|m| m.media_type == media_type)
            .filter_map(|m| {
                let found = m.content.title.as_deref()?;
                found.to_lowercase().contains(&needle).then(|| SearchHit {
                    title: found.to_string(),
                    year: m.content.year,
                    online_id: m.online_id.clone(),
                })
            })
            .collect())
    }

    async fn get_media_details(&self, media_type: MediaType, online_id: &str) -> Result<FetchedMedia, AppError> {
        self.catalog
            .media
            .iter()
            .find(|m| m.media_type == media_type && m.online_id == online_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("{} {} in {}", media_type, online_id, self.name)))
    }

    async fn get_season_episodes(&self, online_id: &str, season: i64) -> Result<Vec<NewEpisode>, AppError> {
        Ok(self
            .catalog
            .seasons
            .iter()
            .find(|s| s.online_id == online_id && s.season == season)
            .map(|s| s.episodes.clone())
            .unwrap_or_default())
    }
}
