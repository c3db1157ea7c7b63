use std::sync::Arc;

use super::settings::DEFAULT_LOOKUP_KEY;
use super::AppContext;
use crate::database::MediaType;
use crate::error::AppError;
use crate::lookup::{FetchedMedia, LookupProvider, SearchHit};
use crate::templates::TemplateKind;
use crate::worker::{self, JobOutput, MergeReport};

/// Named template, else the stored preference, else the first registered lookup.
pub fn resolve_lookup(ctx: &AppContext, name: Option<&str>) -> Result<Arc<dyn LookupProvider>, AppError> {
    let name = match name {
        Some(name) => name.to_string(),
        None => match ctx.db.get_setting(DEFAULT_LOOKUP_KEY)? {
            Some(stored) => stored,
            None => ctx.templates.default_name(TemplateKind::Lookup)?.to_string(),
        },
    };
    ctx.templates.lookup(&name, &ctx.config)
}

fn unexpected(output: JobOutput) -> AppError {
    AppError::Other(format!("Unexpected job output: {:?}", output))
}

pub async fn search_media<F: FnMut(&str)>(
    ctx: &AppContext,
    template: Option<&str>,
    media_type: MediaType,
    title: &str,
    on_progress: F,
) -> Result<Vec<SearchHit>, AppError> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("Search title is required".to_string()));
    }
    let provider = resolve_lookup(ctx, template)?;
    log::info!("search_media '{}' ({}) via {}", title, media_type, provider.name());
    match worker::spawn_search(provider, media_type, title.trim().to_string())
        .wait(on_progress)
        .await?
    {
        JobOutput::Search(hits) => Ok(hits),
        other => Err(unexpected(other)),
    }
}

pub async fn fetch_details<F: FnMut(&str)>(
    ctx: &AppContext,
    template: Option<&str>,
    media_type: MediaType,
    online_id: &str,
    on_progress: F,
) -> Result<FetchedMedia, AppError> {
    let provider = resolve_lookup(ctx, template)?;
    match worker::spawn_fetch_details(provider, media_type, online_id.to_string())
        .wait(on_progress)
        .await?
    {
        JobOutput::Details(fetched) => Ok(*fetched),
        other => Err(unexpected(other)),
    }
}

/// Fetch a title from a provider and merge it into the local record `local_id`.
pub async fn fetch_and_save<F: FnMut(&str)>(
    ctx: &AppContext,
    template: Option<&str>,
    media_type: MediaType,
    local_id: i64,
    online_id: &str,
    download_poster: bool,
    mut on_progress: F,
) -> Result<MergeReport, AppError> {
    let provider = resolve_lookup(ctx, template)?;
    let fetched = match worker::spawn_fetch_details(provider.clone(), media_type, online_id.to_string())
        .wait(&mut on_progress)
        .await?
    {
        JobOutput::Details(fetched) => *fetched,
        other => return Err(unexpected(other)),
    };

    let poster_root = download_poster.then(|| ctx.poster_root().to_path_buf());
    match worker::spawn_save(ctx.db.clone(), provider, local_id, fetched, poster_root)
        .wait(&mut on_progress)
        .await?
    {
        JobOutput::Saved(report) => Ok(report),
        other => Err(unexpected(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::SourceInfo;
    use crate::lookup::offline::OfflineCatalog;
    use crate::lookup::FetchedContent;
    use crate::templates::REGISTRY_FILE;
    use tempfile::TempDir;

    fn setup_ctx() -> (AppContext, TempDir) {
        let temp = TempDir::new().unwrap();
        let templates = temp.path().join("templates");
        std::fs::create_dir_all(&templates).unwrap();
        std::fs::write(
            templates.join(REGISTRY_FILE),
            r#"{"data": [{"name": "Shelf", "kind": "lookup", "module": "offline", "source": "shelf.json"}]}"#,
        )
        .unwrap();
        let catalog = OfflineCatalog {
            media: vec![FetchedMedia {
                media_type: MediaType::Movie,
                online_id: "m1".into(),
                content: FetchedContent {
                    title: Some("Heat".into()),
                    year: Some(1995),
                    director: Some("Michael Mann".into()),
                    ..Default::default()
                },
                lookup: SourceInfo {
                    lookup_source: "Shelf".into(),
                    source_url: String::new(),
                },
                genres: Some(vec!["Crime".into()]),
                languages: Some(vec!["English".into()]),
                cast: vec![],
            }],
            seasons: vec![],
        };
        std::fs::write(templates.join("shelf.json"), serde_json::to_string(&catalog).unwrap()).unwrap();

        let config = AppConfig {
            database_path: temp.path().join("test.db"),
            poster_path: temp.path().join("posters"),
            templates_path: templates,
            ..AppConfig::default()
        };
        (AppContext::open(config).unwrap(), temp)
    }

    #[tokio::test]
    async fn search_uses_first_registered_lookup() {
        let (ctx, _temp) = setup_ctx();
        let hits = search_media(&ctx, None, MediaType::Movie, "heat", |_| {}).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].year, Some(1995));
    }

    #[tokio::test]
    async fn blank_search_is_rejected() {
        let (ctx, _temp) = setup_ctx();
        let err = search_media(&ctx, None, MediaType::Movie, " ", |_| {}).await.unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[tokio::test]
    async fn fetch_and_save_merges_into_local_record() {
        let (ctx, _temp) = setup_ctx();
        let id = ctx.db.add_new_media(MediaType::Movie, "heat").unwrap();
        let mut progress = Vec::new();

        let report = fetch_and_save(&ctx, Some("Shelf"), MediaType::Movie, id, "m1", false, |m| {
            progress.push(m.to_string())
        })
        .await
        .unwrap();
        assert_eq!(report.genres.added, 1);
        assert!(!progress.is_empty());

        let details = ctx.db.get_movie_details(id).unwrap();
        assert_eq!(details.movie.director.as_deref(), Some("Michael Mann"));
        assert_eq!(details.movie.lookup_source.as_deref(), Some("Shelf"));
        assert_eq!(details.languages, vec!["English"]);
    }

    #[tokio::test]
    async fn unknown_template_is_reported() {
        let (ctx, _temp) = setup_ctx();
        let err = fetch_details(&ctx, Some("IMDb"), MediaType::Movie, "m1", |_| {}).await.unwrap_err();
        assert_eq!(err.kind(), "template");
    }
}
