use serde::Serialize;
use std::path::{Path, PathBuf};

use super::settings::DEFAULT_PUBLISH_KEY;
use super::AppContext;
use crate::database::MediaType;
use crate::error::AppError;
use crate::templates::{ColumnMap, ImportReport, TemplateKind};

#[derive(Debug, Serialize)]
pub struct PublishResult {
    pub items: usize,
    pub destination: PathBuf,
}

pub fn export_media(ctx: &AppContext, template: &str, media_type: MediaType, path: &Path) -> Result<usize, AppError> {
    let exporter = ctx.templates.exporter(template)?;
    log::info!("export_media {} via {} to {:?}", media_type, exporter.name(), path);
    exporter.export(&ctx.db, media_type, path).map_err(|e| {
        log::error!("Export failed: {}", e);
        e
    })
}

pub fn import_media(
    ctx: &AppContext,
    template: &str,
    media_type: MediaType,
    path: &Path,
    column_map: &ColumnMap,
) -> Result<ImportReport, AppError> {
    if !path.exists() {
        return Err(AppError::NotFound(format!("{}", path.display())));
    }
    let importer = ctx.templates.importer(template)?;
    log::info!("import_media {} via {} from {:?}", media_type, importer.name(), path);
    importer
        .import_media(&ctx.db, media_type, path, column_map)
        .map_err(|e| {
            log::error!("Import failed: {}", e);
            e
        })
}

/// Generate and publish with the named publisher, or the stored default.
pub fn publish_media(ctx: &AppContext, template: Option<&str>, media_type: MediaType) -> Result<PublishResult, AppError> {
    let name = match template {
        Some(name) => name.to_string(),
        None => match ctx.db.get_setting(DEFAULT_PUBLISH_KEY)? {
            Some(stored) => stored,
            None => ctx.templates.default_name(TemplateKind::Publish)?.to_string(),
        },
    };
    let mut publisher = ctx.templates.publisher(&name, &ctx.config)?;
    let items = publisher.generate_content(&ctx.db, media_type)?;
    let destination = publisher.publish_content()?;
    Ok(PublishResult { items, destination })
}

/// Parse `source=catalog` column map arguments.
pub fn parse_column_map(args: &[String]) -> Result<ColumnMap, AppError> {
    Ok(super::parse_assignments(args)?.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::{MediaFilters, NewEpisode};
    use tempfile::TempDir;

    fn setup_ctx() -> (AppContext, TempDir) {
        let temp = TempDir::new().unwrap();
        let config = AppConfig {
            database_path: temp.path().join("test.db"),
            poster_path: temp.path().join("posters"),
            templates_path: temp.path().join("templates"),
            publish_destination: Some(temp.path().join("published")),
            ..AppConfig::default()
        };
        (AppContext::open(config).unwrap(), temp)
    }

    #[test]
    fn exported_series_import_into_fresh_catalog() {
        let (ctx, temp) = setup_ctx();
        let id = ctx.db.add_new_media(MediaType::Series, "Dark").unwrap();
        for n in 1..=3 {
            let episode = NewEpisode {
                season: 1,
                episode: n,
                title: Some(format!("Part {}", n)),
                plot: None,
                release_date: None,
            };
            ctx.db.add_new_episode(id, &episode).unwrap();
        }
        let path = temp.path().join("series.csv");
        assert_eq!(export_media(&ctx, "CSV", MediaType::Series, &path).unwrap(), 3);

        let (other, other_temp) = setup_ctx();
        let report = import_media(&other, "csv", MediaType::Series, &path, &ColumnMap::new()).unwrap();
        assert_eq!(report.records, 1);
        assert_eq!(report.episodes, 3);

        let (series, _) = other.db.get_media(MediaType::Series, &MediaFilters::new()).unwrap();
        let episodes = other.db.get_series_episodes(series[0].id, Some(1)).unwrap();
        assert_eq!(episodes[2].title.as_deref(), Some("Part 3"));
        drop(other_temp);
    }

    #[test]
    fn import_missing_file_is_not_found() {
        let (ctx, temp) = setup_ctx();
        let err = import_media(&ctx, "CSV", MediaType::Movie, &temp.path().join("nope.csv"), &ColumnMap::new())
            .unwrap_err();
        assert_eq!(err.kind(), "not found");
    }

    #[test]
    fn publish_uses_default_publisher() {
        let (ctx, temp) = setup_ctx();
        let result = publish_media(&ctx, None, MediaType::Movie).unwrap();
        assert_eq!(result.items, 0);
        assert_eq!(result.destination, temp.path().join("published").join("movie_posters.zip"));
    }

    #[test]
    fn publish_catalog_site_by_name() {
        let (ctx, temp) = setup_ctx();
        ctx.db.add_new_media(MediaType::Movie, "Heat").unwrap();
        let result = publish_media(&ctx, Some("Catalog Site"), MediaType::Movie).unwrap();
        assert_eq!(result.items, 1);
        assert_eq!(result.destination, temp.path().join("published").join("movie"));
        assert!(result.destination.join("summary.json").exists());
    }

    #[test]
    fn column_map_arguments() {
        let map = parse_column_map(&["Name=title".to_string(), "Kinds=genres".to_string()]).unwrap();
        assert_eq!(map.get("Name").map(String::as_str), Some("title"));
        assert_eq!(map.len(), 2);
    }
}
