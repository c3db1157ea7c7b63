use std::collections::HashMap;

use super::AppContext;
use crate::error::AppError;
use crate::templates::{RegistryEntry, TemplateKind};

pub const DEFAULT_LOOKUP_KEY: &str = "default_lookup_template";
pub const DEFAULT_PUBLISH_KEY: &str = "default_publish_template";

/// Get a setting value
pub fn get_setting(ctx: &AppContext, key: &str) -> Result<Option<String>, AppError> {
    ctx.db.get_setting(key).map_err(AppError::from)
}

/// Set a setting value
pub fn set_setting(ctx: &AppContext, key: &str, value: &str) -> Result<(), AppError> {
    // Template preferences must name a registered template.
    match key {
        DEFAULT_LOOKUP_KEY => {
            ctx.templates.find(TemplateKind::Lookup, value)?;
        }
        DEFAULT_PUBLISH_KEY => {
            ctx.templates.find(TemplateKind::Publish, value)?;
        }
        _ => {}
    }
    log::info!("Setting {} = {}", key, value);
    ctx.db.set_setting(key, value).map_err(AppError::from)
}

/// Get all settings
pub fn get_all_settings(ctx: &AppContext) -> Result<HashMap<String, String>, AppError> {
    ctx.db.get_all_settings().map_err(AppError::from)
}

pub fn list_templates(ctx: &AppContext, kind: Option<TemplateKind>) -> Vec<RegistryEntry> {
    ctx.templates
        .entries()
        .iter()
        .filter(|e| kind.map_or(true, |k| e.kind == k))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use tempfile::TempDir;

    fn setup_ctx() -> (AppContext, TempDir) {
        let temp = TempDir::new().unwrap();
        let config = AppConfig {
            database_path: temp.path().join("test.db"),
            templates_path: temp.path().join("templates"),
            ..AppConfig::default()
        };
        (AppContext::open(config).unwrap(), temp)
    }

    #[test]
    fn template_preferences_are_validated() {
        let (ctx, _temp) = setup_ctx();
        set_setting(&ctx, DEFAULT_PUBLISH_KEY, "Poster Archive").unwrap();
        let err = set_setting(&ctx, DEFAULT_LOOKUP_KEY, "IMDb").unwrap_err();
        assert_eq!(err.kind(), "template");

        let all = get_all_settings(&ctx).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(get_setting(&ctx, DEFAULT_LOOKUP_KEY).unwrap(), None);
    }

    #[test]
    fn templates_filter_by_kind() {
        let (ctx, _temp) = setup_ctx();
        let imports = list_templates(&ctx, Some(TemplateKind::Import));
        assert!(imports.iter().all(|e| e.kind == TemplateKind::Import));
        assert_eq!(list_templates(&ctx, None).len(), ctx.templates.entries().len());
    }
}
