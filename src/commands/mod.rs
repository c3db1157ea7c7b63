pub mod lookup;
pub mod media;
pub mod meta;
pub mod settings;
pub mod transfer;

pub use lookup::*;
pub use media::*;
pub use meta::*;
pub use settings::*;
pub use transfer::*;

use std::path::Path;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::{Database, MediaType, MetaKind, RecordPatch, RecordTable};
use crate::error::AppError;
use crate::templates::TemplateRegistry;

/// Shared state handed to every command.
pub struct AppContext {
    pub db: Arc<Database>,
    pub config: AppConfig,
    pub templates: TemplateRegistry,
}

impl AppContext {
    pub fn open(config: AppConfig) -> Result<Self, AppError> {
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::new(&config.database_path)?;
        let templates = TemplateRegistry::load(&config.templates_path)?;
        log::info!("Opened catalog {:?}", config.database_path);
        Ok(Self {
            db: Arc::new(db),
            config,
            templates,
        })
    }

    pub fn poster_root(&self) -> &Path {
        &self.config.poster_path
    }
}

/// Build a patch from `column=value` pairs.
///
/// `source`, `edition` and `quality` take a name; the save that applies the
/// patch stores the matching reference id, creating the value if needed.
pub fn build_patch(table: RecordTable, fields: &[(String, String)]) -> Result<RecordPatch, AppError> {
    let mut patch = RecordPatch::new(table);
    for (column, raw) in fields {
        match column.trim().to_ascii_lowercase().as_str() {
            "source" => patch.set_reference(MetaKind::Source, raw)?,
            "edition" => patch.set_reference(MetaKind::Edition, raw)?,
            "quality" => patch.set_reference(MetaKind::Quality, raw)?,
            _ => patch.set_loose(column, raw)?,
        };
    }
    Ok(patch)
}

/// Parse `column=value` command line arguments.
pub fn parse_assignments(args: &[String]) -> Result<Vec<(String, String)>, AppError> {
    args.iter()
        .map(|arg| {
            arg.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.to_string()))
                .ok_or_else(|| AppError::Validation(format!("Expected column=value, got '{}'", arg)))
        })
        .collect()
}

pub fn media_table(media_type: MediaType) -> RecordTable {
    crate::database::records::record_table(media_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::types::Value;
    use tempfile::TempDir;

    #[test]
    fn assignments_split_on_first_equals() {
        let parsed = parse_assignments(&["notes=a=b".to_string(), "year=1999".to_string()]).unwrap();
        assert_eq!(parsed[0], ("notes".to_string(), "a=b".to_string()));
        assert!(parse_assignments(&["year".to_string()]).is_err());
    }

    #[test]
    fn reference_names_are_kept_for_the_save() {
        let fields = vec![
            ("source".to_string(), "Blu-ray".to_string()),
            ("edition".to_string(), "None".to_string()),
            ("year".to_string(), "2010".to_string()),
        ];
        let patch = build_patch(RecordTable::Movies, &fields).unwrap();
        assert_eq!(patch.references(), &[(MetaKind::Source, "Blu-ray".to_string())]);
        assert_eq!(patch.get("edition_id"), Some(&Value::Null));
        assert_eq!(patch.get("year"), Some(&Value::Integer(2010)));
    }

    #[test]
    fn references_resolve_inside_the_update() {
        let temp = TempDir::new().unwrap();
        let db = Database::new(&temp.path().join("test.db")).unwrap();
        let id = db.add_new_media(MediaType::Movie, "Heat").unwrap();
        let fields = vec![("source".to_string(), "Blu-ray".to_string())];
        let patch = build_patch(RecordTable::Movies, &fields).unwrap();
        db.update_record(MediaType::Movie, id, &crate::database::UpdateRequest::new(patch))
            .unwrap();

        let sources = db.get_meta_values(MetaKind::Source).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(db.get_movie_details(id).unwrap().movie.source.as_deref(), Some("Blu-ray"));
    }
}
