//! Named template providers: lookup, export, import and publish.
//!
//! `registry.json` in the templates directory lists the available templates
//! as `{"data": [{name, kind, module, source, file_type}, ...]}`. `module`
//! selects a built-in implementation; `source` is module specific (the
//! catalog file for `offline`). Without a registry file the built-in
//! defaults are used.

pub mod export;
pub mod import;
pub mod publish;
pub mod site;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::lookup::{LookupProvider, OfflineProvider, TmdbClient};

pub use export::{CsvExporter, Exporter, JsonExporter};
pub use import::{ColumnMap, CsvImporter, ImportReport, Importer, JsonImporter};
pub use publish::{PosterArchivePublisher, Publisher};
pub use site::CatalogSitePublisher;

pub const REGISTRY_FILE: &str = "registry.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    Lookup,
    Export,
    Import,
    Publish,
}

impl std::fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lookup => write!(f, "lookup"),
            Self::Export => write!(f, "export"),
            Self::Import => write!(f, "import"),
            Self::Publish => write!(f, "publish"),
        }
    }
}

impl std::str::FromStr for TemplateKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lookup" => Ok(Self::Lookup),
            "export" => Ok(Self::Export),
            "import" => Ok(Self::Import),
            "publish" => Ok(Self::Publish),
            other => Err(AppError::Validation(format!("Unknown template kind '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    pub kind: TemplateKind,
    pub module: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
}

impl RegistryEntry {
    fn builtin(name: &str, kind: TemplateKind, module: &str, file_type: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            module: module.to_string(),
            source: None,
            file_type: file_type.map(str::to_string),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    data: Vec<RegistryEntry>,
}

pub fn default_entries() -> Vec<RegistryEntry> {
    vec![
        RegistryEntry::builtin("TMDb", TemplateKind::Lookup, "tmdb", None),
        RegistryEntry::builtin("CSV", TemplateKind::Export, "csv", Some("csv")),
        RegistryEntry::builtin("JSON", TemplateKind::Export, "json", Some("json")),
        RegistryEntry::builtin("CSV", TemplateKind::Import, "csv", Some("csv")),
        RegistryEntry::builtin("JSON", TemplateKind::Import, "json", Some("json")),
        RegistryEntry::builtin("Poster Archive", TemplateKind::Publish, "poster_archive", Some("zip")),
        RegistryEntry::builtin("Catalog Site", TemplateKind::Publish, "catalog_site", Some("json")),
    ]
}

/// Registered templates plus what is needed to construct them.
pub struct TemplateRegistry {
    root: PathBuf,
    entries: Vec<RegistryEntry>,
}

impl TemplateRegistry {
    pub fn new(root: &Path, entries: Vec<RegistryEntry>) -> Self {
        Self {
            root: root.to_path_buf(),
            entries,
        }
    }

    pub fn load(root: &Path) -> Result<Self, AppError> {
        let path = root.join(REGISTRY_FILE);
        if !path.exists() {
            log::info!("No {:?}, using built-in templates", path);
            return Ok(Self::new(root, default_entries()));
        }
        let content = std::fs::read_to_string(&path)?;
        let registry: RegistryFile = serde_json::from_str(&content)
            .map_err(|e| AppError::Template(format!("Invalid {}: {}", REGISTRY_FILE, e)))?;
        log::info!("Loaded {} templates from {:?}", registry.data.len(), path);
        Ok(Self::new(root, registry.data))
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn names(&self, kind: TemplateKind) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.name.as_str())
            .collect()
    }

    pub fn find(&self, kind: TemplateKind, name: &str) -> Result<&RegistryEntry, AppError> {
        self.entries
            .iter()
            .find(|e| e.kind == kind && e.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| AppError::Template(format!("Unknown {} template '{}'", kind, name)))
    }

    /// First template of a kind, used when no preference is stored.
    pub fn default_name(&self, kind: TemplateKind) -> Result<&str, AppError> {
        self.names(kind)
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Template(format!("No {} templates registered", kind)))
    }

    fn source_path(&self, entry: &RegistryEntry) -> Result<PathBuf, AppError> {
        let source = entry
            .source
            .as_deref()
            .ok_or_else(|| AppError::Template(format!("Template '{}' needs a source", entry.name)))?;
        Ok(self.root.join(source))
    }

    fn unknown_module(entry: &RegistryEntry) -> AppError {
        AppError::Template(format!(
            "Template '{}' uses unknown {} module '{}'",
            entry.name, entry.kind, entry.module
        ))
    }

    pub fn lookup(&self, name: &str, config: &AppConfig) -> Result<Arc<dyn LookupProvider>, AppError> {
        let entry = self.find(TemplateKind::Lookup, name)?;
        match entry.module.as_str() {
            "tmdb" => {
                let api_key = config.tmdb_api_key().ok_or_else(|| {
                    AppError::Lookup("TMDb API key is not configured (set TMDB_API_KEY)".to_string())
                })?;
                let mut client = TmdbClient::new(api_key).with_timeout(config.request_timeout());
                if let Some(language) = config.tmdb.language.as_deref() {
                    client = client.with_language(language);
                }
                if let Some(region) = config.tmdb.region.as_deref() {
                    client = client.with_region(region);
                }
                Ok(Arc::new(client))
            }
            "offline" => Ok(Arc::new(OfflineProvider::from_file(
                &entry.name,
                &self.source_path(entry)?,
            )?)),
            _ => Err(Self::unknown_module(entry)),
        }
    }

    pub fn exporter(&self, name: &str) -> Result<Box<dyn Exporter>, AppError> {
        let entry = self.find(TemplateKind::Export, name)?;
        match entry.module.as_str() {
            "csv" => Ok(Box::new(CsvExporter::new(&entry.name))),
            "json" => Ok(Box::new(JsonExporter::new(&entry.name))),
            _ => Err(Self::unknown_module(entry)),
        }
    }

    pub fn importer(&self, name: &str) -> Result<Box<dyn Importer>, AppError> {
        let entry = self.find(TemplateKind::Import, name)?;
        match entry.module.as_str() {
            "csv" => Ok(Box::new(CsvImporter::new(&entry.name))),
            "json" => Ok(Box::new(JsonImporter::new(&entry.name))),
            _ => Err(Self::unknown_module(entry)),
        }
    }

    pub fn publisher(&self, name: &str, config: &AppConfig) -> Result<Box<dyn Publisher>, AppError> {
        let entry = self.find(TemplateKind::Publish, name)?;
        match entry.module.as_str() {
            "poster_archive" => Ok(Box::new(PosterArchivePublisher::new(
                &entry.name,
                &config.poster_path,
                &self.root.join("publish").join("temp"),
                config.publish_destination.as_deref(),
            ))),
            "catalog_site" => Ok(Box::new(CatalogSitePublisher::new(
                &entry.name,
                &self.root.join("publish").join("site"),
                config.publish_destination.as_deref(),
            ))),
            _ => Err(Self::unknown_module(entry)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MediaType;
    use tempfile::TempDir;

    #[test]
    fn defaults_without_registry_file() {
        let temp = TempDir::new().unwrap();
        let registry = TemplateRegistry::load(temp.path()).unwrap();
        assert_eq!(registry.names(TemplateKind::Export), vec!["CSV", "JSON"]);
        assert_eq!(registry.default_name(TemplateKind::Lookup).unwrap(), "TMDb");
        assert!(registry.exporter("json").is_ok());
        assert_eq!(registry.names(TemplateKind::Publish), vec!["Poster Archive", "Catalog Site"]);
        assert!(registry.publisher("catalog site", &AppConfig::default()).is_ok());
    }

    #[test]
    fn unknown_name_and_wrong_kind_are_template_errors() {
        let temp = TempDir::new().unwrap();
        let registry = TemplateRegistry::load(temp.path()).unwrap();
        assert_eq!(registry.importer("XLSX").err().unwrap().kind(), "template");
        assert_eq!(registry.exporter("Poster Archive").err().unwrap().kind(), "template");
    }

    #[test]
    fn tmdb_without_key_is_a_lookup_error() {
        let temp = TempDir::new().unwrap();
        let registry = TemplateRegistry::load(temp.path()).unwrap();
        let config = AppConfig::default();
        assert_eq!(registry.lookup("TMDb", &config).err().unwrap().kind(), "lookup");
    }

    #[tokio::test]
    async fn registry_file_registers_offline_lookup() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(REGISTRY_FILE),
            r#"{"data": [
                {"name": "Shelf", "kind": "lookup", "module": "offline", "source": "shelf.json"},
                {"name": "Sheet", "kind": "export", "module": "xlsx", "file_type": "xlsx"}
            ]}"#,
        )
        .unwrap();
        std::fs::write(
            temp.path().join("shelf.json"),
            r#"{"media": [{"media_type": "movie", "online_id": "m1",
                "content": {"title": "Heat", "year": 1995},
                "lookup": {"lookup_source": "Shelf", "source_url": ""},
                "genres": null, "languages": null, "cast": []}]}"#,
        )
        .unwrap();

        let registry = TemplateRegistry::load(temp.path()).unwrap();
        let provider = registry.lookup("shelf", &AppConfig::default()).unwrap();
        let hits = provider.search_media(MediaType::Movie, "heat").await.unwrap();
        assert_eq!(hits[0].online_id, "m1");
        assert_eq!(registry.exporter("Sheet").err().unwrap().kind(), "template");
    }
}
