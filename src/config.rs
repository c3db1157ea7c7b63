use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AppError;

pub const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TmdbConfig {
    pub api_key: Option<String>,
    pub language: Option<String>,
    pub region: Option<String>,
}

/// Settings read from `config.yaml` in the project directory.
///
/// Every field is optional in the file; missing paths fall back to the
/// platform data directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub poster_path: PathBuf,
    pub templates_path: PathBuf,
    pub publish_destination: Option<PathBuf>,
    pub tmdb: TmdbConfig,
    pub request_timeout_secs: u64,
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("media-catalog")
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            database_path: data_dir.join("moviedb.db"),
            poster_path: data_dir.join("posters"),
            templates_path: data_dir.join("templates"),
            publish_destination: None,
            tmdb: TmdbConfig::default(),
            request_timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// Load `config.yaml` from `project_dir`, then apply `.env` overrides.
    pub fn load(project_dir: &Path) -> Result<Self, AppError> {
        let path = project_dir.join(CONFIG_FILE);
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: AppConfig = serde_yaml::from_str(&content)?;
            log::info!("Loaded config from {:?}", path);
            config
        } else {
            log::info!("No {} in {:?}, using defaults", CONFIG_FILE, project_dir);
            AppConfig::default()
        };
        config.resolve_relative(project_dir);

        if let Some(key) = load_env_value(project_dir, "TMDB_API_KEY") {
            log::info!("TMDb API key loaded from .env");
            config.tmdb.api_key = Some(key);
        }
        Ok(config)
    }

    fn resolve_relative(&mut self, base: &Path) {
        for path in [
            &mut self.database_path,
            &mut self.poster_path,
            &mut self.templates_path,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        if let Some(dest) = self.publish_destination.as_mut() {
            if dest.is_relative() {
                *dest = base.join(&*dest);
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn tmdb_api_key(&self) -> Option<&str> {
        self.tmdb.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

/// Load a value from the .env file by key name
pub fn load_env_value(project_dir: &Path, key: &str) -> Option<String> {
    let env_path = project_dir.join(".env");
    let prefix = format!("{}=", key);
    let content = std::fs::read_to_string(env_path).ok()?;
    content.lines().find_map(|line| {
        let value = line
            .trim()
            .strip_prefix(&prefix)?
            .trim()
            .trim_matches('"')
            .trim_matches('\'');
        (!value.is_empty()).then(|| value.to_string())
    })
}
