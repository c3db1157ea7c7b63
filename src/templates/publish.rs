use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::database::{Database, MediaFilters, MediaType};
use crate::error::AppError;

/// Two-phase publishing: build the content locally, then push it out.
pub trait Publisher: Send {
    fn name(&self) -> &str;

    /// Returns the number of items prepared.
    fn generate_content(&mut self, db: &Database, media_type: MediaType) -> Result<usize, AppError>;

    /// Returns where the content was published.
    fn publish_content(&mut self) -> Result<PathBuf, AppError>;
}

/// Zips the posters of one media type and copies the archive to a destination directory.
pub struct PosterArchivePublisher {
    name: String,
    poster_root: PathBuf,
    staging_dir: PathBuf,
    destination: Option<PathBuf>,
    archive: Option<PathBuf>,
}

impl PosterArchivePublisher {
    pub fn new(name: &str, poster_root: &Path, staging_dir: &Path, destination: Option<&Path>) -> Self {
        Self {
            name: name.to_string(),
            poster_root: poster_root.to_path_buf(),
            staging_dir: staging_dir.to_path_buf(),
            destination: destination.map(Path::to_path_buf),
            archive: None,
        }
    }

    pub fn archive(&self) -> Option<&Path> {
        self.archive.as_deref()
    }
}

/// Posters under `dir` named `<id>.jpg` whose id is in `ids`, sorted by id.
fn catalog_posters(dir: &Path, ids: &HashSet<i64>) -> Result<Vec<(i64, PathBuf)>, AppError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut posters = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jpg") {
            continue;
        }
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<i64>().ok());
        match id {
            Some(id) if ids.contains(&id) => posters.push((id, path)),
            _ => log::debug!("Skipping orphan poster {:?}", path),
        }
    }
    posters.sort_by_key(|(id, _)| *id);
    Ok(posters)
}

impl Publisher for PosterArchivePublisher {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate_content(&mut self, db: &Database, media_type: MediaType) -> Result<usize, AppError> {
        let (records, _) = db.get_media(media_type, &MediaFilters::new())?;
        let ids: HashSet<i64> = records.iter().map(|r| r.id).collect();
        let posters = catalog_posters(&self.poster_root.join(media_type.poster_dir()), &ids)?;

        std::fs::create_dir_all(&self.staging_dir)?;
        let archive_path = self
            .staging_dir
            .join(format!("{}_posters.zip", media_type.poster_dir()));
        if archive_path.exists() {
            std::fs::remove_file(&archive_path)?;
        }

        let file = File::create(&archive_path)?;
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        for (id, path) in &posters {
            let content = std::fs::read(path)?;
            zip.start_file(format!("{}/{}.jpg", media_type.poster_dir(), id), options)?;
            zip.write_all(&content)?;
        }
        zip.finish()?;

        log::info!(
            "{}: archived {} {} posters into {:?}",
            self.name,
            posters.len(),
            media_type,
            archive_path
        );
        self.archive = Some(archive_path);
        Ok(posters.len())
    }

    fn publish_content(&mut self) -> Result<PathBuf, AppError> {
        let archive = self
            .archive
            .as_ref()
            .ok_or_else(|| AppError::Validation("Nothing generated to publish".to_string()))?;
        let destination = self
            .destination
            .as_ref()
            .ok_or_else(|| AppError::Template(format!("{} has no publish destination configured", self.name)))?;
        let file_name = archive
            .file_name()
            .ok_or_else(|| AppError::Other(format!("Invalid archive path {:?}", archive)))?;

        std::fs::create_dir_all(destination)?;
        let target = destination.join(file_name);
        let bytes = std::fs::copy(archive, &target)?;
        log::info!("{}: published {} bytes to {:?}", self.name, bytes, target);
        Ok(target)
    }
}
