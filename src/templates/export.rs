use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::database::{Database, MediaType};
use crate::error::AppError;

/// Writes the whole catalog of one media type to a file.
pub trait Exporter: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the number of rows written.
    fn export(&self, db: &Database, media_type: MediaType, path: &Path) -> Result<usize, AppError>;
}

fn write_csv<T: Serialize>(rows: &[T], path: &Path) -> Result<usize, AppError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(rows.len())
}

fn write_json<T: Serialize>(rows: &[T], path: &Path) -> Result<usize, AppError> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, rows)?;
    Ok(rows.len())
}

pub struct CsvExporter {
    name: String,
}

impl CsvExporter {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}

impl Exporter for CsvExporter {
    fn name(&self) -> &str {
        &self.name
    }

    fn export(&self, db: &Database, media_type: MediaType, path: &Path) -> Result<usize, AppError> {
        let written = match media_type {
            MediaType::Movie => write_csv(&db.export_movies()?, path)?,
            MediaType::Series => write_csv(&db.export_series()?, path)?,
        };
        log::info!("Exported {} {} rows to {:?}", written, media_type, path);
        Ok(written)
    }
}

pub struct JsonExporter {
    name: String,
}

impl JsonExporter {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }
}

impl Exporter for JsonExporter {
    fn name(&self) -> &str {
        &self.name
    }

    fn export(&self, db: &Database, media_type: MediaType, path: &Path) -> Result<usize, AppError> {
        let written = match media_type {
            MediaType::Movie => write_json(&db.export_movies()?, path)?,
            MediaType::Series => write_json(&db.export_series()?, path)?,
        };
        log::info!("Exported {} {} rows to {:?}", written, media_type, path);
        Ok(written)
    }
}
