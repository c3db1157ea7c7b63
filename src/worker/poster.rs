use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::database::MediaType;

/// Local poster file for a record: `<poster_root>/<movie|series>/<id>.jpg`.
pub fn poster_path(poster_root: &Path, media_type: MediaType, id: i64) -> PathBuf {
    poster_root
        .join(media_type.poster_dir())
        .join(format!("{}.jpg", id))
}

/// Remove a record's poster if present. Returns whether a file was deleted.
pub fn remove_poster(poster_root: &Path, media_type: MediaType, id: i64) -> std::io::Result<bool> {
    let path = poster_path(poster_root, media_type, id);
    match std::fs::remove_file(&path) {
        Ok(()) => {
            log::info!("Removed poster {:?}", path);
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Download a poster image with streaming, timeouts and automatic retry.
pub async fn download_poster(url: &str, file_path: &Path) -> Result<u64, String> {
    if let Some(parent) = file_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| format!("Failed to create poster directory: {}", e))?;
    }

    let backoff_delays = [2u64, 8];

    for attempt in 0..3usize {
        match try_download(url, file_path).await {
            Ok(size) => return Ok(size),
            Err(e) => {
                // Clean up partial file
                let _ = tokio::fs::remove_file(file_path).await;

                if attempt < 2 {
                    let delay = backoff_delays[attempt];
                    log::warn!(
                        "Poster download attempt {} failed, retrying in {}s: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(std::time::Duration::from_secs(delay)).await;
                } else {
                    return Err(format!("Poster download failed after 3 attempts: {}", e));
                }
            }
        }
    }

    Err("Poster download failed".to_string())
}

/// Single download attempt with streaming and validation
async fn try_download(url: &str, file_path: &Path) -> Result<u64, String> {
    log::info!("Downloading poster to: {:?}", file_path);

    let client = reqwest::Client::builder()
        .connect_timeout(std::time::Duration::from_secs(15))
        .timeout(std::time::Duration::from_secs(60))
        .build()
        .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| format!("Failed to start download: {}", e))?;

    if !response.status().is_success() {
        return Err(format!("Download failed with status: {}", response.status()));
    }

    let content_length = response.content_length();
    let mut stream = response.bytes_stream();
    let mut file = tokio::fs::File::create(file_path)
        .await
        .map_err(|e| format!("Failed to create file: {}", e))?;
    let mut downloaded: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| format!("Error reading download stream: {}", e))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| format!("Failed to write chunk: {}", e))?;
        downloaded += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|e| format!("Failed to flush file: {}", e))?;

    // Validate file size against Content-Length
    if let Some(expected) = content_length {
        if downloaded != expected {
            return Err(format!(
                "Download incomplete: got {} bytes, expected {}",
                downloaded, expected
            ));
        }
    }
    if downloaded == 0 {
        return Err("Poster is empty".to_string());
    }

    log::info!("Poster download complete: {} bytes", downloaded);
    Ok(downloaded)
}
