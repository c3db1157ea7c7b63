use thiserror::Error;

/// Typed application error hierarchy for all catalog actions.
///
/// Serializes as a plain string so a front end receives the same
/// `"error message"` it would show in a status bar, while Rust code
/// gets variants that can be matched or propagated with `?`.
///
/// The first three variants are the failure buckets an action can end in:
/// storage failures, lookup failures (external providers, templates) and
/// validation failures caught before anything is written.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Storage(String),

    #[error("Lookup failed: {0}")]
    Lookup(String),

    #[error("{0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("{0}")]
    Io(String),

    #[error("{0}")]
    Json(String),

    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Short label for the failure bucket, used as the status line prefix.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Storage(_) => "storage",
            AppError::Lookup(_) => "lookup",
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not found",
            AppError::Template(_) => "template",
            AppError::Io(_) => "io",
            AppError::Json(_) => "json",
            AppError::Other(_) => "error",
        }
    }
}

impl serde::Serialize for AppError {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

// ── From impls ─────────────────────────────────────────────────────────────

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        // Validation errors raised inside the database layer keep their bucket.
        match e.downcast::<AppError>() {
            Ok(app) => app,
            Err(e) => AppError::Storage(format!("{:#}", e)),
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::Storage(e.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Json(e.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(e: serde_yaml::Error) -> Self {
        AppError::Other(format!("Invalid config: {}", e))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Lookup(e.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(e: csv::Error) -> Self {
        AppError::Io(format!("CSV: {}", e))
    }
}

impl From<zip::result::ZipError> for AppError {
    fn from(e: zip::result::ZipError) -> Self {
        AppError::Io(format!("Archive: {}", e))
    }
}

/// Allows `.map_err(|e| format!("…", e))?` and `ok_or_else(|| format!(…))?`
/// to coerce into AppError without changing the call sites.
impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::Other(s)
    }
}

/// Allows `.ok_or("literal string")?` to coerce into AppError.
impl From<&str> for AppError {
    fn from(s: &str) -> Self {
        AppError::Other(s.to_string())
    }
}
