use std::fmt;
use std::path::{Path, PathBuf};

use bilancio_engine::TemplateError;

#[derive(Debug)]
pub enum ExchangeError {
    Io { path: PathBuf, source: std::io::Error },
    Json(serde_json::Error),
    /// The spreadsheet reader or writer failed.
    Spreadsheet(String),
    Template(TemplateError),
}

impl ExchangeError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            Self::Json(e) => write!(f, "invalid JSON: {}", e),
            Self::Spreadsheet(msg) => write!(f, "spreadsheet error: {}", msg),
            Self::Template(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ExchangeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json(e) => Some(e),
            Self::Template(e) => Some(e),
            Self::Spreadsheet(_) => None,
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<TemplateError> for ExchangeError {
    fn from(e: TemplateError) -> Self {
        Self::Template(e)
    }
}
