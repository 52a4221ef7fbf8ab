//! Bilancio persistence and autosave timing.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use bilancio_engine::Bilancio;
use chrono::{DateTime, Utc};

use crate::error::ExchangeError;

pub const DEFAULT_AUTOSAVE_DEBOUNCE_MS: u64 = 2000;

/// Write the document as pretty JSON, stamping `data_modifica`.
///
/// The file is written next to its destination and renamed into place, so a
/// crash mid-write leaves the previous version intact.
pub fn save(bilancio: &mut Bilancio, path: &Path, now: DateTime<Utc>) -> Result<(), ExchangeError> {
    bilancio.touch(now);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ExchangeError::io(parent, e))?;
    }
    let json = serde_json::to_string_pretty(bilancio)?;
    let tmp = temp_path(path);
    fs::write(&tmp, json).map_err(|e| ExchangeError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| ExchangeError::io(path, e))?;
    log::debug!("saved {}", path.display());
    Ok(())
}

pub fn load(path: &Path) -> Result<Bilancio, ExchangeError> {
    let text = fs::read_to_string(path).map_err(|e| ExchangeError::io(path, e))?;
    Ok(serde_json::from_str(&text)?)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Trailing debounce for saves: edits within `delay` of each other coalesce
/// into one write, issued `delay` after the last edit.
#[derive(Debug, Clone)]
pub struct AutosaveDebouncer {
    delay: Duration,
    last_edit: Option<Instant>,
}

impl AutosaveDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, last_edit: None }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn note_edit(&mut self, now: Instant) {
        self.last_edit = Some(now);
    }

    pub fn is_pending(&self) -> bool {
        self.last_edit.is_some()
    }

    pub fn due(&self, now: Instant) -> bool {
        self.last_edit
            .is_some_and(|t| now.saturating_duration_since(t) >= self.delay)
    }

    /// True once per quiet period; clears the pending edit.
    pub fn take_due(&mut self, now: Instant) -> bool {
        if self.due(now) {
            self.last_edit = None;
            true
        } else {
            false
        }
    }

    /// Clear and report any pending edit regardless of timing (shutdown).
    pub fn flush(&mut self) -> bool {
        self.last_edit.take().is_some()
    }
}

impl Default for AutosaveDebouncer {
    fn default() -> Self {
        Self::from_millis(DEFAULT_AUTOSAVE_DEBOUNCE_MS)
    }
}
