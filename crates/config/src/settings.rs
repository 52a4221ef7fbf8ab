// User settings

use std::fs;
use std::path::{Path, PathBuf};

use bilancio_engine::context::ContextLocations;
use bilancio_engine::resolver::ENTITY_SHEET_CODE;
use bilancio_engine::title::TitlePolicy;
use bilancio_engine::{LabelMapping, Resolver};
use serde::{Deserialize, Serialize};

/// Log verbosity, as written in settings.json.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Documents
    #[serde(rename = "paths.templates")]
    pub templates_path: PathBuf,

    #[serde(rename = "paths.mappings")]
    pub mappings_path: PathBuf,

    // Store
    #[serde(rename = "store.path")]
    pub store_path: PathBuf,

    #[serde(rename = "store.autosaveDebounceMs")]
    pub autosave_debounce_ms: u64,

    // Addressing
    #[serde(rename = "entity.sheetCode")]
    pub entity_sheet_code: String,

    #[serde(rename = "title.searchOrder")]
    pub title_policy: TitlePolicy,

    #[serde(rename = "context.locations")]
    pub context_locations: ContextLocations,

    // Diagnostics
    #[serde(rename = "log.level")]
    pub log_level: LogLevel,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            templates_path: PathBuf::from("data/template/workbookabb-sparse.json"),
            mappings_path: PathBuf::from("data/mapping/xbrl_mappings_complete.json"),
            store_path: PathBuf::from("bilancio.json"),
            autosave_debounce_ms: 2000,
            entity_sheet_code: ENTITY_SHEET_CODE.to_string(),
            title_policy: TitlePolicy::default(),
            context_locations: ContextLocations::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bilancio")
            .join("settings.json")
    }

    /// Load settings from the default location, falling back to defaults
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load settings from `path`. A missing or unreadable file yields defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                log::warn!("error parsing {}: {}; using default settings", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                log::warn!("error reading {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse settings JSON; lines starting with `//` are comments.
    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");
        serde_json::from_str(&cleaned)
    }

    /// Resolver over `labels` using the configured entity sheet and title order.
    pub fn resolver<'a>(&self, labels: &'a LabelMapping) -> Resolver<'a> {
        Resolver::new(labels)
            .with_entity_sheet(self.entity_sheet_code.clone())
            .with_title_policy(self.title_policy.clone())
    }

    /// Save current settings to the default location
    pub fn save(&self) -> Result<(), String> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;
        fs::write(path, json).map_err(|e| e.to_string())
    }
}
