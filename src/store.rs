use crate::session::SessionStats;
use crate::tasks::Task;
use crate::timer::Preset;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const STATE_FILE: &str = "state.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ============================================================================
// Persisted Data
// ============================================================================

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub auto_start: bool,
    pub music_enabled: bool,
    pub effects_enabled: bool,
    pub notifications: bool,
    pub daily_goal_hours: f64,
    pub theme: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_start: false,
            music_enabled: true,
            effects_enabled: true,
            notifications: true,
            daily_goal_hours: 8.0,
            theme: "default".into(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavedState {
    #[serde(default)]
    pub presets: Preset,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub stats: SessionStats,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub named_presets: BTreeMap<String, Preset>,
}

impl SavedState {
    fn sanitized(mut self) -> Self {
        self.presets = self.presets.sanitized();
        for preset in self.named_presets.values_mut() {
            *preset = preset.sanitized();
        }
        if !self.settings.daily_goal_hours.is_finite() || self.settings.daily_goal_hours <= 0.0 {
            self.settings.daily_goal_hours = Settings::default().daily_goal_hours;
        }
        self
    }
}

// ============================================================================
// Store
// ============================================================================

#[derive(Clone, Debug)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(STATE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when nothing has been saved yet.
    pub fn try_load(&self) -> Result<Option<SavedState>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Read { path: self.path.clone(), source }),
        };
        let state: SavedState = serde_json::from_str(&contents)
            .map_err(|source| StoreError::Parse { path: self.path.clone(), source })?;
        Ok(Some(state.sanitized()))
    }

    /// Never fails: a missing or unreadable file yields defaults.
    pub fn load(&self) -> SavedState {
        match self.try_load() {
            Ok(Some(state)) => {
                info!("loaded state from {}", self.path.display());
                state
            }
            Ok(None) => {
                info!("no state at {}, starting fresh", self.path.display());
                SavedState::default()
            }
            Err(e) => {
                warn!("{e}; falling back to defaults");
                SavedState::default()
            }
        }
    }

    /// Writes atomically, retrying once before giving up.
    pub fn save(&self, state: &SavedState) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(state)?;
        self.write_with(&json, |json| self.write_atomic(json))
    }

    fn write_with<F>(&self, json: &str, mut write: F) -> Result<(), StoreError>
    where
        F: FnMut(&str) -> Result<(), StoreError>,
    {
        match write(json) {
            Ok(()) => Ok(()),
            Err(first) => {
                warn!("{first}; retrying once");
                write(json)
            }
        }
    }

    fn write_atomic(&self, json: &str) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write { path: self.path.clone(), source };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json).map_err(write_err)?;
        fs::rename(&tmp_path, &self.path).map_err(|source| {
            let _ = fs::remove_file(&tmp_path);
            write_err(source)
        })
    }
}
