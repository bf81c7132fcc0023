//! File-backed key/value settings.
//!
//! A flat JSON object, read once at startup and rewritten in full on every
//! change. The last write wins; there is no locking between processes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::{AppError, Result};

pub const COOKIE_KEY: &str = "bili-vd.cookie";
pub const FFMPEG_KEY: &str = "bili-vd.ffmpeg";

#[derive(Debug)]
pub struct Settings {
    path: PathBuf,
    values: BTreeMap<String, Value>,
}

impl Settings {
    /// `<config dir>/bvdl/settings.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("bvdl").join("settings.json"))
    }

    /// Load from `path`, or the default location. A missing file is an empty store.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path().ok_or_else(|| {
                AppError::InvalidInput(
                    "cannot determine the config directory; pass --settings".to_string(),
                )
            })?,
        };

        let values = match std::fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| AppError::settings(&path, e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No settings file yet");
                BTreeMap::new()
            }
            Err(e) => return Err(AppError::settings(&path, e)),
        };

        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.values.insert(key.into(), Value::String(value.into()));
        self.save()
    }

    /// Remove `key`, returning its old value. The file is only rewritten when
    /// the key existed.
    pub fn remove(&mut self, key: &str) -> Result<Option<Value>> {
        let removed = self.values.remove(key);
        if removed.is_some() {
            self.save()?;
        }
        Ok(removed)
    }

    pub fn to_pretty_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.values).map_err(|e| AppError::settings(&self.path, e))
    }

    pub fn cookie(&self) -> Option<&str> {
        self.get_str(COOKIE_KEY).filter(|c| !c.is_empty())
    }

    pub fn ffmpeg(&self) -> &str {
        self.get_str(FFMPEG_KEY)
            .filter(|f| !f.is_empty())
            .unwrap_or(bvdl_engine::mux::DEFAULT_FFMPEG)
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| AppError::settings(&self.path, e))?;
        }
        let json = self.to_pretty_json()?;
        std::fs::write(&self.path, json).map_err(|e| AppError::settings(&self.path, e))?;
        debug!(path = %self.path.display(), keys = self.values.len(), "Settings saved");
        Ok(())
    }
}
