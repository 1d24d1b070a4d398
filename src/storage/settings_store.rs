//! Scalar persisted settings.
//!
//! A small string key/value store for the values the dashboard keeps between runs:
//! device addresses, cached credentials, daily detection counters and UI flags.
//! `FileSettings` keeps the whole map in memory and rewrites a JSON file on every
//! mutation; `MemorySettings` is the non-persistent variant used by tests and by
//! callers that do not want anything on disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, error, info, warn};

use crate::error_handling::types::StorageError;

pub const KEY_MAIN_IP: &str = "pyramid_main_ip";
pub const KEY_CAM_IPS: &str = "pyramid_cam_ips";
pub const KEY_AUTH_TOKEN: &str = "pyramid_auth_token";
pub const KEY_CSRF_TOKEN: &str = "pyramid_csrf_token";
pub const KEY_STATS_DATE: &str = "ai_stats_date";
pub const KEY_DETECTIONS_TODAY: &str = "ai_detections_today";
pub const KEY_TOTAL_CONFIDENCE: &str = "ai_total_confidence";
pub const KEY_DETECTION_COUNT: &str = "ai_detection_count";
pub const KEY_LIFETIME_DETECTIONS: &str = "ai_lifetime_detections";
pub const KEY_SIDEBAR_MINIMIZED: &str = "sidebarMinimized";
pub const KEY_SETUP_SKIPPED: &str = "pyramid_setup_skipped";

/// String key/value persistence.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Reads a boolean flag stored as `"true"` / `"false"`; missing means `false`.
    fn flag(&self, key: &str) -> bool {
        self.get(key).as_deref() == Some("true")
    }

    fn set_flag(&self, key: &str, value: bool) -> Result<(), StorageError> {
        self.set(key, if value { "true" } else { "false" })
    }
}

#[derive(Default)]
pub struct MemorySettings {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::WriteFailed)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::WriteFailed)?;
        values.remove(key);
        Ok(())
    }
}

pub struct FileSettings {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileSettings {
    pub const DEFAULT_FILE: &'static str = "settings.json";

    /// Opens (or creates) the settings file at `path`.
    ///
    /// A corrupt file is logged and replaced by an empty map on the next write.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                error!("Failed to create settings dir {}: {}", parent.display(), e);
                StorageError::WriteFailed
            })?;
        }

        let values = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Ignoring unreadable settings file {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                error!("Failed to read settings file {}: {}", path.display(), e);
                return Err(StorageError::ReadFailed);
            }
        };
        info!(
            "Settings loaded from {} ({} keys)",
            path.display(),
            values.len()
        );

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Opens `settings.json` inside `dir`.
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Result<Self, StorageError> {
        Self::open(dir.as_ref().join(Self::DEFAULT_FILE))
    }

    fn flush(&self, values: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(values).map_err(|_| StorageError::WriteFailed)?;
        fs::write(&self.path, json).map_err(|e| {
            error!("Failed to write settings file {}: {}", self.path.display(), e);
            StorageError::WriteFailed
        })?;
        debug!("Settings flushed to {}", self.path.display());
        Ok(())
    }
}

impl SettingsStore for FileSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::WriteFailed)?;
        values.insert(key.to_string(), value.to_string());
        self.flush(&values)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().map_err(|_| StorageError::WriteFailed)?;
        if values.remove(key).is_some() {
            self.flush(&values)?;
        }
        Ok(())
    }
}
