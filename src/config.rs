//! Persistent trashcan settings
//!
//! Stored as TOML in the platform config directory:
//!   ~/.config/trashkeeper/config.toml (Linux)

use crate::error::{Result, TrashError};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SETTINGS_FILE: &str = ".e2settings.pkl";
pub const GIB: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Master switch for automatic cleanup
    pub enabled: bool,
    /// Files older than this are always deleted. 0 disables the age rule
    /// and leaves only the free-space quota.
    pub retention_days: u64,
    /// Free space to keep on each volume, in whole GiB
    pub reserve_gb: u64,
    /// Also clean trash folders on network mounts
    pub clean_network: bool,
    /// Never delete per-directory settings files found in the trash
    pub preserve_settings: bool,
    pub settings_file: String,
    /// Default media directory, always probed for a trash folder
    pub default_path: PathBuf,
    pub mounts_file: PathBuf,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            retention_days: 8,
            reserve_gb: 40,
            clean_network: false,
            preserve_settings: true,
            settings_file: DEFAULT_SETTINGS_FILE.to_string(),
            default_path: PathBuf::from("/media/hdd/movie"),
            mounts_file: PathBuf::from("/proc/mounts"),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from the default location, falling back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content =
            fs::read_to_string(path).map_err(|e| TrashError::classify(e, "read", path))?;
        toml::from_str(&content).map_err(|source| TrashError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| TrashError::classify(e, "mkdir", parent))?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| TrashError::classify(e, "write", path))
    }

    pub fn reserve_bytes(&self) -> u64 {
        self.reserve_gb.saturating_mul(GIB)
    }

    /// Name of the file to keep, if preservation is on
    pub fn preserved_name(&self) -> Option<&str> {
        if self.preserve_settings {
            Some(self.settings_file.as_str())
        } else {
            None
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    ProjectDirs::from("", "", "trashkeeper")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .ok_or(TrashError::NoConfigDir)
}
