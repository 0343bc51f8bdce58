//! Deployment configuration, shared by every agent on the machine.
//!
//! Lives at `~/.lifeos/config.json`. The file is optional; an absent file
//! means defaults, an unreadable or malformed file is an error (a half-read
//! config silently pointing agents at the wrong store is worse than failing
//! loudly at startup).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::db::{DbError, SignalDb};

fn default_retention_days() -> i64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusConfig {
    /// Override for the signal store location. Defaults to the shared
    /// per-user store when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
    /// How long terminal and expired signals stay queryable before the
    /// retention sweep moves them to the archive table.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            retention_days: default_retention_days(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Home directory not found")]
    HomeDirNotFound,
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

fn config_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeDirNotFound)?;
    Ok(home.join(".lifeos").join("config.json"))
}

impl BusConfig {
    /// Load `~/.lifeos/config.json`, or defaults when the file is absent.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load a specific config file. Unlike `load`, the file must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Open the signal store this config points at.
    pub fn open_db(&self) -> Result<SignalDb, DbError> {
        match &self.db_path {
            Some(path) => SignalDb::open_at(path.clone()),
            None => SignalDb::open(),
        }
    }
}
