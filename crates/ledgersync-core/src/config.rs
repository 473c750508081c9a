//! Settings and on-disk layout

use ledgersync_transport::TransportConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// File name of the live store
pub const LIVE_FILE: &str = "live.db";
/// File name of the candidate store
pub const CANDIDATE_FILE: &str = "incoming.db";
/// File name of the transient backup
pub const BACKUP_FILE: &str = "backup.db";

/// Errors loading settings
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Paths of the three store files.
///
/// All three live in one directory so that renames between them stay on one
/// filesystem and are atomic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    pub live: PathBuf,
    pub candidate: PathBuf,
    pub backup: PathBuf,
}

impl StoreLayout {
    /// Standard layout inside `dir`
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            live: dir.join(LIVE_FILE),
            candidate: dir.join(CANDIDATE_FILE),
            backup: dir.join(BACKUP_FILE),
        }
    }

    /// Directory holding the store files
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.live.parent().unwrap_or_else(|| Path::new("."))
    }
}

/// Application settings, usually read from `ledgersync.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding the store files
    pub data_dir: Option<PathBuf>,
    /// Directory holding bundled seed stores
    pub assets_dir: Option<PathBuf>,
    pub sync: SyncSettings,
    pub logging: LoggingSettings,
}

/// Remote sync settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Full URL of the download endpoint
    pub endpoint: Option<String>,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub user_agent: Option<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            connect_timeout_secs: 15,
            request_timeout_secs: 300,
            user_agent: None,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing` filter directive, e.g. `info` or `ledgersync_core=debug`
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse settings from TOML text
    ///
    /// # Errors
    /// Returns an error if the text is not valid settings TOML
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load from `path` if it exists, otherwise defaults
    ///
    /// # Errors
    /// Returns an error if an existing file cannot be read or parsed
    pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolved data directory
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    /// Resolved assets directory
    #[must_use]
    pub fn assets_dir(&self) -> PathBuf {
        self.assets_dir
            .clone()
            .unwrap_or_else(|| self.data_dir().join("assets"))
    }

    /// Store layout under the data directory
    #[must_use]
    pub fn layout(&self) -> StoreLayout {
        StoreLayout::in_dir(&self.data_dir())
    }

    /// HTTP transport tuning
    #[must_use]
    pub fn transport(&self) -> TransportConfig {
        let mut config = TransportConfig {
            connect_timeout: Duration::from_secs(self.sync.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.sync.request_timeout_secs),
            ..TransportConfig::default()
        };
        if let Some(agent) = &self.sync.user_agent {
            config.user_agent.clone_from(agent);
        }
        config
    }
}

/// Default data directory.
///
/// Priority:
/// 1. `$HOME/.ledgersync`
/// 2. Platform data directory
/// 3. A temp directory (data will not survive a reboot)
#[must_use]
pub fn default_data_dir() -> PathBuf {
    if let Some(home) = dirs::home_dir() {
        return home.join(".ledgersync");
    }

    if let Some(data) = dirs::data_dir() {
        return data.join("ledgersync");
    }

    let temp = std::env::temp_dir().join("ledgersync-data");
    tracing::warn!(
        path = %temp.display(),
        "could not determine home directory; using temporary location"
    );
    temp
}
