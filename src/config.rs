// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the application configuration file, and how several
//! of them are combined into the configuration snowsaw runs with.
//!
//! # General Layout
//!
//! ```toml
//! log_level = "info"
//!
//! [snowblocks]
//! base_dirs = ["~/.dotfiles/snowblocks"]
//! paths = ["~/work/dotfiles/ssh"]
//! ```
//!
//! Every immediate subdirectory of a base directory is treated as a snowblock
//! candidate. Paths name snowblocks directly. Both accept a leading tilde and
//! environment variables.
//!
//! # Discovery
//!
//! Unless an explicit file is requested, the user-level file
//! `~/.snowsaw.toml` is loaded first, followed by `snowsaw.toml` in the current
//! working directory. Later files override the log level of earlier ones, and
//! extend their snowblock listings. JSON files with a `.json` extension are
//! accepted as well.

use crate::path::home_dir;

use serde::Deserialize;
use std::{
    env::current_dir,
    fs::read_to_string,
    io::{Error as IoError, ErrorKind},
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Base name of configuration files.
pub const CONFIG_FILE_NAME: &str = "snowsaw";

/// Base directory used when none is configured.
pub const DEFAULT_BASE_DIR: &str = "snowblocks";

/// Log level used when none is configured.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Application configuration layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Verbosity of logging, e.g., "debug", "info", "warn".
    pub log_level: Option<String>,

    /// Snowblock locations.
    pub snowblocks: SnowblockSettings,
}

impl AppConfig {
    /// Parse configuration from JSON data.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::DeserializeJson`] if data is not valid.
    /// - Return [`ConfigError::ShellExpansion`] if path expansion fails.
    pub fn from_json_str(data: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(data)?;
        config.expanded()
    }

    /// Load configuration file, picking the decoder by file extension.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::UnsupportedExtension`] if extension is unknown.
    /// - Return [`ConfigError::Read`] if file cannot be read.
    /// - Return any parsing error of [`AppConfig::from_str`] or
    ///   [`AppConfig::from_json_str`].
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !matches!(extension.as_str(), "toml" | "json") {
            return Err(ConfigError::UnsupportedExtension {
                path: path.to_path_buf(),
            });
        }

        let data = read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        match extension.as_str() {
            "json" => Self::from_json_str(&data),
            _ => data.parse(),
        }
    }

    /// Merge other configuration on top of this one.
    ///
    /// The log level of the other configuration wins when set. Snowblock
    /// listings are appended.
    pub fn merge(&mut self, other: AppConfig) {
        if other.log_level.is_some() {
            self.log_level = other.log_level;
        }
        self.snowblocks.base_dirs.extend(other.snowblocks.base_dirs);
        self.snowblocks.paths.extend(other.snowblocks.paths);
    }

    /// Discover and load configuration files.
    ///
    /// An explicit file must exist. Otherwise default locations are merged in
    /// order, and missing ones are skipped.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError`] if a file exists but cannot be loaded.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_file(path);
        }

        let mut config = AppConfig::default();
        for candidate in default_config_paths() {
            match Self::load_file(&candidate) {
                Ok(loaded) => {
                    debug!("loaded configuration file {:?}", candidate.display());
                    config.merge(loaded);
                }
                Err(ConfigError::Read { source, .. }) if source.kind() == ErrorKind::NotFound => {
                    debug!("ignore non-existent configuration file {:?}", candidate.display());
                }
                Err(error) => return Err(error),
            }
        }

        Ok(config)
    }

    /// Apply command-line overrides and fill in defaults.
    ///
    /// Non-empty base directory overrides replace configured ones.
    pub fn finalize(mut self, base_dirs: Vec<PathBuf>) -> Self {
        if !base_dirs.is_empty() {
            self.snowblocks.base_dirs = base_dirs;
        }
        if self.snowblocks.base_dirs.is_empty() {
            self.snowblocks.base_dirs.push(PathBuf::from(DEFAULT_BASE_DIR));
        }
        if self.log_level.is_none() {
            self.log_level = Some(DEFAULT_LOG_LEVEL.into());
        }

        self
    }

    fn expanded(mut self) -> Result<Self> {
        // INVARIANT: Perform shell expansion on every snowblock location.
        for path in self
            .snowblocks
            .base_dirs
            .iter_mut()
            .chain(self.snowblocks.paths.iter_mut())
        {
            let expanded = shellexpand::full(&*path.to_string_lossy())
                .map_err(ConfigError::ShellExpansion)?
                .into_owned();
            *path = PathBuf::from(expanded);
        }

        Ok(self)
    }
}

impl FromStr for AppConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let config: AppConfig = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;
        config.expanded()
    }
}

/// Snowblock location settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(default)]
pub struct SnowblockSettings {
    /// Directories whose immediate subdirectories are snowblocks.
    pub base_dirs: Vec<PathBuf>,

    /// Individual snowblock directories.
    pub paths: Vec<PathBuf>,
}

/// Default configuration file locations in load order.
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(home) = home_dir() {
        paths.push(home.join(format!(".{CONFIG_FILE_NAME}.toml")));
    }
    if let Ok(cwd) = current_dir() {
        paths.push(cwd.join(format!("{CONFIG_FILE_NAME}.toml")));
    }

    paths
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize TOML configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to deserialize JSON configuration.
    #[error(transparent)]
    DeserializeJson(#[from] serde_json::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Configuration file has no supported extension.
    #[error("unsupported configuration file extension: {:?}", path.display())]
    UnsupportedExtension { path: PathBuf },

    /// Failed to read configuration file.
    #[error("failed to read configuration file {:?}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: IoError,
    },
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
