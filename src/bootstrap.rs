// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Snowblock bootstrapping.
//!
//! Drive the processing of every configured snowblock one after another. Any
//! failure to validate or dispatch a snowblock stops the whole run. Directories
//! that are not snowblocks are skipped with a warning.

use crate::{
    config::AppConfig,
    path::{self, PathError},
    snowblock::{Snowblock, SnowblockError},
    task::Registry,
};

use std::{
    fs::read_dir,
    io::Error as IoError,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Bootstrapper over a fixed registry and configuration.
#[derive(Debug, Clone)]
pub struct Bootstrap {
    registry: Registry,
    config: AppConfig,
}

impl Bootstrap {
    /// Construct new bootstrapper.
    pub fn new(registry: Registry, config: AppConfig) -> Self {
        Self { registry, config }
    }

    /// Determine snowblock paths to process.
    ///
    /// Explicit paths are used as they are. Otherwise the configured snowblock
    /// paths are followed by every immediate subdirectory of each configured
    /// base directory, sorted by name. Symbolic links inside of a base directory
    /// are not snowblocks. Missing base directories are skipped.
    ///
    /// # Errors
    ///
    /// - Return [`BootstrapError::BaseDir`] if a base directory cannot be read.
    /// - Return [`BootstrapError::Path`] if a base directory path cannot be
    ///   expanded.
    pub fn snowblock_paths(&self, explicit: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
        if !explicit.is_empty() {
            debug!("use individual snowblocks instead of base directories: {explicit:?}");
            return Ok(explicit);
        }

        let mut paths = self.config.snowblocks.paths.clone();
        for base_dir in &self.config.snowblocks.base_dirs {
            let base_dir = path::absolute(base_dir)?;
            let exists = path::node_exists(&base_dir).map_err(|source| BootstrapError::BaseDir {
                path: base_dir.clone(),
                source,
            })?;
            if !exists {
                warn!("ignore non-existent snowblock base directory: {:?}", base_dir.display());
                continue;
            }

            debug!("process snowblock base directory {:?}", base_dir.display());
            paths.extend(subdirectories(&base_dir)?);
        }

        Ok(paths)
    }

    /// Bootstrap snowblocks at given paths in order.
    ///
    /// # Errors
    ///
    /// - Return [`BootstrapError::Validate`] if a snowblock fails validation.
    /// - Return [`BootstrapError::Dispatch`] if a snowblock fails processing.
    #[instrument(skip(self, paths), level = "debug")]
    pub fn run(&self, paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Result<BootstrapReport> {
        let mut report = BootstrapReport::default();
        for path in paths {
            let mut snowblock = Snowblock::new(path);
            snowblock
                .validate(self.registry.get_all())
                .map_err(|source| BootstrapError::Validate {
                    snowblock: snowblock.name(),
                    source,
                })?;

            if !snowblock.is_valid() {
                warn!("skipped processing of invalid snowblock {:?}", snowblock.name());
                report.skipped.push(snowblock.path().to_path_buf());
                continue;
            }

            for task in snowblock.unsupported_tasks() {
                debug!("snowblock {:?} declares unsupported task {task:?}", snowblock.name());
            }

            snowblock.dispatch().map_err(|source| BootstrapError::Dispatch {
                snowblock: snowblock.name(),
                source,
            })?;
            info!("successfully bootstrapped snowblock {:?}", snowblock.name());
            report.bootstrapped.push(snowblock.path().to_path_buf());
        }

        if report.bootstrapped.is_empty() && report.skipped.is_empty() {
            warn!("no valid snowblocks found");
        } else {
            info!("bootstrapped all configured snowblocks");
        }

        Ok(report)
    }
}

/// Outcome of a bootstrap run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Absolute paths of processed snowblocks.
    pub bootstrapped: Vec<PathBuf>,

    /// Absolute paths of directories without task document.
    pub skipped: Vec<PathBuf>,
}

fn subdirectories(base_dir: &Path) -> Result<Vec<PathBuf>> {
    let read_error = |source| BootstrapError::BaseDir {
        path: base_dir.to_path_buf(),
        source,
    };

    let mut dirs = Vec::new();
    for entry in read_dir(base_dir).map_err(read_error)? {
        let entry = entry.map_err(read_error)?;
        if entry.file_type().map_err(read_error)?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();

    Ok(dirs)
}

/// Bootstrap error types.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    /// Base directory path cannot be expanded.
    #[error(transparent)]
    Path(#[from] PathError),

    /// Base directory cannot be read.
    #[error("could not read snowblock base directory {:?}", path.display())]
    BaseDir {
        path: PathBuf,
        #[source]
        source: IoError,
    },

    /// Snowblock fails validation.
    #[error("failed to validate snowblock {snowblock:?}")]
    Validate {
        snowblock: String,
        #[source]
        source: SnowblockError,
    },

    /// Snowblock fails processing.
    #[error("failed to process snowblock {snowblock:?}")]
    Dispatch {
        snowblock: String,
        #[source]
        source: SnowblockError,
    },
}

/// Friendly result alias :3
pub type Result<T, E = BootstrapError> = std::result::Result<T, E>;
