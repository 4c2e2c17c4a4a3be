// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Broken symbolic link removal.
//!
//! The clean task takes a list of target paths. A target that is a symbolic
//! link is checked itself, a target that is a directory has its immediate
//! children checked. The scan does not descend into subdirectories.
//!
//! A symbolic link is only removed when it is broken, and its target lies
//! inside of the snowblock directory. Broken links that point elsewhere were
//! not created by the snowblock, and are never touched.

use crate::{
    path::{self, PathError},
    task::{json_type, Result, TaskConfig, TaskError, TaskRunner},
};

use std::{
    collections::HashSet,
    fs::{read_dir, read_link, remove_file, symlink_metadata},
    io::{Error as IoError, ErrorKind},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Name of the task handled by [`Clean`].
pub const TASK_NAME: &str = "clean";

/// Task runner to remove broken symbolic links pointing into the snowblock.
#[derive(Debug, Default, Clone, Copy)]
pub struct Clean;

impl Clean {
    #[instrument(skip(self, snowblock), level = "debug")]
    fn clean(&self, target: &Path, snowblock: &Path) -> Result<(), CleanError> {
        let meta = match symlink_metadata(target) {
            Ok(meta) => meta,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!("ignore non-existent clean target: {:?}", target.display());
                return Ok(());
            }
            Err(error) => {
                return Err(CleanError::Inspect {
                    path: target.to_path_buf(),
                    source: error,
                })
            }
        };

        if meta.file_type().is_symlink() {
            return remove_if_broken(target, snowblock);
        }

        if !meta.is_dir() {
            debug!("ignore clean target that is neither link nor directory: {:?}", target.display());
            return Ok(());
        }

        let entries = read_dir(target).map_err(|source| CleanError::ReadDir {
            path: target.to_path_buf(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| CleanError::ReadDir {
                path: target.to_path_buf(),
                source,
            })?;
            let file_type = entry.file_type().map_err(|source| CleanError::Inspect {
                path: entry.path(),
                source,
            })?;
            if file_type.is_symlink() {
                remove_if_broken(&entry.path(), snowblock)?;
            }
        }

        Ok(())
    }
}

impl TaskRunner for Clean {
    fn name(&self) -> &str {
        TASK_NAME
    }

    fn run(&self, config: &TaskConfig, snowblock: &Path) -> Result<()> {
        let targets = parse_targets(config)?;
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();
        for target in targets {
            let target = path::resolve(&target, snowblock).map_err(CleanError::from)?;
            if seen.insert(target.clone()) {
                resolved.push(target);
            }
        }

        debug!("process deduplicated clean targets: {resolved:?}");
        for target in resolved {
            self.clean(&target, snowblock)?;
        }

        Ok(())
    }
}

/// Decode clean configuration into its list of target paths.
///
/// # Errors
///
/// - Return [`TaskError::MalformedConfig`] if the value is not an array of
///   strings.
pub fn parse_targets(config: &TaskConfig) -> Result<Vec<String>> {
    let TaskConfig::Array(values) = config else {
        return Err(TaskError::malformed(
            TASK_NAME,
            format!("expected array but got {}", json_type(config)),
        ));
    };

    values
        .iter()
        .enumerate()
        .map(|(index, value)| match value {
            TaskConfig::String(target) => Ok(target.clone()),
            other => Err(TaskError::malformed(
                TASK_NAME,
                format!("target at index {index} is {} instead of string", json_type(other)),
            )),
        })
        .collect()
}

/// Remove symbolic link if it is broken and points into the snowblock.
fn remove_if_broken(link: &Path, snowblock: &Path) -> Result<(), CleanError> {
    let target = read_link(link).map_err(|source| CleanError::ReadLink {
        path: link.to_path_buf(),
        source,
    })?;
    let target = match link.parent() {
        Some(parent) => path::normalize(parent.join(target)),
        None => path::normalize(target),
    };

    let exists = path::node_exists(&target).map_err(|source| CleanError::Inspect {
        path: target.clone(),
        source,
    })?;
    if exists {
        return Ok(());
    }

    if !target.starts_with(snowblock) {
        debug!(
            "keep broken symbolic link pointing outside of snowblock: {:?} -> {:?}",
            link.display(),
            target.display()
        );
        return Ok(());
    }

    remove_file(link).map_err(|source| CleanError::Remove {
        path: link.to_path_buf(),
        source,
    })?;
    info!(
        "removed broken symbolic link: {:?} -> {:?}",
        link.display(),
        target.display()
    );

    Ok(())
}

/// Clean task error types.
#[derive(Debug, thiserror::Error)]
pub enum CleanError {
    /// Target path expansion fails.
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("failed to inspect {:?}", path.display())]
    Inspect {
        path: PathBuf,
        #[source]
        source: IoError,
    },

    #[error("could not read clean target directory {:?}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: IoError,
    },

    #[error("could not read symbolic link {:?}", path.display())]
    ReadLink {
        path: PathBuf,
        #[source]
        source: IoError,
    },

    #[error("failed to remove broken symbolic link {:?}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: IoError,
    },
}
