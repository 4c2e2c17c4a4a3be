// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Snowblock domain representation.
//!
//! A __snowblock__ is a directory that represents one unit of dotfiles to
//! bootstrap, e.g., everything needed to set up Git or Vim. Next to the
//! dotfiles themselves, a snowblock holds a __task document__ named
//! [`TASK_DOCUMENT_NAME`] at its top-level.
//!
//! # Task Document Layout
//!
//! The task document is a JSON array of __task objects__. Each task object maps
//! a task name to the configuration of that task:
//!
//! ```json
//! [
//!   { "clean": ["~"] },
//!   { "link": { "~/.gitconfig": null } },
//!   { "shell": [["git config --global core.hooksPath ~/.githooks", "Hooks"]] }
//! ]
//! ```
//!
//! The order of the task objects is significant. Tasks run in exactly the order
//! they are declared in.
//!
//! # Processing
//!
//! A snowblock is processed in two steps. First, it is validated through
//! [`Snowblock::validate`], which resolves its path, loads its task document,
//! and matches every task to a registered task runner. Second, it is
//! dispatched through [`Snowblock::dispatch`], which hands the configuration of
//! each matched task to its runner.
//!
//! A directory without a loadable task document is simply not a snowblock. It
//! is left invalid, and has nothing to dispatch.

use crate::{
    path::{self, PathError},
    task::{TaskConfig, TaskError, TaskRunner, TaskRunners},
};

use serde_json::Map;
use std::{
    fs::read,
    io::{Error as IoError, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{debug, info, instrument};

/// File name of the task document inside of a snowblock.
pub const TASK_DOCUMENT_NAME: &str = "snowblock.json";

/// Single task object of a task document.
pub type TaskObject = Map<String, TaskConfig>;

/// Task matched to the runner that will process it.
#[derive(Debug, Clone)]
pub struct MappedTask {
    /// Name of the task.
    pub name: String,

    /// Runner registered for the task name.
    pub runner: Arc<dyn TaskRunner>,

    /// Configuration handed to the runner.
    pub config: TaskConfig,
}

/// A basic snowblock.
#[derive(Debug, Clone)]
pub struct Snowblock {
    path: PathBuf,
    is_valid: bool,
    task_objects: Vec<TaskObject>,
    task_runner_mapping: Vec<MappedTask>,
    unsupported_tasks: Vec<String>,
}

impl Snowblock {
    /// Construct new unvalidated snowblock.
    ///
    /// The path may be relative, and may contain a leading tilde or environment
    /// variables.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_valid: false,
            task_objects: Vec::new(),
            task_runner_mapping: Vec::new(),
            unsupported_tasks: Vec::new(),
        }
    }

    /// Path of snowblock. Absolute after successful validation.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name of snowblock, i.e., the base name of its directory.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Whether a task document was loaded during validation.
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// Task objects in declaration order.
    pub fn task_objects(&self) -> &[TaskObject] {
        &self.task_objects
    }

    /// Tasks matched to a runner in declaration order.
    pub fn task_runner_mapping(&self) -> &[MappedTask] {
        &self.task_runner_mapping
    }

    /// Names of declared tasks without a registered runner.
    pub fn unsupported_tasks(&self) -> &[String] {
        &self.unsupported_tasks
    }

    /// Validate snowblock, and match its tasks to given runners.
    ///
    /// Resolves the snowblock path into an absolute path, and loads the task
    /// document. Tasks without a registered runner are recorded as unsupported.
    /// A missing or unparsable task document leaves the snowblock invalid
    /// without failing.
    ///
    /// # Errors
    ///
    /// - Return [`SnowblockError::PathResolution`] if path cannot be resolved.
    /// - Return [`SnowblockError::NotADirectory`] if path is not a directory.
    /// - Return [`SnowblockError::Inspect`] if path cannot be inspected.
    #[instrument(skip(self, runners), fields(path = %self.path.display()), level = "debug")]
    pub fn validate(&mut self, runners: &TaskRunners) -> Result<()> {
        let path = path::absolute(&self.path)?;
        let exists = path::dir_exists(&path).map_err(|source| SnowblockError::Inspect {
            path: path.clone(),
            source,
        })?;
        if !exists {
            return Err(SnowblockError::NotADirectory { path });
        }
        self.path = path;

        let document = self.path.join(TASK_DOCUMENT_NAME);
        self.task_objects = match load_task_document(&document) {
            Ok(task_objects) => task_objects,
            Err(error) => {
                debug!(
                    "ignore snowblock directory {:?} without valid task document: {error}",
                    self.name()
                );
                return Ok(());
            }
        };

        for (name, config) in self.task_objects.iter().flat_map(|object| object.iter()) {
            match runners.get(name) {
                Some(runner) => self.task_runner_mapping.push(MappedTask {
                    name: name.clone(),
                    runner: Arc::clone(runner),
                    config: config.clone(),
                }),
                None => {
                    debug!("ignore task without registered runner: {name:?}");
                    self.unsupported_tasks.push(name.clone());
                }
            }
        }

        self.is_valid = true;
        Ok(())
    }

    /// Dispatch every matched task to its runner in declaration order.
    ///
    /// Stops at the first failing task. Changes made by earlier tasks are kept.
    ///
    /// # Errors
    ///
    /// - Return [`SnowblockError::Task`] if a task runner fails.
    #[instrument(skip(self), fields(snowblock = %self.name()), level = "debug")]
    pub fn dispatch(&self) -> Result<()> {
        for task in &self.task_runner_mapping {
            debug!("dispatch task {:?}", task.name);
            task.runner
                .run(&task.config, &self.path)
                .map_err(|source| SnowblockError::Task {
                    task: task.name.clone(),
                    source,
                })?;
        }

        info!("processed {} task(s) of {:?}", self.task_runner_mapping.len(), self.name());
        Ok(())
    }
}

/// Load task objects from task document at given path.
///
/// # Errors
///
/// - Return [`DocumentError::Missing`] if there is no file at path.
/// - Return [`DocumentError::Read`] if file cannot be read.
/// - Return [`DocumentError::Parse`] if file is not an array of JSON objects.
pub fn load_task_document(path: impl AsRef<Path>) -> Result<Vec<TaskObject>, DocumentError> {
    let path = path.as_ref();
    let content = read(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => DocumentError::Missing {
            path: path.to_path_buf(),
        },
        _ => DocumentError::Read {
            path: path.to_path_buf(),
            source,
        },
    })?;

    serde_json::from_slice(&content).map_err(|source| DocumentError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Snowblock error types.
#[derive(Debug, thiserror::Error)]
pub enum SnowblockError {
    /// Snowblock path cannot be resolved.
    #[error("could not resolve snowblock path")]
    PathResolution(#[from] PathError),

    /// Snowblock path is not an existing directory.
    #[error("no such directory: {:?}", path.display())]
    NotADirectory { path: PathBuf },

    #[error("failed to inspect {:?}", path.display())]
    Inspect {
        path: PathBuf,
        #[source]
        source: IoError,
    },

    /// Task runner fails.
    #[error("task {task:?} failed")]
    Task {
        task: String,
        #[source]
        source: TaskError,
    },
}

/// Task document error types.
///
/// These never surface as failures of a snowblock. They only mark a directory
/// as not being a snowblock.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("no such task document: {:?}", path.display())]
    Missing { path: PathBuf },

    #[error("could not read task document {:?}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: IoError,
    },

    #[error("could not parse task document {:?}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Friendly result alias :3
pub type Result<T, E = SnowblockError> = std::result::Result<T, E>;
