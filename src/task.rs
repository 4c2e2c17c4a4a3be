// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Task runners and their registry.
//!
//! A snowblock declares _what_ should happen to bootstrap it through a list of
//! __task objects__. Each task object maps a task name to a task specific
//! configuration value. A __task runner__ knows _how_ to carry out one kind of
//! task, and is looked up by the name of the task it handles.
//!
//! # Available Task Runners
//!
//! - [`link`]: create symbolic links to files and directories of the snowblock.
//! - [`clean`]: remove broken symbolic links that point into the snowblock.
//! - [`shell`]: run arbitrary shell commands from within the snowblock.
//!
//! # Configuration Values
//!
//! Task configuration values are free-form JSON. Every runner inspects the
//! shape of the value it receives at its own boundary, and decodes it into a
//! typed representation before touching the file system. A value of the wrong
//! shape is rejected with [`TaskError::MalformedConfig`].

pub mod clean;
pub mod link;
pub mod shell;

pub use clean::Clean;
pub use link::Link;
pub use shell::Shell;

use std::{collections::HashMap, fmt::Debug, path::Path, sync::Arc};
use tracing::debug;

/// Raw configuration value of a task object.
pub type TaskConfig = serde_json::Value;

/// Mapping of task names to the runners that handle them.
pub type TaskRunners = HashMap<String, Arc<dyn TaskRunner>>;

/// Handler for one kind of bootstrap task.
///
/// Runners do not keep any state between two calls of [`TaskRunner::run`].
pub trait TaskRunner: Debug + Send + Sync {
    /// Name of the task this runner handles.
    fn name(&self) -> &str;

    /// Process task using given configuration value.
    ///
    /// The snowblock path is absolute, and is used to resolve every relative
    /// path of the configuration.
    ///
    /// # Errors
    ///
    /// - Return [`TaskError`] if the task cannot be carried out in full.
    fn run(&self, config: &TaskConfig, snowblock: &Path) -> Result<()>;
}

/// Registry of available task runners.
///
/// Populated once at startup, and only read afterwards.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    runners: TaskRunners,
}

impl Registry {
    /// Construct new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct registry holding all runners shipped with snowsaw.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::DuplicateTaskName`] if two builtin runners
    ///   share a task name.
    pub fn with_default_runners() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.add(Link::default())?;
        registry.add(Clean)?;
        registry.add(Shell)?;

        Ok(registry)
    }

    /// Register new task runner.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::DuplicateTaskName`] if a runner for the same
    ///   task name is already registered. The registered runner stays active.
    pub fn add(&mut self, runner: impl TaskRunner + 'static) -> Result<(), RegistryError> {
        let name = runner.name().to_string();
        if self.runners.contains_key(&name) {
            return Err(RegistryError::DuplicateTaskName(name));
        }

        debug!("register task runner {name:?}");
        self.runners.insert(name, Arc::new(runner));

        Ok(())
    }

    /// All registered runners by task name.
    pub fn get_all(&self) -> &TaskRunners {
        &self.runners
    }
}

/// Registry error types.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Task name already has a registered runner.
    #[error("runner for task name already exists: {0:?}")]
    DuplicateTaskName(String),
}

/// Task runner error types.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Configuration value has the wrong shape for the task.
    #[error("malformed {task} configuration: {reason}")]
    MalformedConfig { task: &'static str, reason: String },

    /// Link task fails.
    #[error(transparent)]
    Link(#[from] link::LinkError),

    /// Clean task fails.
    #[error(transparent)]
    Clean(#[from] clean::CleanError),

    /// Shell task fails.
    #[error(transparent)]
    Shell(#[from] shell::ShellError),
}

impl TaskError {
    pub(crate) fn malformed(task: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedConfig {
            task,
            reason: reason.into(),
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = TaskError> = std::result::Result<T, E>;

/// Name of the JSON type of a value for error reporting.
pub(crate) fn json_type(value: &TaskConfig) -> &'static str {
    match value {
        TaskConfig::Null => "null",
        TaskConfig::Bool(_) => "boolean",
        TaskConfig::Number(_) => "number",
        TaskConfig::String(_) => "string",
        TaskConfig::Array(_) => "array",
        TaskConfig::Object(_) => "object",
    }
}
