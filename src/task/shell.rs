// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Shell command execution.
//!
//! The shell task runs a list of commands through the shell of the invoking
//! user, i.e., `$SHELL -c <command>`, from within the snowblock directory. The
//! child process inherits the full environment of snowsaw. Commands are not
//! sandboxed in any way. They are authored by the user, and can do whatever
//! the user could do from an interactive shell.
//!
//! # Configuration Layout
//!
//! The configuration value is a JSON array. Each entry is one of:
//!
//! - string: command to run.
//! - two element array of strings: command followed by a description.
//! - object: [`ShellCommand`] with description and stream options.
//!
//! The standard streams of the child are only connected to those of snowsaw
//! when the matching option is set. Otherwise they are closed off.
//!
//! All entries are decoded before the first command runs. The first command
//! that fails stops the task.

use crate::task::{json_type, Result, TaskConfig, TaskError, TaskRunner};

use serde::Deserialize;
use std::{
    env::var_os,
    ffi::OsString,
    io::Error as IoError,
    path::Path,
    process::{Command, ExitStatus, Stdio},
};
use tracing::{debug, info, instrument};

/// Name of the task handled by [`Shell`].
pub const TASK_NAME: &str = "shell";

/// Number of values of the array form of a command.
pub const COMMAND_ARRAY_ARITY: usize = 2;

/// Shell used when `$SHELL` is not set.
pub const FALLBACK_SHELL: &str = "/bin/sh";

/// Task runner to run arbitrary shell commands.
#[derive(Debug, Default, Clone, Copy)]
pub struct Shell;

impl Shell {
    #[instrument(skip(self, snowblock), level = "debug")]
    fn execute(&self, command: &ShellCommand, snowblock: &Path) -> Result<(), ShellError> {
        if !command.description.is_empty() {
            info!("{}", command.description);
        }

        let shell = var_os("SHELL")
            .filter(|shell| !shell.is_empty())
            .unwrap_or_else(|| OsString::from(FALLBACK_SHELL));
        debug!("run {:?} through {:?}", command.command, shell);

        let status = Command::new(&shell)
            .arg("-c")
            .arg(&command.command)
            .current_dir(snowblock)
            .stdin(stream(command.stdin))
            .stdout(stream(command.stdout))
            .stderr(stream(command.stderr))
            .status()
            .map_err(|source| ShellError::Spawn {
                command: command.command.clone(),
                source,
            })?;

        if !status.success() {
            return Err(ShellError::CommandExecution {
                command: command.command.clone(),
                status,
            });
        }

        Ok(())
    }
}

impl TaskRunner for Shell {
    fn name(&self) -> &str {
        TASK_NAME
    }

    fn run(&self, config: &TaskConfig, snowblock: &Path) -> Result<()> {
        for command in parse_commands(config)? {
            self.execute(&command, snowblock)?;
        }

        Ok(())
    }
}

fn stream(attach: bool) -> Stdio {
    if attach {
        Stdio::inherit()
    } else {
        Stdio::null()
    }
}

/// Single shell command with its options.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ShellCommand {
    /// Command line handed to the shell.
    pub command: String,

    /// Message logged before the command runs.
    pub description: String,

    /// Connect standard input of snowsaw to the command.
    pub stdin: bool,

    /// Connect standard output of snowsaw to the command.
    pub stdout: bool,

    /// Connect standard error of snowsaw to the command.
    pub stderr: bool,
}

impl ShellCommand {
    /// Construct command without description or attached streams.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }
}

/// Decode shell configuration into commands in declaration order.
///
/// # Errors
///
/// - Return [`TaskError::MalformedConfig`] if the value or one of its entries
///   has an unsupported shape.
/// - Return [`ShellError::InvalidCommandArity`] if an array entry does not
///   hold exactly a command and a description.
/// - Return [`ShellError::EmptyCommand`] if a command is blank.
pub fn parse_commands(config: &TaskConfig) -> Result<Vec<ShellCommand>> {
    let TaskConfig::Array(entries) = config else {
        return Err(TaskError::malformed(
            TASK_NAME,
            format!("expected array but got {}", json_type(config)),
        ));
    };

    let mut commands = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let command = match entry {
            TaskConfig::String(command) => ShellCommand::new(command),
            TaskConfig::Object(_) => serde_json::from_value(entry.clone()).map_err(|error| {
                TaskError::malformed(TASK_NAME, format!("command at index {index}: {error}"))
            })?,
            TaskConfig::Array(values) => parse_command_array(index, values)?,
            other => {
                return Err(TaskError::malformed(
                    TASK_NAME,
                    format!("unsupported command of type {} at index {index}", json_type(other)),
                ))
            }
        };

        if command.command.trim().is_empty() {
            return Err(ShellError::EmptyCommand { index }.into());
        }

        commands.push(command);
    }

    Ok(commands)
}

fn parse_command_array(index: usize, values: &[TaskConfig]) -> Result<ShellCommand> {
    if values.len() != COMMAND_ARRAY_ARITY {
        return Err(ShellError::InvalidCommandArity {
            index,
            expected: COMMAND_ARRAY_ARITY,
            found: values.len(),
        }
        .into());
    }

    let strings = values
        .iter()
        .map(|value| match value {
            TaskConfig::String(string) => Ok(string.clone()),
            other => Err(TaskError::malformed(
                TASK_NAME,
                format!("unsupported {} value in command at index {index}", json_type(other)),
            )),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ShellCommand {
        command: strings[0].clone(),
        description: strings[1].clone(),
        ..ShellCommand::default()
    })
}

/// Shell task error types.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    /// Array form of a command has wrong number of values.
    #[error(
        "invalid amount of shell command arguments at index {index}, expected {expected} but got {found}"
    )]
    InvalidCommandArity {
        index: usize,
        expected: usize,
        found: usize,
    },

    /// Command is empty or whitespace-only.
    #[error("shell command at index {index} must not be empty or whitespace-only")]
    EmptyCommand { index: usize },

    /// Shell process could not be started.
    #[error("failed to execute shell command: {command:?}")]
    Spawn {
        command: String,
        #[source]
        source: IoError,
    },

    /// Command exited unsuccessfully.
    #[error("failed to execute shell command: {command:?} ({status})")]
    CommandExecution { command: String, status: ExitStatus },
}
