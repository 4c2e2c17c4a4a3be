// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! A lightweight, plugin-driven and dynamic dotfiles bootstrapper.
//!
//! Dotfiles are organized into __snowblocks__, i.e., directories that each
//! bundle the files of one tool together with a declarative list of tasks that
//! bootstrap them. Snowsaw walks the configured snowblocks, and dispatches each
//! declared task to the [`task::TaskRunner`] registered for it.
//!
//! # See Also
//!
//! 1. [`snowblock`]
//! 2. [`task`]
//! 3. [`bootstrap`]

pub mod bootstrap;
pub mod config;
pub mod path;
pub mod snowblock;
pub mod task;

pub use bootstrap::{Bootstrap, BootstrapError, BootstrapReport};
pub use config::AppConfig;
pub use snowblock::{Snowblock, SnowblockError};
pub use task::{Registry, RegistryError, TaskConfig, TaskError, TaskRunner};
