// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for snowblocks, task targets, and the
//! nodes that task runners create or remove. Every function here is pure with
//! respect to program state, though some of them ask the file system about
//! the node behind a path.
//!
//! # Lexical Resolution
//!
//! Paths are resolved _lexically_, i.e., `.` and `..` components are folded
//! without consulting the file system, and symbolic links along the way are
//! never followed. This matters for the task runners: a symbolic link created
//! by snowsaw must point at the path the user declared, and the containment
//! checks of the clean task must compare the declared target of a link, not
//! whatever that target may resolve to.

use std::{
    env::VarError,
    fs::{metadata, symlink_metadata},
    io::{Error as IoError, ErrorKind},
    path::{Component, Path, PathBuf},
};

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`PathError::NoWayHome`] if home directory path cannot be
///   determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(PathError::NoWayHome)
}

/// Expand leading tilde and environment variables of a path.
///
/// # Errors
///
/// - Return [`PathError::Expand`] if a referenced environment variable is not
///   set, or is not valid unicode.
pub fn expand(path: impl AsRef<Path>) -> Result<PathBuf> {
    let raw = path.as_ref().to_string_lossy();
    let expanded = shellexpand::full(&*raw).map_err(|source| PathError::Expand {
        path: path.as_ref().to_path_buf(),
        source,
    })?;

    Ok(PathBuf::from(expanded.into_owned()))
}

/// Expand path and make it absolute against the current working directory.
///
/// # Errors
///
/// - Return [`PathError::Expand`] if shell expansion fails.
/// - Return [`PathError::Absolute`] if the current working directory cannot be
///   determined.
pub fn absolute(path: impl AsRef<Path>) -> Result<PathBuf> {
    let expanded = expand(path.as_ref())?;
    let absolute = std::path::absolute(&expanded).map_err(|source| PathError::Absolute {
        path: expanded.clone(),
        source,
    })?;

    Ok(normalize(absolute))
}

/// Expand path and make it absolute against a given base directory.
///
/// Already absolute paths are only normalized. The base directory is expected
/// to be absolute itself.
///
/// # Errors
///
/// - Return [`PathError::Expand`] if shell expansion fails.
pub fn resolve(path: impl AsRef<Path>, base: impl AsRef<Path>) -> Result<PathBuf> {
    let expanded = expand(path)?;
    if expanded.is_absolute() {
        return Ok(normalize(expanded));
    }

    Ok(normalize(base.as_ref().join(expanded)))
}

/// Lexically fold `.` and `..` components of a path.
///
/// Parent components that would climb above the root are dropped, matching
/// how the kernel treats `/..`.
pub fn normalize(path: impl AsRef<Path>) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.as_ref().components() {
        match component {
            Component::CurDir => continue,
            Component::ParentDir => {
                let climbable = matches!(result.components().next_back(), Some(Component::Normal(_)));
                if climbable {
                    result.pop();
                } else if !result.has_root() {
                    result.push(Component::ParentDir);
                }
            }
            component => result.push(component),
        }
    }

    result
}

/// Express a path relative to a base directory.
///
/// Both paths must be absolute and normalized for the result to be
/// meaningful. Walks up from the base directory with `..` until the common
/// ancestor is reached, then descends into the path.
pub fn relative_to(path: impl AsRef<Path>, base: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref().components().collect::<Vec<_>>();
    let base = base.as_ref().components().collect::<Vec<_>>();
    let common = path
        .iter()
        .zip(base.iter())
        .take_while(|(left, right)| left == right)
        .count();

    let mut result = PathBuf::new();
    for _ in common..base.len() {
        result.push(Component::ParentDir);
    }
    for component in &path[common..] {
        result.push(component);
    }

    if result.as_os_str().is_empty() {
        result.push(Component::CurDir);
    }

    result
}

/// Check if path is a symbolic link without following it.
///
/// # Errors
///
/// - Return [`std::io::Error`] if path cannot be described, including when it
///   does not exist.
pub fn is_symlink(path: impl AsRef<Path>) -> std::io::Result<bool> {
    Ok(symlink_metadata(path)?.file_type().is_symlink())
}

/// Check if a node exists at path, following symbolic links.
///
/// A dangling symbolic link is reported as non-existent.
///
/// # Errors
///
/// - Return [`std::io::Error`] for any failure other than a missing node.
pub fn node_exists(path: impl AsRef<Path>) -> std::io::Result<bool> {
    match metadata(path) {
        Ok(_) => Ok(true),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error),
    }
}

/// Check if a directory exists at path, following symbolic links.
///
/// # Errors
///
/// - Return [`std::io::Error`] for any failure other than a missing node.
pub fn dir_exists(path: impl AsRef<Path>) -> std::io::Result<bool> {
    match metadata(path) {
        Ok(meta) => Ok(meta.is_dir()),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
        Err(error) => Err(error),
    }
}

/// Path resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// No way to determine user's home directory.
    ///
    /// # See Also
    ///
    /// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
    #[error("cannot determine absolute path to user's home directory")]
    NoWayHome,

    /// Shell expansion of path failed.
    #[error("could not expand path {:?}", path.display())]
    Expand {
        path: PathBuf,
        #[source]
        source: shellexpand::LookupError<VarError>,
    },

    /// Path could not be made absolute.
    #[error("could not convert {:?} into absolute path", path.display())]
    Absolute {
        path: PathBuf,
        #[source]
        source: IoError,
    },
}

/// Friendly result alias :3
pub type Result<T, E = PathError> = std::result::Result<T, E>;
