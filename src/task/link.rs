// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Symbolic link creation.
//!
//! The link task maps destination paths to source nodes inside of the
//! snowblock, and makes sure a symbolic link at each destination points at its
//! source.
//!
//! # Configuration Layout
//!
//! The configuration value is a JSON object whose keys are destination paths.
//! Each destination maps to one of three shapes:
//!
//! - `null`: use the base name of the destination, minus one leading dot, as
//!   the source path, e.g., `"~/.gitconfig": null` links to `gitconfig`.
//! - string: explicit source path. An empty string skips the destination.
//! - object: full set of [`LinkOptions`].
//!
//! Destination paths may contain a leading tilde and environment variables.
//! Relative source and destination paths are resolved against the snowblock
//! directory.
//!
//! # Existing Destinations
//!
//! A destination that already links to its source is left alone. Any other
//! node sitting at the destination is only replaced if asked for, through the
//! `relink` option for symbolic links, or the `force` option for any node.
//! Forcing never removes a non-empty directory.
//!
//! # Host Specific Links
//!
//! The `hosts` option maps host names to source paths. Only the source path
//! of the current host is linked. The special host name [`DEFAULT_HOST`]
//! matches any host, and is overridden by an exact host name match. When
//! neither matches, the destination is skipped.

use crate::{
    path::{self, PathError},
    task::{json_type, Result, TaskConfig, TaskError, TaskRunner},
};

use serde::Deserialize;
use std::{
    collections::HashMap,
    fs::{create_dir_all, read_link, remove_dir, remove_file, symlink_metadata},
    io::{Error as IoError, ErrorKind},
    os::unix::fs::symlink,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Name of the task handled by [`Link`].
pub const TASK_NAME: &str = "link";

/// Host name mapping that applies to all hosts.
///
/// A single minus is not a valid host name as per RFC 1123, so it can never
/// collide with an actual host.
pub const DEFAULT_HOST: &str = "-";

/// Task runner to create symbolic links for files and directories.
#[derive(Debug, Default, Clone)]
pub struct Link {
    hostname: Option<String>,
}

impl Link {
    /// Construct link runner that treats given name as the current host name.
    pub fn with_hostname(hostname: impl Into<String>) -> Self {
        Self {
            hostname: Some(hostname.into()),
        }
    }

    fn hostname(&self) -> Result<String, LinkError> {
        if let Some(hostname) = &self.hostname {
            return Ok(hostname.clone());
        }

        nix::unistd::gethostname()
            .map_err(LinkError::Hostname)?
            .into_string()
            .map_err(|_| LinkError::HostnameEncoding)
    }

    /// Select source path for current host.
    ///
    /// Returns `None` if the entry is restricted to other hosts, or has no
    /// source path.
    fn select_source<'a>(&self, entry: &'a LinkEntry) -> Result<Option<&'a str>, LinkError> {
        let hosts = &entry.options.hosts;
        if hosts.is_empty() {
            let source = entry.options.path.as_str();
            return Ok((!source.is_empty()).then_some(source));
        }

        let hostname = self.hostname()?;
        if let Some(source) = hosts.get(&hostname) {
            debug!("using source path {source:?} for exact host name match {hostname:?}");
            return Ok(Some(source.as_str()));
        }

        if let Some(source) = hosts.get(DEFAULT_HOST) {
            debug!("using source path {source:?} of default host mapping");
            return Ok(Some(source.as_str()));
        }

        Ok(None)
    }

    #[instrument(skip(self, snowblock), level = "debug")]
    fn link(&self, entry: &LinkEntry, snowblock: &Path) -> Result<(), LinkError> {
        let Some(source) = self.select_source(entry)? else {
            debug!(
                "skip link without source for current host: {:?}",
                entry.destination
            );
            return Ok(());
        };

        let source = path::normalize(snowblock.join(source));
        if !path::node_exists(&source).map_err(|source_err| LinkError::Inspect {
            path: source.clone(),
            source: source_err,
        })? {
            return Err(LinkError::SourceNotFound { path: source });
        }

        let destination = path::resolve(&entry.destination, snowblock)?;
        let options = &entry.options;

        match symlink_metadata(&destination) {
            Ok(meta) if meta.file_type().is_symlink() => {
                let target = link_target(&destination)?;
                if target == source {
                    info!("skip already existing link: {:?}", destination.display());
                    return Ok(());
                }

                if options.relink {
                    warn!("relink already existing symbolic link: {:?}", destination.display());
                } else if options.force {
                    warn!("force link over already existing symbolic link: {:?}", destination.display());
                } else {
                    return Err(LinkError::LinkAlreadyExists {
                        link: destination,
                        target,
                    });
                }

                remove_file(&destination).map_err(|source| LinkError::Remove {
                    path: destination.clone(),
                    source,
                })?;
            }
            Ok(meta) => {
                if !options.force {
                    return Err(LinkError::PathOccupied { path: destination });
                }

                warn!("force link over already existing node: {:?}", destination.display());
                let removal = if meta.is_dir() {
                    remove_dir(&destination)
                } else {
                    remove_file(&destination)
                };
                removal.map_err(|source| LinkError::Remove {
                    path: destination.clone(),
                    source,
                })?;
            }
            Err(error) if error.kind() == ErrorKind::NotFound => {}
            Err(error) => {
                return Err(LinkError::Inspect {
                    path: destination,
                    source: error,
                })
            }
        }

        ensure_parent_dirs(&destination, options.create)?;
        create_link(&source, &destination, options.relative)
    }
}

impl TaskRunner for Link {
    fn name(&self) -> &str {
        TASK_NAME
    }

    fn run(&self, config: &TaskConfig, snowblock: &Path) -> Result<()> {
        for entry in parse_entries(config)? {
            self.link(&entry, snowblock)?;
        }

        Ok(())
    }
}

/// Options of a single link destination.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LinkOptions {
    /// Source path relative to the snowblock directory.
    pub path: String,

    /// Create missing parent directories of the destination.
    pub create: bool,

    /// Replace any existing node at the destination.
    pub force: bool,

    /// Store link target relative to the destination's parent directory.
    pub relative: bool,

    /// Replace an existing symbolic link pointing elsewhere.
    pub relink: bool,

    /// Host specific source paths.
    pub hosts: HashMap<String, String>,
}

/// Declared shape of a link destination's configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkSource {
    /// Source path derived from destination base name.
    Implicit,

    /// Explicit source path.
    Path(String),

    /// Full set of link options.
    Options(LinkOptions),
}

impl TryFrom<&TaskConfig> for LinkSource {
    type Error = TaskError;

    fn try_from(value: &TaskConfig) -> Result<Self, Self::Error> {
        match value {
            TaskConfig::Null => Ok(Self::Implicit),
            TaskConfig::String(source) => Ok(Self::Path(source.clone())),
            TaskConfig::Object(_) => serde_json::from_value(value.clone())
                .map(Self::Options)
                .map_err(|error| TaskError::malformed(TASK_NAME, error.to_string())),
            other => Err(TaskError::malformed(
                TASK_NAME,
                format!("unsupported destination value of type {}", json_type(other)),
            )),
        }
    }
}

/// Destination with resolved options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEntry {
    /// Destination path as declared.
    pub destination: String,

    /// Options with source path filled in.
    pub options: LinkOptions,
}

impl LinkEntry {
    /// Construct entry, deriving the source path when it was left out.
    ///
    /// An explicit empty source path is kept as is, and causes the entry to be
    /// skipped.
    pub fn new(destination: impl Into<String>, source: LinkSource) -> Self {
        let destination = destination.into();
        let options = match source {
            LinkSource::Implicit => LinkOptions {
                path: implicit_source(&destination),
                ..LinkOptions::default()
            },
            LinkSource::Path(path) => LinkOptions {
                path,
                ..LinkOptions::default()
            },
            LinkSource::Options(mut options) => {
                if options.path.is_empty() {
                    options.path = implicit_source(&destination);
                }
                options
            }
        };

        Self {
            destination,
            options,
        }
    }
}

/// Decode link configuration into destination entries in declaration order.
///
/// # Errors
///
/// - Return [`TaskError::MalformedConfig`] if the value is not an object, or a
///   destination maps to an unsupported shape.
pub fn parse_entries(config: &TaskConfig) -> Result<Vec<LinkEntry>> {
    let TaskConfig::Object(destinations) = config else {
        return Err(TaskError::malformed(
            TASK_NAME,
            format!("expected object but got {}", json_type(config)),
        ));
    };

    destinations
        .iter()
        .map(|(destination, value)| -> Result<LinkEntry> {
            Ok(LinkEntry::new(destination, LinkSource::try_from(value)?))
        })
        .collect()
}

fn implicit_source(destination: &str) -> String {
    let base = Path::new(destination)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    match base.strip_prefix('.') {
        Some(stripped) => stripped.to_string(),
        None => base,
    }
}

/// Absolute target of symbolic link, resolved against the link's parent.
fn link_target(link: &Path) -> Result<PathBuf, LinkError> {
    let target = read_link(link).map_err(|source| LinkError::ReadLink {
        path: link.to_path_buf(),
        source,
    })?;

    Ok(match link.parent() {
        Some(parent) => path::normalize(parent.join(target)),
        None => path::normalize(target),
    })
}

fn ensure_parent_dirs(destination: &Path, create: bool) -> Result<(), LinkError> {
    let Some(parent) = destination.parent() else {
        return Ok(());
    };

    let exists = path::dir_exists(parent).map_err(|source| LinkError::Inspect {
        path: parent.to_path_buf(),
        source,
    })?;
    if exists {
        return Ok(());
    }

    if !create {
        return Err(LinkError::MissingParentDir {
            path: parent.to_path_buf(),
        });
    }

    create_dir_all(parent).map_err(|source| LinkError::CreateDir {
        path: parent.to_path_buf(),
        source,
    })?;
    debug!("created parent directory structure: {:?}", parent.display());

    Ok(())
}

fn create_link(source: &Path, destination: &Path, relative: bool) -> Result<(), LinkError> {
    let target = match (relative, destination.parent()) {
        (true, Some(parent)) => path::relative_to(source, parent),
        _ => source.to_path_buf(),
    };

    symlink(&target, destination).map_err(|error| LinkError::Symlink {
        path: destination.to_path_buf(),
        source: error,
    })?;
    info!(
        "created symbolic link: {:?} -> {:?}",
        destination.display(),
        target.display()
    );

    Ok(())
}

/// Link task error types.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Current host name cannot be determined.
    #[error("failed to determine host name")]
    Hostname(#[source] nix::Error),

    /// Current host name is not valid unicode.
    #[error("host name is not valid unicode")]
    HostnameEncoding,

    /// Source node does not exist.
    #[error("no such file or directory: {:?}", path.display())]
    SourceNotFound { path: PathBuf },

    /// Destination is a symbolic link pointing elsewhere.
    #[error("symbolic link already exists: {:?} -> {:?}", link.display(), target.display())]
    LinkAlreadyExists { link: PathBuf, target: PathBuf },

    /// Destination is an existing file or directory.
    #[error("file or directory already exists: {:?}", path.display())]
    PathOccupied { path: PathBuf },

    /// Parent directory of destination is missing.
    #[error("no such directory: {:?}", path.display())]
    MissingParentDir { path: PathBuf },

    /// Path expansion fails.
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("failed to inspect {:?}", path.display())]
    Inspect {
        path: PathBuf,
        #[source]
        source: IoError,
    },

    #[error("failed to read symbolic link {:?}", path.display())]
    ReadLink {
        path: PathBuf,
        #[source]
        source: IoError,
    },

    #[error("failed to remove {:?}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: IoError,
    },

    #[error("failed to create directory {:?}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: IoError,
    },

    #[error("failed to create symbolic link {:?}", path.display())]
    Symlink {
        path: PathBuf,
        #[source]
        source: IoError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use simple_test_case::test_case;
    use std::fs::{create_dir, read_to_string, write};
    use tempfile::TempDir;

    struct Fixture {
        _root: TempDir,
        snowblock: PathBuf,
        home: PathBuf,
    }

    impl Fixture {
        fn new() -> anyhow::Result<Self> {
            let root = tempfile::tempdir()?;
            let snowblock = root.path().join("snowblocks/git");
            let home = root.path().join("home");
            create_dir_all(&snowblock)?;
            create_dir(&home)?;
            write(snowblock.join("gitconfig"), "[user]")?;
            write(snowblock.join("gitignore"), "target/")?;

            Ok(Self {
                _root: root,
                snowblock,
                home,
            })
        }

        fn dest(&self, name: &str) -> PathBuf {
            self.home.join(name)
        }

        fn run(&self, config: TaskConfig) -> Result<()> {
            Link::with_hostname("frost").run(&config, &self.snowblock)
        }
    }

    #[test_case(json!(null), "gitconfig"; "null uses base name")]
    #[test_case(json!("gitignore"), "gitignore"; "string source")]
    #[test_case(json!({"path": "gitignore"}), "gitignore"; "object source")]
    #[test_case(json!({"create": true}), "gitconfig"; "object without path")]
    #[test_case(json!({"path": ""}), "gitconfig"; "object with empty path")]
    #[test_case(json!(""), ""; "empty string kept")]
    #[test]
    fn parse_entry_shapes(value: TaskConfig, expect: &str) -> anyhow::Result<()> {
        let entries = parse_entries(&json!({ "~/.gitconfig": value }))?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].destination, "~/.gitconfig");
        assert_eq!(entries[0].options.path, expect);
        Ok(())
    }

    #[test_case(json!(["gitconfig"]); "array config")]
    #[test_case(json!({"~/.gitconfig": 42}); "number destination")]
    #[test_case(json!({"~/.gitconfig": {"force": "yes"}}); "wrong option type")]
    #[test]
    fn parse_rejects_malformed(config: TaskConfig) {
        let result = parse_entries(&config);
        assert!(matches!(result, Err(TaskError::MalformedConfig { task: "link", .. })));
    }

    #[test]
    fn parse_keeps_declaration_order() -> anyhow::Result<()> {
        let config: TaskConfig =
            serde_json::from_str(r#"{"~/.zz": null, "~/.aa": null, "~/.mm": null}"#)?;
        let entries = parse_entries(&config)?
            .into_iter()
            .map(|entry| entry.destination)
            .collect::<Vec<_>>();
        assert_eq!(entries, vec!["~/.zz", "~/.aa", "~/.mm"]);
        Ok(())
    }

    #[test]
    fn create_link_and_stay_idempotent() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let dest = fixture.dest(".gitconfig");
        let config = json!({ dest.to_string_lossy(): null });

        fixture.run(config.clone())?;
        assert_eq!(read_link(&dest)?, fixture.snowblock.join("gitconfig"));
        assert_eq!(read_to_string(&dest)?, "[user]");

        fixture.run(config)?;
        assert_eq!(read_link(&dest)?, fixture.snowblock.join("gitconfig"));
        Ok(())
    }

    #[test]
    fn create_relative_link() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let dest = fixture.dest(".gitconfig");
        fixture.run(json!({ dest.to_string_lossy(): { "relative": true } }))?;

        assert_eq!(read_link(&dest)?, PathBuf::from("../snowblocks/git/gitconfig"));
        assert_eq!(read_to_string(&dest)?, "[user]");

        // Relative link to the source counts as already linked.
        fixture.run(json!({ dest.to_string_lossy(): null }))?;
        assert_eq!(read_link(&dest)?, PathBuf::from("../snowblocks/git/gitconfig"));
        Ok(())
    }

    #[test]
    fn relative_destination_resolves_against_snowblock() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        fixture.run(json!({ "../../home/.gitignore": null }))?;

        assert_eq!(
            read_link(fixture.dest(".gitignore"))?,
            fixture.snowblock.join("gitignore")
        );
        Ok(())
    }

    #[test]
    fn missing_source_fails() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let dest = fixture.dest(".vimrc");
        let result = fixture.run(json!({ dest.to_string_lossy(): null }));

        assert!(matches!(
            result,
            Err(TaskError::Link(LinkError::SourceNotFound { .. }))
        ));
        assert!(symlink_metadata(&dest).is_err());
        Ok(())
    }

    #[test]
    fn existing_foreign_link_without_policy_fails_untouched() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let dest = fixture.dest(".gitconfig");
        symlink(fixture.snowblock.join("gitignore"), &dest)?;

        let result = fixture.run(json!({ dest.to_string_lossy(): null }));
        assert!(matches!(
            result,
            Err(TaskError::Link(LinkError::LinkAlreadyExists { .. }))
        ));
        assert_eq!(read_link(&dest)?, fixture.snowblock.join("gitignore"));
        Ok(())
    }

    #[test_case(true, false; "relink")]
    #[test_case(false, true; "force")]
    #[test_case(true, true; "relink and force")]
    #[test]
    fn existing_foreign_link_replaced(relink: bool, force: bool) -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let dest = fixture.dest(".gitconfig");
        symlink(fixture.snowblock.join("gitignore"), &dest)?;

        fixture.run(json!({ dest.to_string_lossy(): { "relink": relink, "force": force } }))?;
        assert_eq!(read_link(&dest)?, fixture.snowblock.join("gitconfig"));
        Ok(())
    }

    #[test]
    fn existing_file_without_force_fails() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let dest = fixture.dest(".gitconfig");
        write(&dest, "local")?;

        let result = fixture.run(json!({ dest.to_string_lossy(): { "relink": true } }));
        assert!(matches!(
            result,
            Err(TaskError::Link(LinkError::PathOccupied { .. }))
        ));
        assert_eq!(read_to_string(&dest)?, "local");
        Ok(())
    }

    #[test]
    fn existing_file_and_dir_forced() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let file_dest = fixture.dest(".gitconfig");
        let dir_dest = fixture.dest(".gitignore");
        write(&file_dest, "local")?;
        create_dir(&dir_dest)?;

        fixture.run(json!({
            file_dest.to_string_lossy(): { "force": true },
            dir_dest.to_string_lossy(): { "force": true },
        }))?;

        assert_eq!(read_link(&file_dest)?, fixture.snowblock.join("gitconfig"));
        assert_eq!(read_link(&dir_dest)?, fixture.snowblock.join("gitignore"));
        Ok(())
    }

    #[test]
    fn forced_non_empty_dir_is_kept() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let dest = fixture.dest(".gitconfig");
        create_dir_all(dest.join("deep/nested"))?;
        write(dest.join("deep/nested/precious"), "keep me")?;

        let result = fixture.run(json!({ dest.to_string_lossy(): { "force": true } }));
        assert!(matches!(
            result,
            Err(TaskError::Link(LinkError::Remove { .. }))
        ));
        assert!(!symlink_metadata(&dest)?.file_type().is_symlink());
        assert_eq!(read_to_string(dest.join("deep/nested/precious"))?, "keep me");
        Ok(())
    }

    #[test]
    fn empty_source_path_skips_destination() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let dest = fixture.dest(".gitconfig");
        fixture.run(json!({ dest.to_string_lossy(): "" }))?;

        assert!(symlink_metadata(&dest).is_err());
        Ok(())
    }

    #[test]
    fn missing_parent_needs_create() -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let dest = fixture.dest(".config/git/config");

        let result = fixture.run(json!({ dest.to_string_lossy(): "gitconfig" }));
        assert!(matches!(
            result,
            Err(TaskError::Link(LinkError::MissingParentDir { .. }))
        ));
        assert!(!fixture.dest(".config").exists());

        fixture.run(json!({ dest.to_string_lossy(): { "path": "gitconfig", "create": true } }))?;
        assert_eq!(read_link(&dest)?, fixture.snowblock.join("gitconfig"));
        Ok(())
    }

    #[test_case(json!({"frost": "gitignore", "-": "gitconfig"}), Some("gitignore"); "exact host wins")]
    #[test_case(json!({"blizzard": "gitignore", "-": "gitconfig"}), Some("gitconfig"); "default host")]
    #[test_case(json!({"blizzard": "gitignore"}), None; "no matching host")]
    #[test]
    fn host_specific_source(hosts: TaskConfig, expect: Option<&str>) -> anyhow::Result<()> {
        let fixture = Fixture::new()?;
        let dest = fixture.dest(".gitconfig");
        fixture.run(json!({ dest.to_string_lossy(): { "hosts": hosts } }))?;

        match expect {
            Some(source) => assert_eq!(read_link(&dest)?, fixture.snowblock.join(source)),
            None => assert!(symlink_metadata(&dest).is_err()),
        }
        Ok(())
    }
}
