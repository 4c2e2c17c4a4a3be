// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::DotfilesFixture;

use anyhow::Result;
use indoc::indoc;
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use snowsaw::{
    config::SnowblockSettings, AppConfig, Bootstrap, BootstrapError, Registry, Snowblock,
    SnowblockError, TaskError,
};
use std::{
    fs::{read_link, read_to_string},
    os::unix::fs::symlink,
};

fn bootstrapper(fixture: &DotfilesFixture) -> Result<Bootstrap> {
    let config = AppConfig {
        log_level: None,
        snowblocks: SnowblockSettings {
            base_dirs: vec![fixture.base_dir.clone()],
            paths: vec![],
        },
    }
    .finalize(vec![]);

    Ok(Bootstrap::new(Registry::with_default_runners()?, config))
}

#[sealed_test]
fn link_into_home_and_rerun_as_noop() -> Result<()> {
    let fixture = DotfilesFixture::new(std::env::current_dir()?)?;
    let snowblock = fixture.snowblock(
        "myapp",
        &[("myrc", "answer = 42")],
        Some(r#"[{"link": {"~/.myrc": null}}]"#),
    )?;

    let bootstrap = bootstrapper(&fixture)?;
    let paths = bootstrap.snowblock_paths(vec![])?;
    let report = bootstrap.run(paths.clone())?;
    assert_eq!(report.bootstrapped, vec![snowblock.clone()]);
    assert_eq!(read_link(fixture.home.join(".myrc"))?, snowblock.join("myrc"));
    assert_eq!(read_to_string(fixture.home.join(".myrc"))?, "answer = 42");

    let report = bootstrap.run(paths)?;
    assert_eq!(report.bootstrapped, vec![snowblock.clone()]);
    assert_eq!(fixture.home_entries()?, vec![".myrc"]);
    assert_eq!(read_link(fixture.home.join(".myrc"))?, snowblock.join("myrc"));

    Ok(())
}

#[sealed_test]
fn directory_without_document_has_no_effect() -> Result<()> {
    let fixture = DotfilesFixture::new(std::env::current_dir()?)?;
    let plain = fixture.snowblock("plain", &[("myrc", "")], None)?;

    let mut snowblock = Snowblock::new(&plain);
    snowblock.validate(Registry::with_default_runners()?.get_all())?;
    assert!(!snowblock.is_valid());

    let report = bootstrapper(&fixture)?.run([&plain])?;
    assert_eq!(report.skipped, vec![plain]);
    assert!(report.bootstrapped.is_empty());
    assert!(fixture.home_entries()?.is_empty());

    Ok(())
}

#[sealed_test]
fn run_tasks_in_document_order() -> Result<()> {
    let fixture = DotfilesFixture::new(std::env::current_dir()?)?;
    let snowblock = fixture.snowblock(
        "git",
        &[("gitconfig", "[user]")],
        Some(indoc! {r#"
            [
              { "clean": ["~"] },
              { "shell": [["test -L ~/.gitconfig && echo linked > order || echo unlinked > order", "Check"]] },
              { "link": { "~/.gitconfig": null, "~/.config/git/ignore": { "path": "gitconfig", "create": true, "relative": true } } },
              { "shell": ["test -L ~/.gitconfig && echo linked >> order"] },
              { "unsupported": { "anything": true } }
            ]
        "#}),
    )?;

    // Leftover from an earlier layout of the snowblock, and a foreign broken link.
    symlink(snowblock.join("old-gitconfig"), fixture.home.join(".gitconfig.old"))?;
    symlink(fixture.root.join("elsewhere"), fixture.home.join(".foreign"))?;

    let bootstrap = bootstrapper(&fixture)?;
    bootstrap.run(bootstrap.snowblock_paths(vec![])?)?;

    assert_eq!(read_to_string(snowblock.join("order"))?, "unlinked\nlinked\n");
    assert_eq!(fixture.home_entries()?, vec![".config", ".foreign", ".gitconfig"]);
    assert_eq!(
        read_link(fixture.home.join(".config/git/ignore"))?,
        std::path::PathBuf::from("../../../dotfiles/snowblocks/git/gitconfig")
    );

    Ok(())
}

#[sealed_test]
fn first_failing_snowblock_aborts_run() -> Result<()> {
    let fixture = DotfilesFixture::new(std::env::current_dir()?)?;
    let first = fixture.snowblock(
        "a-first",
        &[("arc", "")],
        Some(r#"[{"link": {"~/.arc": null}}]"#),
    )?;
    fixture.snowblock(
        "b-broken",
        &[],
        Some(r#"[{"shell": ["touch before", "false", "touch after"]}]"#),
    )?;
    fixture.snowblock(
        "c-never",
        &[("crc", "")],
        Some(r#"[{"link": {"~/.crc": null}}]"#),
    )?;

    let bootstrap = bootstrapper(&fixture)?;
    let result = bootstrap.run(bootstrap.snowblock_paths(vec![])?);

    match result {
        Err(BootstrapError::Dispatch {
            snowblock,
            source: SnowblockError::Task { task, source: TaskError::Shell(_) },
        }) => {
            assert_eq!(snowblock, "b-broken");
            assert_eq!(task, "shell");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    assert_eq!(read_link(fixture.home.join(".arc"))?, first.join("arc"));
    assert!(fixture.base_dir.join("b-broken/before").exists());
    assert!(!fixture.base_dir.join("b-broken/after").exists());
    assert_eq!(fixture.home_entries()?, vec![".arc"]);

    Ok(())
}

#[sealed_test]
fn occupied_destination_fails_without_change() -> Result<()> {
    let fixture = DotfilesFixture::new(std::env::current_dir()?)?;
    fixture.snowblock(
        "zsh",
        &[("zshrc", "export EDITOR=vim")],
        Some(r#"[{"link": {"~/.zshrc": null}}]"#),
    )?;
    std::fs::write(fixture.home.join(".zshrc"), "local")?;

    let bootstrap = bootstrapper(&fixture)?;
    let result = bootstrap.run(bootstrap.snowblock_paths(vec![])?);
    assert!(matches!(result, Err(BootstrapError::Dispatch { .. })));
    assert_eq!(read_to_string(fixture.home.join(".zshrc"))?, "local");

    Ok(())
}
