// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::DotfilesFixture;

use anyhow::Result;
use indoc::indoc;
use pretty_assertions::assert_eq;
use sealed_test::prelude::*;
use std::{fs::read_link, process::Command};

fn snowsaw() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_snowsaw"));
    command.env_remove("RUST_LOG");
    command
}

#[test]
fn info_prints_version() -> Result<()> {
    let output = snowsaw().arg("info").output()?;
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout)?,
        format!("snowsaw {}\n", env!("CARGO_PKG_VERSION"))
    );

    Ok(())
}

#[sealed_test]
fn bootstrap_base_dirs_from_flag() -> Result<()> {
    let fixture = DotfilesFixture::new(std::env::current_dir()?)?;
    let snowblock = fixture.snowblock(
        "tmux",
        &[("tmux.conf", "set -g mouse on")],
        Some(r#"[{"link": {"~/.tmux.conf": null}}]"#),
    )?;

    let status = snowsaw()
        .arg("--basedirs")
        .arg(&fixture.base_dir)
        .arg("bootstrap")
        .env("HOME", &fixture.home)
        .status()?;
    assert!(status.success());
    assert_eq!(read_link(fixture.home.join(".tmux.conf"))?, snowblock.join("tmux.conf"));

    Ok(())
}

#[sealed_test]
fn bootstrap_explicit_snowblock_from_config_file() -> Result<()> {
    let fixture = DotfilesFixture::new(std::env::current_dir()?)?;
    let snowblock = fixture.snowblock(
        "ssh",
        &[("config", "Host *")],
        Some(r#"[{"link": {"~/.ssh/config": {"create": true}}}]"#),
    )?;
    let config = fixture.root.join("custom.json");
    std::fs::write(
        &config,
        r#"{"log_level": "warn", "snowblocks": {"paths": ["$HOME/../dotfiles/snowblocks/ssh"]}}"#,
    )?;

    let status = snowsaw()
        .arg("--config")
        .arg(&config)
        .arg("bootstrap")
        .env("HOME", &fixture.home)
        .status()?;
    assert!(status.success());
    assert_eq!(read_link(fixture.home.join(".ssh/config"))?, snowblock.join("config"));

    Ok(())
}

#[sealed_test]
fn failing_snowblock_exits_non_zero() -> Result<()> {
    let fixture = DotfilesFixture::new(std::env::current_dir()?)?;
    let snowblock = fixture.snowblock("broken", &[], Some(r#"[{"link": {"~/.missing": null}}]"#))?;

    let status = snowsaw()
        .arg("bootstrap")
        .arg(&snowblock)
        .env("HOME", &fixture.home)
        .status()?;
    assert_eq!(status.code(), Some(1));

    let status = snowsaw()
        .arg("bootstrap")
        .arg(fixture.root.join("does-not-exist"))
        .env("HOME", &fixture.home)
        .status()?;
    assert_eq!(status.code(), Some(1));

    Ok(())
}

#[sealed_test]
fn shell_streams_attach_only_when_requested() -> Result<()> {
    let fixture = DotfilesFixture::new(std::env::current_dir()?)?;
    let quiet = fixture.snowblock("quiet", &[], Some(r#"[{"shell": ["echo mark''er"]}]"#))?;
    let loud = fixture.snowblock(
        "loud",
        &[],
        Some(indoc! {r#"
            [{"shell": [
              {"command": "echo mark''er", "stdout": true},
              {"command": "echo warn''ing >&2", "stderr": true}
            ]}]
        "#}),
    )?;

    let output = snowsaw()
        .arg("bootstrap")
        .arg(&quiet)
        .env("HOME", &fixture.home)
        .output()?;
    assert!(output.status.success());
    assert!(!String::from_utf8(output.stdout)?.contains("marker"));

    let output = snowsaw()
        .arg("bootstrap")
        .arg(&loud)
        .env("HOME", &fixture.home)
        .output()?;
    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout)?.contains("marker"));
    assert!(String::from_utf8(output.stderr)?.contains("warning"));

    Ok(())
}

#[sealed_test]
fn shell_falls_back_without_shell_variable() -> Result<()> {
    let fixture = DotfilesFixture::new(std::env::current_dir()?)?;
    let snowblock = fixture.snowblock(
        "fallback",
        &[],
        Some(r#"[{"shell": [{"command": "echo mark''er", "stdout": true}]}]"#),
    )?;

    let output = snowsaw()
        .arg("bootstrap")
        .arg(&snowblock)
        .env("HOME", &fixture.home)
        .env_remove("SHELL")
        .output()?;
    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout)?.contains("marker"));

    Ok(())
}
