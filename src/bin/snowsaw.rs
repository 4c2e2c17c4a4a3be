// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use snowsaw::{AppConfig, Bootstrap, Registry};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::{path::PathBuf, process::exit};
use tracing::{debug, error};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "snowsaw [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file.
    #[arg(long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Enable debug information output.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Comma-separated paths to snowblock base directories.
    #[arg(
        short,
        long,
        global = true,
        value_delimiter = ',',
        value_name = "path"
    )]
    pub basedirs: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self, config: AppConfig) -> Result<()> {
        match self.command {
            Command::Bootstrap(opts) => run_bootstrap(opts, config),
            Command::Info => run_info(),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Bootstrap all configured snowblocks.
    #[command(override_usage = "snowsaw bootstrap [options] [<snowblock>]...")]
    Bootstrap(BootstrapOptions),

    /// Print detailed application information.
    #[command(override_usage = "snowsaw info")]
    Info,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct BootstrapOptions {
    /// Individual snowblocks to process instead of configured base directories.
    #[arg(value_name = "snowblock")]
    pub snowblocks: Vec<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    // INVARIANT: Configuration must be loaded before logging is set up, because it
    // determines the log level.
    let loaded = AppConfig::discover(cli.config.as_deref());
    let level = match (&loaded, cli.debug) {
        (_, true) => "debug".to_string(),
        (Ok(config), false) => config
            .log_level
            .clone()
            .unwrap_or_else(|| snowsaw::config::DEFAULT_LOG_LEVEL.into()),
        (Err(_), false) => snowsaw::config::DEFAULT_LOG_LEVEL.into(),
    };
    init_logging(&level, cli.debug);

    let config = match loaded {
        Ok(config) => config.finalize(cli.basedirs.clone()),
        Err(error) => {
            error!("failed to load application configuration: {error:?}");
            exit(1);
        }
    };

    if let Err(error) = cli.run(config) {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn init_logging(level: &str, debug: bool) {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .unwrap_or_else(|_| EnvFilter::new(snowsaw::config::DEFAULT_LOG_LEVEL))
    };
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();
}

fn run_bootstrap(opts: BootstrapOptions, config: AppConfig) -> Result<()> {
    debug!("run with configuration {config:?}");
    let bootstrap = Bootstrap::new(Registry::with_default_runners()?, config);
    let paths = bootstrap.snowblock_paths(opts.snowblocks)?;
    bootstrap.run(paths)?;

    Ok(())
}

fn run_info() -> Result<()> {
    println!("snowsaw {}", env!("CARGO_PKG_VERSION"));

    Ok(())
}
