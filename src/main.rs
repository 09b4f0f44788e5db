mod cli;
mod commands;
mod config;
mod paths;
mod progress;
mod runner;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// Explicit config file, if given
    pub config: Option<PathBuf>,
    /// State snapshot to use instead of the host's files
    pub state: Option<PathBuf>,
    /// Host program receiving install commands
    pub program: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
        state: cli.state,
        program: cli.program,
    };
    log::trace!("verbosity {}, host program '{}'", ctx.verbose, ctx.program);

    match cli.command {
        Command::Status => commands::status::run(&ctx),
        Command::Diff(args) => commands::diff::run(&ctx, &args),
        Command::Apply(args) => commands::apply::run(&ctx, &args),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "plugsync", &mut io::stdout());
            Ok(())
        }
    }
}
