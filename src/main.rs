mod cli;
mod commands;
mod config;
mod paths;
mod progress;
mod ui;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use edgeplan::domain::OperationKind;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub json: bool,
    pub config_path: Option<PathBuf>,
}

impl Context {
    /// Spinners only make sense for a human watching the terminal.
    pub fn shows_progress(&self) -> bool {
        !self.quiet && !self.json
    }
}

fn main() -> std::process::ExitCode {
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
        json: cli.json,
        config_path: cli.config,
    };

    let code = match dispatch(&ctx, cli.command) {
        Ok(code) => code,
        Err(e) => {
            ui::error(&format!("{e:#}"));
            exit_code_for(&e)
        }
    };
    std::process::ExitCode::from(code.code() as u8)
}

fn dispatch(ctx: &Context, command: Command) -> Result<edgeplan::ExitCode> {
    match command {
        Command::Install(args) => commands::run::run(ctx, OperationKind::Install, &args, false),
        Command::Update(args) => commands::run::run(ctx, OperationKind::Update, &args, false),
        Command::Uninstall { args, purge_data } => {
            commands::run::run(ctx, OperationKind::Uninstall, &args, purge_data)
        }
        Command::Plan {
            operation,
            request,
            purge_data,
        } => commands::plan::run(ctx, operation.into(), &request, purge_data),
        Command::State { state_file } => commands::state::run(ctx, state_file),
        Command::Journal {
            run,
            limit,
            journal_file,
        } => commands::journal::run(ctx, run, limit, journal_file),
        Command::Completions { shell } => {
            commands::completions::run(shell)?;
            Ok(edgeplan::ExitCode::Success)
        }
    }
}

/// Classify errors raised outside the engine. Library errors keep their
/// category; anything else is bad local input (config, flags, paths).
fn exit_code_for(error: &anyhow::Error) -> edgeplan::ExitCode {
    error
        .downcast_ref::<edgeplan::Error>()
        .map_or(edgeplan::ExitCode::InvalidInput, edgeplan::ExitCode::from)
}
