//! Command-line runtime for `r2p`.
#![deny(missing_docs)]
//!
//! `r2p` opens a target with the configured transport, runs the commands
//! given after the target (or read one per line from stdin) and writes each
//! output to stdout. Configuration flags must come before any other
//! argument; see [`run`].

mod cli;
mod config;
mod errors;
mod session;
mod telemetry;

use std::ffi::OsString;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use clap::Parser;
use r2pipe::{Pipe, PipeError};
use tracing::debug;

use cli::Cli;
use config::split_config_arguments;
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
pub(crate) use errors::AppError;

/// Runs the CLI using the provided arguments and IO handles.
///
/// Leading `--config-path`, `--engine`, `--engine-args`, `--library`,
/// `--transport`, `--event-poll-ms`, `--log-filter` and `--log-format`
/// flags are handed to the configuration loader; the rest is parsed as
/// `[--json] [--events] TARGET [COMMAND...]`.
#[must_use]
pub fn run<I, R, W, E>(args: I, stdin: R, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: BufRead,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdin, stdout, stderr, &OrthoConfigLoader)
}

/// Runs the CLI with a custom configuration loader.
pub(crate) fn run_with_loader<I, R, W, E, L>(
    args: I,
    stdin: R,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: BufRead,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    match try_run(args, stdin, stdout, loader) {
        Ok(()) => ExitCode::SUCCESS,
        Err(AppError::CliUsage(error)) if !error.use_stderr() => {
            drop(write!(stdout, "{error}"));
            ExitCode::SUCCESS
        }
        Err(error) => {
            drop(writeln!(stderr, "{error}"));
            ExitCode::FAILURE
        }
    }
}

fn try_run<I, R, W, L>(args: I, stdin: R, stdout: &mut W, loader: &L) -> Result<(), AppError>
where
    I: IntoIterator<Item = OsString>,
    R: BufRead,
    W: Write,
    L: ConfigLoader,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let split = split_config_arguments(&args);
    let cli = Cli::try_parse_from(&split.cli_arguments).map_err(AppError::CliUsage)?;
    let config = loader.load(&split.config_arguments)?;
    telemetry::initialise(&config)?;

    let mut pipe = session::open(&config, cli.pipe_target())?;
    let tailer = if cli.events {
        Some(session::follow_events(&mut pipe, &config)?)
    } else {
        None
    };

    let outcome = run_commands(&mut pipe, &cli, stdin, stdout);
    let shutdown = pipe.shutdown().map_err(AppError::Shutdown);
    if let Some(tailer) = tailer {
        tailer.stop();
        let exit = tailer.join();
        debug!(target: "r2p", ?exit, "diagnostic tailer finished");
    }
    outcome.and(shutdown)
}

fn run_commands<R, W>(pipe: &mut Pipe, cli: &Cli, stdin: R, stdout: &mut W) -> Result<(), AppError>
where
    R: BufRead,
    W: Write,
{
    if !cli.commands.is_empty() {
        for command in &cli.commands {
            run_command(pipe, command, cli.json, stdout)?;
        }
        return Ok(());
    }

    for line in stdin.lines() {
        let line = line.map_err(AppError::ReadCommands)?;
        let command = line.trim();
        if command.is_empty() || command.starts_with('#') {
            continue;
        }
        run_command(pipe, command, cli.json, stdout)?;
    }
    Ok(())
}

fn run_command<W: Write>(
    pipe: &mut Pipe,
    command: &str,
    json: bool,
    stdout: &mut W,
) -> Result<(), AppError> {
    let command_error = |source: PipeError| AppError::Command {
        command: command.to_owned(),
        source,
    };
    let rendered = if json {
        let value = pipe.execute_json(command).map_err(command_error)?;
        serde_json::to_string_pretty(&value).map_err(AppError::SerialiseOutput)?
    } else {
        pipe.execute(command).map_err(command_error)?
    };
    write_output(stdout, &rendered).map_err(AppError::WriteOutput)
}

/// Writes `text` followed by a newline unless it is empty or already ends
/// with one.
fn write_output<W: Write>(stdout: &mut W, text: &str) -> io::Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    stdout.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()
}

#[cfg(test)]
mod tests;
