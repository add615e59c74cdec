//! CLI entrypoint for the `r2p` engine command runner.
//!
//! The binary delegates to [`r2pipe_cli::run`], which loads configuration,
//! opens the requested target and streams command output to stdout.

use std::io::{self, StderrLock, StdinLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let stdin: StdinLock<'_> = io::stdin().lock();
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    r2pipe_cli::run(std::env::args_os(), stdin, &mut stdout, &mut stderr)
}
