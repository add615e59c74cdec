//! Command-line argument definitions for `r2p`.

use clap::Parser;

/// Target value selecting the engine session that launched this process.
pub(crate) const INHERITED_TARGET: &str = "-";

/// Runs radare2 commands against a target and prints their output.
#[derive(Parser, Debug)]
#[command(name = "r2p", version)]
pub(crate) struct Cli {
    /// Decodes each command's output as JSON and pretty-prints it.
    #[arg(long)]
    pub(crate) json: bool,
    /// Logs the engine's diagnostic output while commands run.
    #[arg(long)]
    pub(crate) events: bool,
    /// File or URI to open, or `-` to attach to the inherited session.
    #[arg(value_name = "TARGET")]
    pub(crate) target: String,
    /// Commands to run; read one per line from stdin when omitted.
    #[arg(
        value_name = "COMMAND",
        num_args = 0..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub(crate) commands: Vec<String>,
}

impl Cli {
    /// Target handed to the pipe; empty for the inherited session.
    pub(crate) fn pipe_target(&self) -> &str {
        if self.target == INHERITED_TARGET {
            ""
        } else {
            &self.target
        }
    }
}
