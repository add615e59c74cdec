//! Error types for the CLI runtime.

use std::io;
use std::sync::Arc;

use r2pipe::PipeError;
use thiserror::Error;

use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("failed to initialise logging: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("failed to open {target:?}: {source}")]
    Open { target: String, source: PipeError },
    #[error("command {command:?} failed: {source}")]
    Command { command: String, source: PipeError },
    #[error("failed to follow engine diagnostics: {0}")]
    Events(PipeError),
    #[error("failed to shut down the engine: {0}")]
    Shutdown(PipeError),
    #[error("the linked transport is not available in this build")]
    LinkedUnavailable,
    #[error("failed to read commands from stdin: {0}")]
    ReadCommands(io::Error),
    #[error("failed to serialise JSON output: {0}")]
    SerialiseOutput(serde_json::Error),
    #[error("failed to write command output: {0}")]
    WriteOutput(io::Error),
}
