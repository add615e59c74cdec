//! Error taxonomy for pipe construction, command execution and shutdown.
//!
//! I/O, JSON and loader errors are wrapped in `Arc` so the enum stays small
//! enough for the `result_large_err` lint and can be cloned.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors raised by [`Pipe`](crate::Pipe) and its backends.
#[derive(Debug, Clone, Error)]
pub enum PipeError {
    /// The caller passed an empty command string.
    #[error("command cannot be empty")]
    EmptyCommand,

    /// The command cannot be handed to the engine as given.
    #[error("invalid command {command:?}: {message}")]
    InvalidCommand {
        /// The rejected command.
        command: String,
        /// Why the command was rejected.
        message: String,
    },

    /// No backend is bound, usually because the pipe was shut down.
    #[error("pipe is not connected to an engine")]
    NotConnected,

    /// The engine could not be started or never reported readiness.
    #[error("engine failed to start: {message}")]
    StartupFailed {
        /// Description of the startup failure.
        message: String,
        /// Optional underlying I/O error.
        #[source]
        source: Option<Arc<io::Error>>,
    },

    /// None of the candidate shared library paths could be opened.
    #[error("could not open {library} from any of {} candidate paths", .attempted.len())]
    LibraryNotFound {
        /// Library stem that was searched for.
        library: String,
        /// Every path that was tried, in order.
        attempted: Vec<PathBuf>,
    },

    /// The shared library opened but a required entry point is missing.
    #[error("symbol {symbol} not found in {}", .library.display())]
    SymbolNotFound {
        /// Name of the missing entry point.
        symbol: &'static str,
        /// Library the lookup ran against.
        library: PathBuf,
        /// Loader error reported by the platform.
        #[source]
        source: Arc<libloading::Error>,
    },

    /// The in-process "create context" entry point returned a null handle.
    #[error("engine core initialisation returned an empty handle")]
    CoreInitFailed,

    /// Reading from or writing to an engine stream failed mid-session.
    #[error("I/O error while running {command:?}: {source}")]
    Io {
        /// Command being executed when the failure occurred.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// Command output could not be decoded as JSON.
    #[error("failed to parse JSON output of {command:?}: {source}")]
    Parse {
        /// Command whose output failed to decode.
        command: String,
        /// Underlying decoder error.
        #[source]
        source: Arc<serde_json::Error>,
    },

    /// Waiting for the engine process to exit failed.
    #[error("failed to wait for engine process exit: {source}")]
    WaitFailed {
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The diagnostic stream for an event registration could not be opened.
    #[error("failed to open diagnostic stream {} for event {event:?}: {source}", .path.display())]
    DiagnosticStream {
        /// Event name the registration was for.
        event: String,
        /// Path reported by the engine.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
}

impl PipeError {
    pub(crate) fn startup(message: impl Into<String>) -> Self {
        Self::StartupFailed {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn startup_io(message: impl Into<String>, source: io::Error) -> Self {
        Self::StartupFailed {
            message: message.into(),
            source: Some(Arc::new(source)),
        }
    }

    pub(crate) fn io(command: &str, source: io::Error) -> Self {
        Self::Io {
            command: command.to_owned(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn parse(command: &str, source: serde_json::Error) -> Self {
        Self::Parse {
            command: command.to_owned(),
            source: Arc::new(source),
        }
    }

    /// Returns `true` for failures raised while constructing a pipe.
    ///
    /// No handle exists after these errors, so there is nothing to shut down.
    #[must_use]
    pub const fn is_startup_error(&self) -> bool {
        matches!(
            self,
            Self::StartupFailed { .. }
                | Self::LibraryNotFound { .. }
                | Self::SymbolNotFound { .. }
                | Self::CoreInitFailed
        )
    }

    /// Returns `true` when the pipe has no usable engine behind it.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::NotConnected | Self::Io { .. })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn empty_command_message_is_stable() {
        assert_eq!(PipeError::EmptyCommand.to_string(), "command cannot be empty");
    }

    #[rstest]
    #[case(PipeError::startup("boom"), true)]
    #[case(PipeError::CoreInitFailed, true)]
    #[case(PipeError::NotConnected, false)]
    #[case(PipeError::EmptyCommand, false)]
    fn classifies_startup_errors(#[case] error: PipeError, #[case] expected: bool) {
        assert_eq!(error.is_startup_error(), expected);
    }

    #[rstest]
    fn io_errors_are_connection_errors() {
        let error = PipeError::io("pd 1", io::Error::new(io::ErrorKind::BrokenPipe, "gone"));

        assert!(error.is_connection_error());
        assert!(error.to_string().contains("\"pd 1\""));
    }

    #[rstest]
    fn clones_share_the_underlying_source() {
        let error = PipeError::io("ij", io::Error::new(io::ErrorKind::UnexpectedEof, "closed"));

        let copy = error.clone();

        assert_eq!(copy.to_string(), error.to_string());
        match (&error, &copy) {
            (PipeError::Io { source: first, .. }, PipeError::Io { source: second, .. }) => {
                assert!(Arc::ptr_eq(first, second));
            }
            other => panic!("expected two I/O errors, got {other:?}"),
        }
    }

    #[rstest]
    fn library_not_found_reports_candidate_count() {
        let error = PipeError::LibraryNotFound {
            library: String::from("libr_core"),
            attempted: vec![PathBuf::from("a.so"), PathBuf::from("b.so")],
        };

        assert_eq!(
            error.to_string(),
            "could not open libr_core from any of 2 candidate paths"
        );
    }

    #[rstest]
    fn startup_io_keeps_source() {
        let error = PipeError::startup_io(
            "failed to start radare2",
            io::Error::new(io::ErrorKind::NotFound, "missing"),
        );

        assert!(std::error::Error::source(&error).is_some());
    }
}
