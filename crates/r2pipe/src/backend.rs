//! The capability every transport implements.

use std::fmt;
use std::io::Read;

use crate::error::PipeError;

/// How a backend should wind the engine down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShutdownMode {
    /// Ask the engine to quit and wait for it.
    Graceful,
    /// Ask the engine to quit without saving or prompting.
    Forced,
}

impl ShutdownMode {
    /// Engine command that requests this kind of termination.
    #[must_use]
    pub const fn quit_command(self) -> &'static str {
        match self {
            Self::Graceful => "q",
            Self::Forced => "q!",
        }
    }
}

/// Identifies which transport a [`Backend`] uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Spawned engine process over byte streams.
    Subprocess,
    /// Descriptors inherited from a running engine session.
    Descriptors,
    /// Engine library linked at build time.
    Linked,
    /// Engine library resolved at runtime.
    Dynamic,
    /// Anything supplied through [`Pipe::with_backend`](crate::Pipe::with_backend).
    Custom,
}

impl BackendKind {
    /// Returns the lower-case identifier used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subprocess => "subprocess",
            Self::Descriptors => "descriptors",
            Self::Linked => "linked",
            Self::Dynamic => "dynamic",
            Self::Custom => "custom",
        }
    }

    /// Returns `true` for backends that host the engine in this process.
    #[must_use]
    pub const fn is_in_process(self) -> bool {
        matches!(self, Self::Linked | Self::Dynamic)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Command execution and shutdown for one way of reaching the engine.
///
/// A [`Pipe`](crate::Pipe) owns exactly one boxed backend, chosen when the
/// pipe is built. Tests and embedders can supply their own implementation.
pub trait Backend: Send {
    /// Reports which transport this backend uses.
    fn kind(&self) -> BackendKind;

    /// Runs one command and returns its complete textual response.
    ///
    /// The command is never empty; [`Pipe`](crate::Pipe) checks that first.
    ///
    /// # Errors
    ///
    /// Returns a [`PipeError`] when the command cannot be delivered or its
    /// response cannot be read.
    fn execute(&mut self, command: &str) -> Result<String, PipeError>;

    /// Releases the engine. Called at most once per backend.
    ///
    /// # Errors
    ///
    /// Returns [`PipeError::WaitFailed`] when the engine process cannot be
    /// reaped. The backend is considered released either way.
    fn shutdown(&mut self, mode: ShutdownMode) -> Result<(), PipeError>;

    /// Hands over the engine's raw diagnostic stream, if the transport has one.
    fn take_diagnostics(&mut self) -> Option<Box<dyn Read + Send>> {
        None
    }
}
