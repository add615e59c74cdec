//! The command pipe handle.

use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};

use crate::backend::{Backend, BackendKind, ShutdownMode};
use crate::error::PipeError;
use crate::events::{self, DIAGNOSTIC_STREAM_COMMAND, Event, EventTailer, TailerOptions};
use crate::native::{DEFAULT_LIBRARY, InProcessBackend, Resolver};
use crate::subprocess::{SpawnConfig, SubprocessBackend};

/// Log target for pipe-level operations.
const PIPE_TARGET: &str = "r2pipe::pipe";

/// A session with one engine instance.
///
/// Every constructor binds exactly one backend. Commands run strictly one at
/// a time because each call borrows the pipe mutably. After
/// [`shutdown`](Self::shutdown) the pipe stays usable as a value but every
/// command fails with [`PipeError::NotConnected`].
///
/// # Examples
///
/// ```no_run
/// use r2pipe::Pipe;
///
/// let mut pipe = Pipe::open("/bin/ls")?;
/// let info: serde_json::Value = pipe.execute_json("ij")?;
/// println!("{}", info["bin"]["arch"]);
/// pipe.shutdown()?;
/// # Ok::<(), r2pipe::PipeError>(())
/// ```
pub struct Pipe {
    target: String,
    backend: Option<Box<dyn Backend>>,
}

impl Pipe {
    /// Opens `target` with the default engine, or adopts the inherited
    /// descriptors when `target` is empty.
    ///
    /// # Errors
    ///
    /// See [`spawn`](Self::spawn) and [`from_env`](Self::from_env).
    pub fn open(target: &str) -> Result<Self, PipeError> {
        if target.is_empty() {
            Self::from_env()
        } else {
            Self::spawn(target, &SpawnConfig::default())
        }
    }

    /// Spawns the engine described by `config` on `target`.
    ///
    /// # Errors
    ///
    /// Returns [`PipeError::StartupFailed`] if the engine cannot be started
    /// or never signals readiness.
    pub fn spawn(target: &str, config: &SpawnConfig) -> Result<Self, PipeError> {
        let backend = SubprocessBackend::spawn(target, config)?;
        Ok(Self::with_backend(target, backend))
    }

    /// Attaches to the engine session that launched this process.
    ///
    /// # Errors
    ///
    /// Returns [`PipeError::StartupFailed`] if `R2PIPE_IN` or `R2PIPE_OUT`
    /// is missing or malformed.
    pub fn from_env() -> Result<Self, PipeError> {
        let backend = SubprocessBackend::from_env()?;
        Ok(Self::with_backend("", backend))
    }

    /// Speaks the framed protocol over caller-supplied streams.
    #[must_use]
    pub fn from_streams(
        reader: impl Read + Send + 'static,
        writer: impl Write + Send + 'static,
    ) -> Self {
        Self::with_backend("", SubprocessBackend::from_streams(reader, writer))
    }

    /// Hosts the engine in this process through its shared library, located
    /// at runtime.
    ///
    /// A non-empty `target` is opened with `o <target>`; a failure to open it
    /// is logged and does not fail construction.
    ///
    /// # Errors
    ///
    /// Returns [`PipeError::LibraryNotFound`] or [`PipeError::SymbolNotFound`]
    /// when the library cannot be resolved, and
    /// [`PipeError::CoreInitFailed`] when no context can be created.
    pub fn dynamic(target: &str) -> Result<Self, PipeError> {
        Self::dynamic_with_library(target, DEFAULT_LIBRARY)
    }

    /// [`dynamic`](Self::dynamic) searching for `library` instead of
    /// `libr_core`. The stem is given without its platform extension.
    ///
    /// # Errors
    ///
    /// As for [`dynamic`](Self::dynamic).
    pub fn dynamic_with_library(target: &str, library: &str) -> Result<Self, PipeError> {
        let resolver = Resolver::for_library(library);
        let api = resolver.ensure_initialized()?;
        if let Some(path) = resolver.library_path() {
            debug!(
                target: PIPE_TARGET,
                library = resolver.stem(),
                path = %path.display(),
                "using engine library"
            );
        }
        let backend = InProcessBackend::create(BackendKind::Dynamic, api)?;
        Ok(Self::with_open_target(target, backend))
    }

    /// Hosts the engine in this process through entry points linked at
    /// build time.
    ///
    /// # Errors
    ///
    /// Returns [`PipeError::CoreInitFailed`] when no context can be created.
    #[cfg(feature = "linked")]
    pub fn linked(target: &str) -> Result<Self, PipeError> {
        let backend = InProcessBackend::create(BackendKind::Linked, crate::native::linked_api())?;
        Ok(Self::with_open_target(target, backend))
    }

    /// Wraps an arbitrary backend. Nothing is sent to it.
    #[must_use]
    pub fn with_backend(target: impl Into<String>, backend: impl Backend + 'static) -> Self {
        let target = target.into();
        debug!(target: PIPE_TARGET, backend = %backend.kind(), engine_target = %target, "pipe opened");
        Self {
            target,
            backend: Some(Box::new(backend)),
        }
    }

    pub(crate) fn with_open_target(target: &str, backend: impl Backend + 'static) -> Self {
        let mut pipe = Self::with_backend(target, backend);
        if !target.is_empty() {
            let command = format!("o {target}");
            if let Err(error) = pipe.execute(&command) {
                warn!(target: PIPE_TARGET, engine_target = target, %error, "failed to open target");
            }
        }
        pipe
    }

    /// Target the pipe was opened on; empty for inherited sessions.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Transport in use, or `None` after shutdown.
    #[must_use]
    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.backend.as_ref().map(|backend| backend.kind())
    }

    /// Returns `true` until the pipe is shut down.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.backend.is_some()
    }

    /// Runs `command` and returns its output verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`PipeError::EmptyCommand`] for an empty command,
    /// [`PipeError::NotConnected`] after shutdown, and otherwise whatever the
    /// backend reports.
    pub fn execute(&mut self, command: &str) -> Result<String, PipeError> {
        if command.is_empty() {
            return Err(PipeError::EmptyCommand);
        }
        let backend = self.backend.as_mut().ok_or(PipeError::NotConnected)?;
        trace!(target: PIPE_TARGET, command, backend = %backend.kind(), "executing command");
        let output = backend.execute(command)?;
        trace!(target: PIPE_TARGET, command, bytes = output.len(), "command finished");
        Ok(output)
    }

    /// Formats a command and runs it.
    ///
    /// ```no_run
    /// # let mut pipe = r2pipe::Pipe::open("/bin/ls")?;
    /// let bytes = pipe.execute_fmt(format_args!("p8 {} @ {:#x}", 16, 0x1000))?;
    /// # Ok::<(), r2pipe::PipeError>(())
    /// ```
    ///
    /// # Errors
    ///
    /// As for [`execute`](Self::execute).
    pub fn execute_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<String, PipeError> {
        self.execute(&args.to_string())
    }

    /// Runs `command` and parses its output as a JSON document.
    ///
    /// # Errors
    ///
    /// As for [`execute`](Self::execute), plus [`PipeError::Parse`] when the
    /// output is not valid JSON, including when it is empty.
    pub fn execute_json(&mut self, command: &str) -> Result<serde_json::Value, PipeError> {
        self.execute_json_into(command)
    }

    /// Runs `command` and decodes its JSON output into `T`.
    ///
    /// # Errors
    ///
    /// As for [`execute_json`](Self::execute_json).
    pub fn execute_json_into<T: DeserializeOwned>(&mut self, command: &str) -> Result<T, PipeError> {
        let output = self.execute(command)?;
        serde_json::from_str(&output).map_err(|error| PipeError::parse(command, error))
    }

    /// Formats a command, runs it and decodes its JSON output into `T`.
    ///
    /// # Errors
    ///
    /// As for [`execute_json`](Self::execute_json).
    pub fn execute_json_fmt<T: DeserializeOwned>(
        &mut self,
        args: fmt::Arguments<'_>,
    ) -> Result<T, PipeError> {
        self.execute_json_into(&args.to_string())
    }

    /// Ends the session, asking the engine to quit.
    ///
    /// Resources are released even when the backend reports an error, and
    /// only the first call does any work.
    ///
    /// # Errors
    ///
    /// Returns the backend's shutdown error, such as
    /// [`PipeError::WaitFailed`].
    pub fn shutdown(&mut self) -> Result<(), PipeError> {
        self.release(ShutdownMode::Graceful)
    }

    /// Ends the session with the engine's forced quit command.
    ///
    /// # Errors
    ///
    /// As for [`shutdown`](Self::shutdown).
    pub fn force_shutdown(&mut self) -> Result<(), PipeError> {
        self.release(ShutdownMode::Forced)
    }

    fn release(&mut self, mode: ShutdownMode) -> Result<(), PipeError> {
        let Some(mut backend) = self.backend.take() else {
            trace!(target: PIPE_TARGET, "pipe already shut down");
            return Ok(());
        };
        debug!(target: PIPE_TARGET, backend = %backend.kind(), ?mode, "shutting down pipe");
        backend.shutdown(mode)
    }

    /// Hands over the engine's raw stderr stream, when the backend has one.
    ///
    /// Only a spawned engine offers it, and only once.
    pub fn take_diagnostics(&mut self) -> Option<Box<dyn Read + Send>> {
        self.backend.as_mut()?.take_diagnostics()
    }

    /// Tails the engine's diagnostic stream on a background thread.
    ///
    /// `callback` receives each batch of new text together with `event` and
    /// `user`, and keeps the thread alive by returning `true`.
    ///
    /// # Errors
    ///
    /// Returns the error of the `===stderr` query, or
    /// [`PipeError::DiagnosticStream`] when the reported path cannot be
    /// opened or the thread cannot be started.
    pub fn on<U, F>(&mut self, event: &str, user: U, callback: F) -> Result<EventTailer, PipeError>
    where
        U: Send + 'static,
        F: FnMut(&Event<'_, U>) -> bool + Send + 'static,
    {
        self.on_with_options(event, user, TailerOptions::default(), callback)
    }

    /// [`on`](Self::on) with an explicit poll interval.
    ///
    /// # Errors
    ///
    /// As for [`on`](Self::on).
    pub fn on_with_options<U, F>(
        &mut self,
        event: &str,
        user: U,
        options: TailerOptions,
        callback: F,
    ) -> Result<EventTailer, PipeError>
    where
        U: Send + 'static,
        F: FnMut(&Event<'_, U>) -> bool + Send + 'static,
    {
        let reported = self.execute(DIAGNOSTIC_STREAM_COMMAND)?;
        let path = PathBuf::from(reported.trim());
        let stream_error = |source: std::io::Error| PipeError::DiagnosticStream {
            event: event.to_owned(),
            path: path.clone(),
            source: Arc::new(source),
        };

        let stream = File::open(&path).map_err(stream_error)?;
        debug!(target: PIPE_TARGET, event, path = %path.display(), "tailing diagnostic stream");
        events::spawn(event, user, stream, options, callback).map_err(stream_error)
    }
}

impl fmt::Debug for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipe")
            .field("target", &self.target)
            .field("backend", &self.backend_kind())
            .finish()
    }
}
