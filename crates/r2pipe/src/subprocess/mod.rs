//! Engine reached over byte streams.
//!
//! Two wirings share [`SubprocessBackend`]:
//!
//! - a spawned engine (`radare2 -q0 <target>`) whose stdin and stdout carry
//!   the framed protocol and whose stderr is the diagnostic stream;
//! - descriptors inherited from an engine session that launched this
//!   process, named by `R2PIPE_IN` and `R2PIPE_OUT`.
//!
//! On Windows the spawned engine connects back through a duplex named pipe
//! instead of inheriting stdio.

mod config;
mod descriptors;
mod lifecycle;
#[cfg(windows)]
mod named_pipe;

use std::io::Read;
#[cfg(not(windows))]
use std::process::{Command, Stdio};
use std::process::{Child, ChildStderr};
use std::sync::Arc;

use tracing::debug;

pub use config::{DEFAULT_ENGINE_COMMAND, QUIET_NUL_FLAG, SpawnConfig};
pub(crate) use descriptors::InheritedDescriptors;
pub use descriptors::{INPUT_VARIABLE, OUTPUT_VARIABLE};

use crate::backend::{Backend, BackendKind, ShutdownMode};
use crate::error::PipeError;
use crate::framing::FrameTransport;

/// Log target for subprocess transport operations.
pub(crate) const SUBPROCESS_TARGET: &str = "r2pipe::subprocess";

/// Backend talking to the engine through framed byte streams.
pub struct SubprocessBackend {
    kind: BackendKind,
    child: Option<Child>,
    transport: Option<FrameTransport>,
    diagnostics: Option<ChildStderr>,
}

impl SubprocessBackend {
    /// Spawns the engine on `target` and waits for its first empty frame.
    ///
    /// # Errors
    ///
    /// Returns [`PipeError::StartupFailed`] if the process cannot be started
    /// or exits before signalling readiness.
    #[cfg(not(windows))]
    pub fn spawn(target: &str, config: &SpawnConfig) -> Result<Self, PipeError> {
        debug!(
            target: SUBPROCESS_TARGET,
            command = %config.command.display(),
            args = ?config.args,
            engine_target = target,
            "spawning engine process"
        );

        let mut command = Command::new(&config.command);
        command
            .args(config.command_args(target))
            .envs(config.envs.iter().map(|(key, value)| (key, value)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|error| {
            PipeError::startup_io(
                format!("failed to start {}", config.command.display()),
                error,
            )
        })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            lifecycle::kill_and_reap(&mut child, "stdio capture failed");
            return Err(PipeError::startup("failed to capture engine stdio"));
        };
        let diagnostics = child.stderr.take();
        let mut transport = FrameTransport::new(stdout, stdin);

        if let Err(error) = transport.receive() {
            lifecycle::kill_and_reap(&mut child, "readiness read failed");
            return Err(PipeError::startup_io(
                "failed to read initial response from engine",
                error,
            ));
        }

        debug!(
            target: SUBPROCESS_TARGET,
            pid = child.id(),
            engine_target = target,
            "engine process ready"
        );

        Ok(Self {
            kind: BackendKind::Subprocess,
            child: Some(child),
            transport: Some(transport),
            diagnostics,
        })
    }

    /// Spawns the engine on `target`, connected through a named pipe.
    ///
    /// # Errors
    ///
    /// Returns [`PipeError::StartupFailed`] if the pipe cannot be created or
    /// the engine never connects to it.
    #[cfg(windows)]
    pub fn spawn(target: &str, config: &SpawnConfig) -> Result<Self, PipeError> {
        let (child, transport, diagnostics) = named_pipe::spawn(target, config)?;
        Ok(Self {
            kind: BackendKind::Subprocess,
            child: Some(child),
            transport: Some(transport),
            diagnostics,
        })
    }

    /// Adopts the descriptors named by `R2PIPE_IN` and `R2PIPE_OUT`.
    ///
    /// # Errors
    ///
    /// Returns [`PipeError::StartupFailed`] if either variable is missing or
    /// is not a descriptor number.
    pub fn from_env() -> Result<Self, PipeError> {
        let descriptors = InheritedDescriptors::from_env()?;
        debug!(
            target: SUBPROCESS_TARGET,
            input = ?descriptors.input,
            output = ?descriptors.output,
            "adopting inherited engine descriptors"
        );
        // SAFETY: the engine exports these descriptors for this process alone
        // and nothing else in the crate opens them.
        let (input, output) = unsafe { descriptors.adopt() };
        Ok(Self::from_streams(input, output))
    }

    /// Wraps already-connected streams. No process is owned, so shutdown
    /// only releases the streams.
    #[must_use]
    pub fn from_streams(
        reader: impl Read + Send + 'static,
        writer: impl std::io::Write + Send + 'static,
    ) -> Self {
        Self {
            kind: BackendKind::Descriptors,
            child: None,
            transport: Some(FrameTransport::new(reader, writer)),
            diagnostics: None,
        }
    }

    /// Process id of the spawned engine, if this backend owns one.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }
}

impl Backend for SubprocessBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn execute(&mut self, command: &str) -> Result<String, PipeError> {
        let transport = self.transport.as_mut().ok_or(PipeError::NotConnected)?;
        // One line in, one frame out: a second line would desynchronise replies.
        if command.contains(['\n', '\0']) {
            return Err(PipeError::InvalidCommand {
                command: command.to_owned(),
                message: String::from("commands must be a single line without NUL bytes"),
            });
        }
        transport
            .round_trip(command)
            .map_err(|error| PipeError::io(command, error))
    }

    fn shutdown(&mut self, mode: ShutdownMode) -> Result<(), PipeError> {
        let transport = self.transport.take();
        // Closing stderr first keeps a chatty engine from blocking on a full
        // pipe while we wait for it.
        drop(self.diagnostics.take());

        let Some(mut child) = self.child.take() else {
            debug!(
                target: SUBPROCESS_TARGET,
                "releasing inherited descriptors without quitting the engine"
            );
            return Ok(());
        };

        if let Some(mut transport) = transport {
            let quit = mode.quit_command();
            if let Err(error) = transport.send(quit) {
                debug!(
                    target: SUBPROCESS_TARGET,
                    pid = child.id(),
                    command = quit,
                    %error,
                    "quit command failed"
                );
            }
        }

        let status = child.wait().map_err(|source| PipeError::WaitFailed {
            source: Arc::new(source),
        })?;
        debug!(
            target: SUBPROCESS_TARGET,
            pid = child.id(),
            ?status,
            ?mode,
            "engine process exited"
        );
        Ok(())
    }

    fn take_diagnostics(&mut self) -> Option<Box<dyn Read + Send>> {
        self.diagnostics
            .take()
            .map(|stderr| Box::new(stderr) as Box<dyn Read + Send>)
    }
}

impl Drop for SubprocessBackend {
    fn drop(&mut self) {
        drop(self.transport.take());
        if let Some(mut child) = self.child.take() {
            lifecycle::kill_and_reap(&mut child, "backend dropped without shutdown");
        }
    }
}

impl std::fmt::Debug for SubprocessBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubprocessBackend")
            .field("kind", &self.kind)
            .field("pid", &self.pid())
            .field("connected", &self.transport.is_some())
            .finish()
    }
}
