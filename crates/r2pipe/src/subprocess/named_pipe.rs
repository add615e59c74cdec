//! Duplex named pipe wiring used on Windows.
//!
//! The engine is told the pipe name through `R2PIPE_IN` and connects back to
//! it; one handle then carries both directions of the framed protocol.

use std::ffi::OsStr;
use std::fs::File;
use std::io;
use std::os::windows::ffi::OsStrExt;
use std::os::windows::io::{FromRawHandle, RawHandle};
use std::process::{Child, ChildStderr, Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;
use windows_sys::Win32::Foundation::{ERROR_PIPE_CONNECTED, INVALID_HANDLE_VALUE};
use windows_sys::Win32::Storage::FileSystem::PIPE_ACCESS_DUPLEX;
use windows_sys::Win32::System::Pipes::{
    ConnectNamedPipe, CreateNamedPipeW, PIPE_READMODE_MESSAGE, PIPE_TYPE_MESSAGE,
    PIPE_UNLIMITED_INSTANCES, PIPE_WAIT,
};

use super::descriptors::INPUT_VARIABLE;
use super::{SUBPROCESS_TARGET, SpawnConfig, lifecycle};
use crate::error::PipeError;
use crate::framing::FrameTransport;

const PIPE_BUFFER_SIZE: u32 = 4096;

static PIPE_SEQUENCE: AtomicUsize = AtomicUsize::new(0);

fn next_pipe_name() -> String {
    let sequence = PIPE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!(r"\\.\pipe\R2PIPE_IN_{}_{sequence}", std::process::id())
}

fn create_pipe(name: &str) -> io::Result<File> {
    let wide: Vec<u16> = OsStr::new(name).encode_wide().chain(Some(0)).collect();
    // SAFETY: `wide` is NUL-terminated and outlives the call; a null security
    // descriptor selects the default.
    let handle = unsafe {
        CreateNamedPipeW(
            wide.as_ptr(),
            PIPE_ACCESS_DUPLEX,
            PIPE_TYPE_MESSAGE | PIPE_READMODE_MESSAGE | PIPE_WAIT,
            PIPE_UNLIMITED_INSTANCES,
            PIPE_BUFFER_SIZE,
            PIPE_BUFFER_SIZE,
            0,
            std::ptr::null(),
        )
    };
    if handle == INVALID_HANDLE_VALUE {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: the handle was just created and is owned by nothing else.
    Ok(unsafe { File::from_raw_handle(handle as RawHandle) })
}

fn connect(pipe: &File) -> io::Result<()> {
    use std::os::windows::io::AsRawHandle;

    // SAFETY: the handle is a live named pipe server handle; no overlapped
    // structure is used, so the call blocks until a client connects.
    let connected = unsafe { ConnectNamedPipe(pipe.as_raw_handle().cast(), std::ptr::null_mut()) };
    if connected != 0 {
        return Ok(());
    }
    let error = io::Error::last_os_error();
    // A client that connected between create and connect is not a failure.
    if error.raw_os_error() == i32::try_from(ERROR_PIPE_CONNECTED).ok() {
        return Ok(());
    }
    Err(error)
}

pub(super) fn spawn(
    target: &str,
    config: &SpawnConfig,
) -> Result<(Child, FrameTransport, Option<ChildStderr>), PipeError> {
    let name = next_pipe_name();
    let pipe =
        create_pipe(&name).map_err(|error| PipeError::startup_io("failed to create named pipe", error))?;

    debug!(
        target: SUBPROCESS_TARGET,
        command = %config.command.display(),
        pipe = %name,
        engine_target = target,
        "spawning engine process"
    );

    let mut command = Command::new(&config.command);
    command
        .args(config.command_args(target))
        .envs(config.envs.iter().map(|(key, value)| (key, value)))
        .env(INPUT_VARIABLE, &name)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
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

    if let Err(error) = connect(&pipe) {
        lifecycle::kill_and_reap(&mut child, "named pipe connect failed");
        return Err(PipeError::startup_io("failed to connect to named pipe", error));
    }

    let reader = match pipe.try_clone() {
        Ok(reader) => reader,
        Err(error) => {
            lifecycle::kill_and_reap(&mut child, "named pipe clone failed");
            return Err(PipeError::startup_io("failed to duplicate pipe handle", error));
        }
    };

    let diagnostics = child.stderr.take();
    Ok((child, FrameTransport::new(reader, pipe), diagnostics))
}
