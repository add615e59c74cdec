//! Engine hosted inside this process through its C entry points.
//!
//! The linked and dynamic transports differ only in where the three entry
//! points come from; both run commands through [`InProcessBackend`].

#[cfg(feature = "linked")]
mod linked;
mod resolver;

use std::ffi::{CStr, CString, c_char, c_void};
use std::ptr::NonNull;

use tracing::debug;

#[cfg(feature = "linked")]
pub(crate) use linked::linked_api;
pub(crate) use resolver::Resolver;
pub use resolver::{DEFAULT_LIBRARY, Platform, candidate_paths};

use crate::backend::{Backend, BackendKind, ShutdownMode};
use crate::error::PipeError;

/// Log target for in-process backend operations.
pub(crate) const NATIVE_TARGET: &str = "r2pipe::native";

/// Entry point creating an engine context.
pub const CREATE_CONTEXT_SYMBOL: &str = "r_core_new";
/// Entry point destroying an engine context.
pub const DESTROY_CONTEXT_SYMBOL: &str = "r_core_free";
/// Entry point running a command and returning its output as a C string.
pub const EXECUTE_COMMAND_SYMBOL: &str = "r_core_cmd_str";

pub(crate) type CreateContextFn = unsafe extern "C" fn() -> *mut c_void;
pub(crate) type DestroyContextFn = unsafe extern "C" fn(*mut c_void);
pub(crate) type ExecuteCommandFn = unsafe extern "C" fn(*mut c_void, *const c_char) -> *mut c_char;

/// The three engine entry points, however they were obtained.
#[derive(Clone, Copy)]
pub(crate) struct CoreApi {
    pub(crate) create: CreateContextFn,
    pub(crate) destroy: DestroyContextFn,
    pub(crate) execute: ExecuteCommandFn,
}

impl std::fmt::Debug for CoreApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreApi").finish_non_exhaustive()
    }
}

/// Backend owning one engine context created through a [`CoreApi`].
pub struct InProcessBackend {
    kind: BackendKind,
    api: CoreApi,
    core: Option<NonNull<c_void>>,
}

// SAFETY: the context pointer is only dereferenced by the engine during
// `execute`/`shutdown`, which take `&mut self`, so the backend is never used
// from two threads at once. Moving it between threads is allowed by the engine.
unsafe impl Send for InProcessBackend {}

impl InProcessBackend {
    /// Creates a fresh engine context.
    pub(crate) fn create(kind: BackendKind, api: CoreApi) -> Result<Self, PipeError> {
        // SAFETY: `api.create` is an engine entry point taking no arguments.
        let raw = unsafe { (api.create)() };
        let core = NonNull::new(raw).ok_or(PipeError::CoreInitFailed)?;
        debug!(target: NATIVE_TARGET, backend = %kind, "engine context created");
        Ok(Self {
            kind,
            api,
            core: Some(core),
        })
    }

    fn release(&mut self) -> bool {
        let Some(core) = self.core.take() else {
            return false;
        };
        // SAFETY: `core` came from `api.create` and is released exactly once
        // because it was just taken out of `self.core`.
        unsafe { (self.api.destroy)(core.as_ptr()) };
        true
    }
}

impl Backend for InProcessBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn execute(&mut self, command: &str) -> Result<String, PipeError> {
        let core = self.core.ok_or(PipeError::NotConnected)?;
        let c_command = CString::new(command).map_err(|_| PipeError::InvalidCommand {
            command: command.to_owned(),
            message: String::from("commands cannot contain NUL bytes"),
        })?;

        // SAFETY: `core` is a live context and `c_command` outlives the call.
        let output = unsafe { (self.api.execute)(core.as_ptr(), c_command.as_ptr()) };
        if output.is_null() {
            return Ok(String::new());
        }

        // SAFETY: the engine returns a NUL-terminated, malloc-allocated string
        // that the caller owns.
        let text = unsafe { CStr::from_ptr(output) }
            .to_string_lossy()
            .into_owned();
        // SAFETY: see above; the string is not used after this point.
        unsafe { libc::free(output.cast()) };
        Ok(text)
    }

    fn shutdown(&mut self, mode: ShutdownMode) -> Result<(), PipeError> {
        if self.release() {
            debug!(target: NATIVE_TARGET, backend = %self.kind, ?mode, "engine context destroyed");
        }
        Ok(())
    }
}

impl Drop for InProcessBackend {
    fn drop(&mut self) {
        if self.release() {
            debug!(
                target: NATIVE_TARGET,
                backend = %self.kind,
                "engine context destroyed on drop"
            );
        }
    }
}

impl std::fmt::Debug for InProcessBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InProcessBackend")
            .field("kind", &self.kind)
            .field("connected", &self.core.is_some())
            .finish()
    }
}
