//! Adoption of the streams an engine session hands to scripts it launches.
//!
//! When the engine runs a script it exports `R2PIPE_IN` (the descriptor the
//! script reads responses from) and `R2PIPE_OUT` (the descriptor it writes
//! commands to).

use std::env;
use std::fs::File;

use crate::error::PipeError;

/// Variable naming the descriptor responses are read from.
pub const INPUT_VARIABLE: &str = "R2PIPE_IN";

/// Variable naming the descriptor commands are written to.
pub const OUTPUT_VARIABLE: &str = "R2PIPE_OUT";

#[cfg(unix)]
type RawDescriptor = std::os::fd::RawFd;

#[cfg(windows)]
type RawDescriptor = usize;

/// Descriptor numbers read from the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InheritedDescriptors {
    pub(crate) input: RawDescriptor,
    pub(crate) output: RawDescriptor,
}

impl InheritedDescriptors {
    /// Reads both descriptors from the process environment.
    pub(crate) fn from_env() -> Result<Self, PipeError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads both descriptors through `lookup`.
    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, PipeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let input = parse_descriptor(INPUT_VARIABLE, lookup(INPUT_VARIABLE))?;
        let output = parse_descriptor(OUTPUT_VARIABLE, lookup(OUTPUT_VARIABLE))?;
        Ok(Self { input, output })
    }

    /// Takes ownership of both descriptors as files.
    ///
    /// # Safety
    ///
    /// The descriptors must be open and must not be owned by anything else in
    /// this process. The engine hands them to the script exclusively.
    pub(crate) unsafe fn adopt(self) -> (File, File) {
        // SAFETY: upheld by the caller.
        unsafe { (adopt_descriptor(self.input), adopt_descriptor(self.output)) }
    }
}

fn parse_descriptor(variable: &str, value: Option<String>) -> Result<RawDescriptor, PipeError> {
    let text = value
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| {
            PipeError::startup(format!(
                "missing {variable} environment variable; set {INPUT_VARIABLE} and {OUTPUT_VARIABLE} or pass a target"
            ))
        })?;
    text.trim().parse().map_err(|_| {
        PipeError::startup(format!(
            "failed to parse {variable}={text:?} as a descriptor number"
        ))
    })
}

#[cfg(unix)]
unsafe fn adopt_descriptor(descriptor: RawDescriptor) -> File {
    use std::os::fd::FromRawFd;

    // SAFETY: the caller guarantees exclusive ownership of an open descriptor.
    unsafe { File::from_raw_fd(descriptor) }
}

#[cfg(windows)]
unsafe fn adopt_descriptor(descriptor: RawDescriptor) -> File {
    use std::os::windows::io::{FromRawHandle, RawHandle};

    // SAFETY: the caller guarantees exclusive ownership of an open handle.
    unsafe { File::from_raw_handle(descriptor as RawHandle) }
}
