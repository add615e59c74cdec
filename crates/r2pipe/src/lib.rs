//! Command pipe to the radare2 reverse-engineering engine.
#![deny(missing_docs)]
//!
//! A [`Pipe`] sends textual engine commands and returns their textual
//! output, optionally decoded as JSON. The engine can be reached four ways,
//! each hidden behind the [`Backend`] trait:
//!
//! - a spawned `radare2 -q0` process speaking NUL-terminated frames over its
//!   standard streams ([`Pipe::spawn`], [`Pipe::open`]);
//! - descriptors inherited from an engine session that launched this
//!   process ([`Pipe::from_env`]);
//! - the engine library resolved at runtime ([`Pipe::dynamic`]);
//! - the engine library linked at build time (`Pipe::linked`, behind the
//!   `linked` feature).
//!
//! [`Pipe::on`] tails the engine's diagnostic stream on a background thread
//! and hands new text to a callback.

mod backend;
mod error;
mod events;
mod framing;
mod native;
mod pipe;
mod subprocess;

pub use backend::{Backend, BackendKind, ShutdownMode};
pub use error::PipeError;
pub use events::{
    DEFAULT_POLL_INTERVAL, DIAGNOSTIC_STREAM_COMMAND, Event, EventTailer, TailerExit,
    TailerOptions,
};
pub use framing::{FrameTransport, RESPONSE_TERMINATOR, trim_response};
pub use native::{
    CREATE_CONTEXT_SYMBOL, DEFAULT_LIBRARY, DESTROY_CONTEXT_SYMBOL, EXECUTE_COMMAND_SYMBOL,
    InProcessBackend, Platform, candidate_paths,
};
pub use pipe::Pipe;
pub use subprocess::{
    DEFAULT_ENGINE_COMMAND, INPUT_VARIABLE, OUTPUT_VARIABLE, QUIET_NUL_FLAG, SpawnConfig,
    SubprocessBackend,
};

#[cfg(test)]
mod tests;
