//! Shared configuration for the r2pipe command-line tools.
#![deny(missing_docs)]
//!
//! Values are layered by `ortho_config`: built-in defaults, then a TOML file
//! named by `--config-path` or `R2PIPE_CONFIG_PATH`, then `R2PIPE_*`
//! environment variables, then command-line flags. Every field is optional
//! in the file, environment and flag sources.

mod defaults;
mod logging;
mod transport;

use std::sync::Arc;
use std::time::Duration;

use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_ENGINE, DEFAULT_EVENT_POLL_MS, DEFAULT_LIBRARY, DEFAULT_LOG_FILTER,
    default_engine_string, default_event_poll_interval, default_library_string,
    default_log_filter, default_log_filter_string, default_log_format, default_transport,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use transport::{TransportKind, TransportKindParseError};

/// Resolved settings for reaching the engine and reporting on it.
///
/// Loaded values always carry the built-in defaults for everything except
/// `engine_args`; a [`Config::default`] built in code leaves every field
/// unset and relies on the accessors instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "R2PIPE_")]
pub struct Config {
    /// Engine executable for the subprocess transport.
    #[ortho_config(default = default_engine_string())]
    pub engine: Option<String>,
    /// Whitespace-separated arguments placed before the protocol flags.
    pub engine_args: Option<String>,
    /// Shared library stem for the dynamic transport.
    #[ortho_config(default = default_library_string())]
    pub library: Option<String>,
    /// Transport used to reach the engine.
    #[ortho_config(default = default_transport())]
    pub transport: Option<TransportKind>,
    /// Diagnostic stream poll interval in milliseconds.
    #[ortho_config(default = DEFAULT_EVENT_POLL_MS)]
    pub event_poll_ms: Option<u64>,
    /// `tracing` filter directive for log output.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: Option<String>,
    /// Log output format.
    #[ortho_config(default = default_log_format())]
    pub log_format: Option<LogFormat>,
}

impl Config {
    /// Loads configuration from defaults, files, environment and `args`.
    ///
    /// The first element of `args` is the program name.
    ///
    /// # Errors
    ///
    /// Returns the loader error when a source is malformed or a flag is
    /// unknown.
    pub fn load_from_args<I, T>(args: I) -> Result<Self, Arc<OrthoError>>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Engine executable, defaulting to [`DEFAULT_ENGINE`].
    #[must_use]
    pub fn engine(&self) -> &str {
        self.engine.as_deref().unwrap_or(DEFAULT_ENGINE)
    }

    /// Extra engine arguments, split on whitespace.
    #[must_use]
    pub fn engine_args(&self) -> Vec<String> {
        self.engine_args
            .as_deref()
            .map(|args| args.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    /// Library stem, defaulting to [`DEFAULT_LIBRARY`].
    #[must_use]
    pub fn library(&self) -> &str {
        self.library.as_deref().unwrap_or(DEFAULT_LIBRARY)
    }

    /// Selected transport, defaulting to [`TransportKind::Subprocess`].
    #[must_use]
    pub fn transport(&self) -> TransportKind {
        self.transport.unwrap_or_else(default_transport)
    }

    /// Poll interval for diagnostic stream tailing.
    #[must_use]
    pub fn event_poll_interval(&self) -> Duration {
        self.event_poll_ms
            .map_or_else(default_event_poll_interval, Duration::from_millis)
    }

    /// Log filter directive, defaulting to [`DEFAULT_LOG_FILTER`].
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Log output format, defaulting to [`LogFormat::Compact`].
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format.unwrap_or_else(default_log_format)
    }
}
