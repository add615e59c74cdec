//! Launch settings for the subprocess transport.

use std::ffi::OsString;
use std::path::PathBuf;

/// Executable launched when no other command is configured.
pub const DEFAULT_ENGINE_COMMAND: &str = "radare2";

/// Flag selecting quiet mode with NUL-terminated responses.
pub const QUIET_NUL_FLAG: &str = "-q0";

/// Configuration for spawning an engine process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnConfig {
    /// The executable path or command name.
    pub command: PathBuf,
    /// Arguments placed before the `-q0 <target>` pair.
    pub args: Vec<String>,
    /// Working directory for the spawned process.
    pub working_dir: Option<PathBuf>,
    /// Extra environment variables for the spawned process.
    pub envs: Vec<(String, String)>,
}

impl SpawnConfig {
    /// Configuration launching `command` with no extra arguments.
    #[must_use]
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            working_dir: None,
            envs: Vec::new(),
        }
    }

    /// Default configuration (`radare2` from `PATH`).
    #[must_use]
    pub fn radare2_default() -> Self {
        Self::new(DEFAULT_ENGINE_COMMAND)
    }

    /// Appends arguments placed ahead of the protocol flags.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets a custom working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Adds an environment variable for the child.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Full argument vector for opening `target`.
    #[must_use]
    pub fn command_args(&self, target: &str) -> Vec<OsString> {
        self.args
            .iter()
            .map(OsString::from)
            .chain([OsString::from(QUIET_NUL_FLAG), OsString::from(target)])
            .collect()
    }
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self::radare2_default()
    }
}
