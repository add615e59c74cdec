//! Shared fixtures for CLI tests.

use std::ffi::OsString;
use std::fs;
use std::io::Cursor;
use std::path::PathBuf;
use std::process::ExitCode;

use r2pipe_config::Config;
use rstest::fixture;
use tempfile::TempDir;

use crate::{AppError, ConfigLoader, run, run_with_loader};

/// Loader returning a fixed configuration.
pub(crate) struct StaticLoader(pub(crate) Config);

impl ConfigLoader for StaticLoader {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        Ok(self.0.clone())
    }
}

const FAKE_ENGINE_SCRIPT: &str = r#"diagnostics="@DIAGNOSTICS@"
memory=""
printf '\0'
while IFS= read -r line; do
  case "$line" in
    "q"|"q!") exit 0 ;;
    "===stderr") printf '%s\n\0' "$diagnostics" ;;
    "w "*) memory="${line#w }"; printf '\0' ;;
    "ps") printf '%s\n\0' "$memory" ;;
    "ij") printf '{"bin":{"arch":"x86","bits":64}}\n\0' ;;
    *) printf 'unknown command: %s\n' "$line" >> "$diagnostics"; printf '\0' ;;
  esac
done
"#;

/// A scripted engine run through `sh`, with its own diagnostics file.
pub(crate) struct FakeEngine {
    directory: TempDir,
}

impl FakeEngine {
    fn new() -> Self {
        let directory = TempDir::new().expect("create engine directory");
        let engine = Self { directory };
        fs::write(engine.diagnostics(), "").expect("create diagnostics file");
        let script = FAKE_ENGINE_SCRIPT.replace(
            "@DIAGNOSTICS@",
            &engine.diagnostics().to_string_lossy(),
        );
        fs::write(engine.script(), script).expect("write engine script");
        engine
    }

    fn script(&self) -> PathBuf {
        self.directory.path().join("engine.sh")
    }

    /// File the engine appends unknown commands to.
    pub(crate) fn diagnostics(&self) -> PathBuf {
        self.directory.path().join("diagnostics.log")
    }

    /// Configuration flags selecting this engine through the real loader.
    pub(crate) fn config_flags(&self) -> Vec<String> {
        vec![
            String::from("--engine"),
            String::from("sh"),
            String::from("--engine-args"),
            self.script().to_string_lossy().into_owned(),
            String::from("--event-poll-ms"),
            String::from("5"),
        ]
    }

    /// Configuration spawning this engine.
    pub(crate) fn config(&self) -> Config {
        Config {
            engine: Some(String::from("sh")),
            engine_args: Some(self.script().to_string_lossy().into_owned()),
            event_poll_ms: Some(5),
            ..Config::default()
        }
    }
}

#[fixture]
pub(crate) fn fake_engine() -> FakeEngine {
    FakeEngine::new()
}

/// Captured result of one CLI invocation.
#[derive(Debug)]
pub(crate) struct Outcome {
    pub(crate) exit: ExitCode,
    pub(crate) stdout: String,
    pub(crate) stderr: String,
}

fn program_args<S: AsRef<str>>(args: &[S]) -> Vec<OsString> {
    std::iter::once("r2p")
        .chain(args.iter().map(|arg| arg.as_ref()))
        .map(OsString::from)
        .collect()
}

fn outcome(exit: ExitCode, stdout: Vec<u8>, stderr: Vec<u8>) -> Outcome {
    Outcome {
        exit,
        stdout: String::from_utf8(stdout).expect("stdout is UTF-8"),
        stderr: String::from_utf8(stderr).expect("stderr is UTF-8"),
    }
}

/// Runs the CLI against `config` with `args` after the program name.
pub(crate) fn run_cli(config: Config, args: &[&str], stdin: &str) -> Outcome {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let exit = run_with_loader(
        program_args(args),
        Cursor::new(stdin.to_owned()),
        &mut stdout,
        &mut stderr,
        &StaticLoader(config),
    );
    outcome(exit, stdout, stderr)
}

/// Runs the CLI exactly as the binary does, loading configuration from
/// `args`, the environment and any discovered file.
pub(crate) fn run_cli_loading_config<S: AsRef<str>>(args: &[S], stdin: &str) -> Outcome {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let exit = run(
        program_args(args),
        Cursor::new(stdin.to_owned()),
        &mut stdout,
        &mut stderr,
    );
    outcome(exit, stdout, stderr)
}
