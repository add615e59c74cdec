//! Shared fixtures for pipe tests.

use std::process::{Command, Stdio};
use std::sync::{Mutex, MutexGuard, OnceLock};

use mockall::mock;
use rstest::fixture;

use crate::{Backend, BackendKind, PipeError, ShutdownMode, SpawnConfig};

mock! {
    pub Engine {}
    impl Backend for Engine {
        fn kind(&self) -> BackendKind;
        fn execute(&mut self, command: &str) -> Result<String, PipeError>;
        fn shutdown(&mut self, mode: ShutdownMode) -> Result<(), PipeError>;
    }
}

/// Mock backend that answers `kind` and nothing else.
#[fixture]
pub(crate) fn engine() -> MockEngine {
    let mut engine = MockEngine::new();
    engine.expect_kind().return_const(BackendKind::Custom);
    engine
}

/// Variable naming the file the fake engine reports as its diagnostic stream.
pub(crate) const FAKE_DIAGNOSTICS_VARIABLE: &str = "R2PIPE_FAKE_DIAGNOSTICS";

/// A shell script speaking the `-q0` protocol.
///
/// `w TEXT` stores text, `ps` prints it back, `===stderr` reports the
/// diagnostic path and anything unrecognised is logged to that path with an
/// empty reply.
const FAKE_ENGINE_SCRIPT: &str = r#"
diagnostics="${R2PIPE_FAKE_DIAGNOSTICS:-/dev/null}"
memory=""
printf '\0'
while IFS= read -r line; do
  case "$line" in
    "q"|"q!") exit 0 ;;
    "===stderr") printf '%s\n\0' "$diagnostics" ;;
    "w "*) memory="${line#w }"; printf '\0' ;;
    "ps") printf '%s\n\0' "$memory" ;;
    "multiline") printf 'one\ntwo\n\n\0' ;;
    "ij") printf '{"bin":{"arch":"x86","bits":64}}\n\0' ;;
    *) printf 'unknown command: %s\n' "$line" >> "$diagnostics"; printf '\0' ;;
  esac
done
"#;

/// Spawn configuration running the fake engine under `sh`.
#[fixture]
pub(crate) fn fake_engine() -> SpawnConfig {
    SpawnConfig::new("sh").with_args(["-c", FAKE_ENGINE_SCRIPT, "fake-engine"])
}

/// Returns `true` when a real `radare2` binary is on `PATH`.
pub(crate) fn radare2_available() -> bool {
    Command::new("radare2")
        .arg("-v")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

static ENV_MUTEX: OnceLock<Mutex<()>> = OnceLock::new();

/// Serialises tests that touch process environment variables.
pub(crate) fn lock_env() -> MutexGuard<'static, ()> {
    ENV_MUTEX
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
