//! Pipe contract tests against a mocked backend.

use mockall::predicate::eq;
use rstest::rstest;
use serde::Deserialize;

use crate::native::InProcessBackend;
use crate::native::fake;
use crate::tests::support::{MockEngine, engine};
use crate::{BackendKind, Pipe, PipeError, ShutdownMode};

#[derive(Debug, Deserialize, PartialEq, Eq)]
struct BinInfo {
    arch: String,
    bits: u32,
}

#[rstest]
fn empty_command_never_reaches_backend(mut engine: MockEngine) {
    engine.expect_execute().never();
    let mut pipe = Pipe::with_backend("demo", engine);

    assert!(matches!(pipe.execute(""), Err(PipeError::EmptyCommand)));
}

#[rstest]
fn output_is_returned_verbatim(mut engine: MockEngine) {
    engine
        .expect_execute()
        .with(eq("pd 2"))
        .once()
        .returning(|_| Ok(String::from("  mov eax, 1\n  ret")));
    let mut pipe = Pipe::with_backend("demo", engine);

    assert_eq!(pipe.execute("pd 2").expect("execute"), "  mov eax, 1\n  ret");
    assert_eq!(pipe.target(), "demo");
    assert_eq!(pipe.backend_kind(), Some(BackendKind::Custom));
}

#[rstest]
fn formatted_commands_are_rendered_before_sending(mut engine: MockEngine) {
    engine
        .expect_execute()
        .with(eq("p8 16 @ 0x1000"))
        .once()
        .returning(|_| Ok(String::from("00")));
    let mut pipe = Pipe::with_backend("demo", engine);

    let output = pipe
        .execute_fmt(format_args!("p8 {} @ {:#x}", 16, 0x1000))
        .expect("execute");

    assert_eq!(output, "00");
}

#[rstest]
fn json_output_decodes_into_values_and_types(mut engine: MockEngine) {
    engine
        .expect_execute()
        .times(2)
        .returning(|_| Ok(String::from(r#"{"arch":"x86","bits":64}"#)));
    let mut pipe = Pipe::with_backend("demo", engine);

    let value = pipe.execute_json("ij").expect("json value");
    let typed: BinInfo = pipe
        .execute_json_fmt(format_args!("i{}", "j"))
        .expect("typed json");

    assert_eq!(value["bits"], 64);
    assert_eq!(
        typed,
        BinInfo {
            arch: String::from("x86"),
            bits: 64
        }
    );
}

#[rstest]
#[case("")]
#[case("not json")]
fn undecodable_output_is_a_parse_error(mut engine: MockEngine, #[case] output: &'static str) {
    engine
        .expect_execute()
        .returning(move |_| Ok(String::from(output)));
    let mut pipe = Pipe::with_backend("demo", engine);

    let error = pipe.execute_json("ij").expect_err("output is not JSON");

    assert!(matches!(error, PipeError::Parse { ref command, .. } if command == "ij"));
}

#[rstest]
fn shutdown_runs_once_and_disconnects(mut engine: MockEngine) {
    engine
        .expect_shutdown()
        .with(eq(ShutdownMode::Graceful))
        .once()
        .returning(|_| Ok(()));
    engine.expect_execute().never();
    let mut pipe = Pipe::with_backend("demo", engine);

    pipe.shutdown().expect("first shutdown");
    pipe.shutdown().expect("second shutdown is a no-op");

    assert!(!pipe.is_connected());
    assert_eq!(pipe.backend_kind(), None);
    assert!(matches!(pipe.execute("ps"), Err(PipeError::NotConnected)));
}

#[rstest]
fn force_shutdown_uses_forced_mode(mut engine: MockEngine) {
    engine
        .expect_shutdown()
        .with(eq(ShutdownMode::Forced))
        .once()
        .returning(|_| Ok(()));
    let mut pipe = Pipe::with_backend("demo", engine);

    pipe.force_shutdown().expect("forced shutdown");
}

#[rstest]
fn failed_shutdown_still_releases_backend(mut engine: MockEngine) {
    engine.expect_shutdown().once().returning(|_| {
        Err(PipeError::WaitFailed {
            source: std::sync::Arc::new(std::io::Error::other("no child")),
        })
    });
    let mut pipe = Pipe::with_backend("demo", engine);

    assert!(matches!(pipe.shutdown(), Err(PipeError::WaitFailed { .. })));
    assert!(matches!(pipe.execute("ps"), Err(PipeError::NotConnected)));
    pipe.shutdown().expect("nothing left to release");
}

#[rstest]
fn backend_errors_propagate(mut engine: MockEngine) {
    engine
        .expect_execute()
        .returning(|command| Err(PipeError::io(command, std::io::Error::other("broken"))));
    let mut pipe = Pipe::with_backend("demo", engine);

    let error = pipe.execute("ps").expect_err("backend failed");

    assert!(error.is_connection_error());
}

#[rstest]
fn mocked_backends_offer_no_diagnostics(engine: MockEngine) {
    let mut pipe = Pipe::with_backend("demo", engine);

    assert!(pipe.take_diagnostics().is_none());
}

#[rstest]
fn in_process_constructor_opens_the_target(mut engine: MockEngine) {
    engine
        .expect_execute()
        .with(eq("o malloc://256"))
        .once()
        .returning(|_| Ok(String::new()));

    let pipe = Pipe::with_open_target("malloc://256", engine);

    assert_eq!(pipe.target(), "malloc://256");
}

#[rstest]
fn failure_to_open_the_target_is_not_fatal(mut engine: MockEngine) {
    engine
        .expect_execute()
        .with(eq("o /missing"))
        .once()
        .returning(|command| Err(PipeError::io(command, std::io::Error::other("no such file"))));

    let pipe = Pipe::with_open_target("/missing", engine);

    assert!(pipe.is_connected());
}

#[rstest]
fn empty_target_skips_the_open_command(mut engine: MockEngine) {
    engine.expect_execute().never();

    let pipe = Pipe::with_open_target("", engine);

    assert_eq!(pipe.target(), "");
}

#[rstest]
fn in_process_session_round_trips() {
    let backend =
        InProcessBackend::create(BackendKind::Dynamic, fake::api()).expect("create context");
    let mut pipe = Pipe::with_open_target("malloc://256", backend);

    pipe.execute("w Hello World").expect("write");
    assert_eq!(pipe.execute("ps").expect("read"), "Hello World\n");
    assert_eq!(pipe.backend_kind(), Some(BackendKind::Dynamic));
    pipe.shutdown().expect("shutdown");
    assert!(matches!(pipe.execute("ps"), Err(PipeError::NotConnected)));
}

#[rstest]
fn diagnostic_query_failure_surfaces_from_on(mut engine: MockEngine) {
    engine
        .expect_execute()
        .with(eq("===stderr"))
        .once()
        .returning(|_| Ok(String::from("/definitely/not/a/real/path\n")));
    let mut pipe = Pipe::with_backend("demo", engine);

    let error = pipe
        .on("errmsg", (), |_| true)
        .expect_err("path cannot be opened");

    assert!(matches!(
        error,
        PipeError::DiagnosticStream { ref event, ref path, .. }
            if event == "errmsg" && path.as_os_str() == "/definitely/not/a/real/path"
    ));
}

#[rstest]
fn dynamic_transport_reports_missing_library() {
    let error = Pipe::dynamic_with_library("malloc://256", "libr2pipe_test_absent_core")
        .expect_err("library is absent");

    assert!(matches!(
        error,
        PipeError::LibraryNotFound { ref library, ref attempted }
            if library == "libr2pipe_test_absent_core" && !attempted.is_empty()
    ));
    assert!(error.is_startup_error());
}
