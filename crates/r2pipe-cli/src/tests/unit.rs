//! Unit tests for the CLI runtime against a scripted engine.

use std::fs;
use std::process::ExitCode;
use std::sync::mpsc;
use std::time::Duration;

use r2pipe::TailerExit;
use r2pipe_config::Config;
use rstest::rstest;

use crate::session;
use crate::tests::support::{FakeEngine, fake_engine, run_cli, run_cli_loading_config};

#[rstest]
fn runs_commands_given_after_the_target(fake_engine: FakeEngine) {
    let outcome = run_cli(fake_engine.config(), &["malloc://16", "w hello", "ps"], "");

    assert_eq!(outcome.exit, ExitCode::SUCCESS, "stderr: {}", outcome.stderr);
    assert_eq!(outcome.stdout, "hello\n");
}

#[rstest]
fn reads_commands_from_stdin_when_none_are_given(fake_engine: FakeEngine) {
    let outcome = run_cli(
        fake_engine.config(),
        &["malloc://16"],
        "w from stdin\n\n# skipped\nps\n",
    );

    assert_eq!(outcome.exit, ExitCode::SUCCESS, "stderr: {}", outcome.stderr);
    assert_eq!(outcome.stdout, "from stdin\n");
}

#[rstest]
fn pretty_prints_json_output(fake_engine: FakeEngine) {
    let outcome = run_cli(fake_engine.config(), &["--json", "/bin/ls", "ij"], "");

    assert_eq!(outcome.exit, ExitCode::SUCCESS, "stderr: {}", outcome.stderr);
    let value: serde_json::Value = serde_json::from_str(&outcome.stdout).expect("valid JSON");
    assert_eq!(value["bin"]["bits"], 64);
    assert!(outcome.stdout.contains("\n  \"bin\""), "not pretty: {}", outcome.stdout);
}

#[rstest]
fn non_json_output_fails_in_json_mode(fake_engine: FakeEngine) {
    let outcome = run_cli(fake_engine.config(), &["--json", "malloc://16", "ps"], "");

    assert_eq!(outcome.exit, ExitCode::FAILURE);
    assert!(
        outcome.stderr.contains("command \"ps\" failed"),
        "stderr: {}",
        outcome.stderr
    );
}

#[rstest]
fn unknown_commands_reach_the_diagnostics_file(fake_engine: FakeEngine) {
    let outcome = run_cli(fake_engine.config(), &["--events", "malloc://16", "bogus"], "");

    assert_eq!(outcome.exit, ExitCode::SUCCESS, "stderr: {}", outcome.stderr);
    assert_eq!(outcome.stdout, "");
    let logged = fs::read_to_string(fake_engine.diagnostics()).expect("read diagnostics");
    assert_eq!(logged, "unknown command: bogus\n");
}

#[rstest]
fn followed_diagnostics_reach_the_event_sink(fake_engine: FakeEngine) {
    let config = fake_engine.config();
    let mut pipe = session::open(&config, "malloc://16").expect("open fake engine");
    let (sender, receiver) = mpsc::channel();

    let tailer = session::follow_events_with(&mut pipe, &config, move |line| {
        drop(sender.send(line.to_owned()));
    })
    .expect("follow diagnostics");
    pipe.execute("bogus").expect("unknown commands still reply");

    let line = receiver
        .recv_timeout(Duration::from_secs(5))
        .expect("diagnostic line forwarded");
    assert_eq!(line, "unknown command: bogus");

    pipe.shutdown().expect("shutdown");
    tailer.stop();
    assert_eq!(tailer.join(), TailerExit::Stopped);
}

#[rstest]
fn configuration_flags_load_through_the_real_loader(fake_engine: FakeEngine) {
    let mut args = fake_engine.config_flags();
    args.extend(["malloc://16", "w loaded", "ps"].map(String::from));

    let outcome = run_cli_loading_config(&args, "");

    assert_eq!(outcome.exit, ExitCode::SUCCESS, "stderr: {}", outcome.stderr);
    assert_eq!(outcome.stdout, "loaded\n");
}

#[rstest]
fn missing_target_is_a_usage_error() {
    let outcome = run_cli(Config::default(), &[], "");

    assert_eq!(outcome.exit, ExitCode::FAILURE);
    assert!(outcome.stderr.contains("TARGET"), "stderr: {}", outcome.stderr);
}

#[rstest]
fn help_goes_to_stdout() {
    let outcome = run_cli(Config::default(), &["--help"], "");

    assert_eq!(outcome.exit, ExitCode::SUCCESS);
    assert!(outcome.stdout.contains("Usage"), "stdout: {}", outcome.stdout);
}

#[rstest]
fn missing_engine_fails_to_open() {
    let config = Config {
        engine: Some(String::from("/nonexistent/r2p-test-engine")),
        ..Config::default()
    };

    let outcome = run_cli(config, &["malloc://16", "ps"], "");

    assert_eq!(outcome.exit, ExitCode::FAILURE);
    assert!(
        outcome.stderr.starts_with("failed to open \"malloc://16\""),
        "stderr: {}",
        outcome.stderr
    );
}
