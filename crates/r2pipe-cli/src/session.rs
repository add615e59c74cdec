//! Opens a pipe with the transport chosen by configuration.

use r2pipe::{EventTailer, Pipe, PipeError, SpawnConfig, TailerOptions};
use r2pipe_config::{Config, TransportKind};
use tracing::{debug, warn};

use crate::AppError;

const EVENTS_TARGET: &str = "r2p::events";

/// Name diagnostic events are registered under.
pub(crate) const EVENT_NAME: &str = "errmsg";

pub(crate) fn spawn_config(config: &Config) -> SpawnConfig {
    SpawnConfig::new(config.engine()).with_args(config.engine_args())
}

pub(crate) fn open(config: &Config, target: &str) -> Result<Pipe, AppError> {
    let transport = config.transport();
    debug!(target: "r2p", %transport, engine_target = target, "opening target");
    let opened = match transport {
        TransportKind::Subprocess if target.is_empty() => Pipe::from_env(),
        TransportKind::Subprocess => Pipe::spawn(target, &spawn_config(config)),
        TransportKind::Dynamic => Pipe::dynamic_with_library(target, config.library()),
        TransportKind::Linked => open_linked(target)?,
    };
    opened.map_err(|source| AppError::Open {
        target: target.to_owned(),
        source,
    })
}

#[cfg(feature = "linked")]
#[expect(
    clippy::unnecessary_wraps,
    reason = "matches the signature of the build without the linked transport"
)]
fn open_linked(target: &str) -> Result<Result<Pipe, PipeError>, AppError> {
    Ok(Pipe::linked(target))
}

#[cfg(not(feature = "linked"))]
fn open_linked(_target: &str) -> Result<Result<Pipe, PipeError>, AppError> {
    Err(AppError::LinkedUnavailable)
}

/// Forwards diagnostic text to the log until the returned tailer is stopped.
pub(crate) fn follow_events(pipe: &mut Pipe, config: &Config) -> Result<EventTailer, AppError> {
    follow_events_with(pipe, config, |line| {
        warn!(target: EVENTS_TARGET, event = EVENT_NAME, "{line}");
    })
}

/// Hands each non-empty diagnostic line to `sink` until the returned tailer
/// is stopped.
pub(crate) fn follow_events_with<F>(
    pipe: &mut Pipe,
    config: &Config,
    mut sink: F,
) -> Result<EventTailer, AppError>
where
    F: FnMut(&str) + Send + 'static,
{
    let options = TailerOptions {
        poll_interval: config.event_poll_interval(),
    };
    let tailer = pipe
        .on_with_options(EVENT_NAME, (), options, move |event| {
            for line in event.text.lines().filter(|line| !line.is_empty()) {
                sink(line);
            }
            true
        })
        .map_err(AppError::Events)?;
    debug!(target: EVENTS_TARGET, event = tailer.event(), "following engine diagnostics");
    Ok(tailer)
}
