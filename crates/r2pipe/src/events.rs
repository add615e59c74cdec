//! Background tailing of the engine's diagnostic stream.
//!
//! [`Pipe::on`](crate::Pipe::on) asks the engine where its diagnostic stream
//! lives, opens that path read-only and hands it to a dedicated thread. The
//! thread delivers each batch of new text to the registered callback until
//! the callback returns `false`, the stream fails, or [`EventTailer::stop`]
//! is called. The stream is closed on every exit path.
//!
//! Delivered text is cleared after each callback invocation, so a callback
//! only ever sees bytes it has not seen before.

use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

/// Engine command that prints the path of its diagnostic stream.
pub const DIAGNOSTIC_STREAM_COMMAND: &str = "===stderr";

/// Interval between polls when the stream has no new bytes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Log target for event tailing.
const EVENTS_TARGET: &str = "r2pipe::events";

const READ_CHUNK: usize = 4096;

/// Tuning knobs for an event registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TailerOptions {
    /// How long to sleep when the stream has nothing new.
    pub poll_interval: Duration,
}

impl Default for TailerOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// One delivery to an event callback.
#[derive(Debug)]
pub struct Event<'a, U> {
    /// Name the callback was registered under.
    pub name: &'a str,
    /// Caller-supplied context given at registration.
    pub user: &'a U,
    /// Diagnostic text accumulated since the previous delivery.
    pub text: &'a str,
}

/// Why a tailer thread finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailerExit {
    /// The callback returned `false`.
    CallbackDeclined,
    /// [`EventTailer::stop`] was called.
    Stopped,
    /// Reading the stream failed.
    StreamFailed,
    /// The callback panicked.
    Panicked,
}

/// Handle to a running tailer thread.
///
/// Dropping the handle detaches the thread; it keeps running until its
/// callback declines further events.
#[derive(Debug)]
pub struct EventTailer {
    event: String,
    stop: Arc<AtomicBool>,
    thread: JoinHandle<TailerExit>,
}

impl EventTailer {
    /// Name the tailer was registered under.
    #[must_use]
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Asks the thread to finish after its current poll.
    ///
    /// A thread blocked in a read on a pipe-like stream only notices the
    /// request once that read returns.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Returns `true` once the thread has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Waits for the thread and reports why it finished.
    #[must_use]
    pub fn join(self) -> TailerExit {
        self.thread.join().unwrap_or(TailerExit::Panicked)
    }
}

/// Starts a tailer thread over `stream`.
pub(crate) fn spawn<R, U, F>(
    event: &str,
    user: U,
    stream: R,
    options: TailerOptions,
    callback: F,
) -> io::Result<EventTailer>
where
    R: Read + Send + 'static,
    U: Send + 'static,
    F: FnMut(&Event<'_, U>) -> bool + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let name = event.to_owned();
    let thread = thread::Builder::new()
        .name(format!("r2pipe-events-{event}"))
        .spawn({
            let stop = Arc::clone(&stop);
            let name = name.clone();
            move || tail(stream, &name, &user, &stop, options, callback)
        })?;

    debug!(target: EVENTS_TARGET, event, "event tailer started");
    Ok(EventTailer {
        event: name,
        stop,
        thread,
    })
}

fn tail<R, U, F>(
    mut stream: R,
    name: &str,
    user: &U,
    stop: &AtomicBool,
    options: TailerOptions,
    mut callback: F,
) -> TailerExit
where
    R: Read,
    F: FnMut(&Event<'_, U>) -> bool,
{
    let mut pending = Vec::new();
    let exit = loop {
        if stop.load(Ordering::Acquire) {
            break TailerExit::Stopped;
        }

        if let Err(error) = drain_available(&mut stream, &mut pending) {
            warn!(target: EVENTS_TARGET, event = name, %error, "diagnostic stream read failed");
            break TailerExit::StreamFailed;
        }

        let complete = complete_prefix_len(&pending);
        if complete == 0 {
            thread::sleep(options.poll_interval);
            continue;
        }

        // A character split across reads stays pending until its tail arrives.
        let delivered: Vec<u8> = pending.drain(..complete).collect();
        let text = String::from_utf8_lossy(&delivered);
        let delivery = Event { name, user, text: &text };
        if !callback(&delivery) {
            break TailerExit::CallbackDeclined;
        }
    };

    // The stream is dropped with this frame; log so the release is visible.
    debug!(target: EVENTS_TARGET, event = name, ?exit, "event tailer finished");
    exit
}

/// Appends everything currently readable to `pending`.
///
/// A short read is taken to mean nothing more is available right now.
fn drain_available<R: Read>(stream: &mut R, pending: &mut Vec<u8>) -> io::Result<()> {
    let mut chunk = [0_u8; READ_CHUNK];
    loop {
        match stream.read(&mut chunk) {
            Ok(read) => {
                pending.extend_from_slice(chunk.get(..read).unwrap_or_default());
                if read < READ_CHUNK {
                    return Ok(());
                }
            }
            Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
            Err(error) => return Err(error),
        }
    }
}

/// Length of the longest prefix of `bytes` that does not end part-way
/// through a UTF-8 sequence. Invalid bytes count as complete.
fn complete_prefix_len(bytes: &[u8]) -> usize {
    let mut start = 0;
    loop {
        let rest = bytes.get(start..).unwrap_or_default();
        match std::str::from_utf8(rest) {
            Ok(_) => return bytes.len(),
            Err(error) => match error.error_len() {
                Some(invalid) => start += error.valid_up_to() + invalid,
                None => return start + error.valid_up_to(),
            },
        }
    }
}
