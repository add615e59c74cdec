use std::time::Duration;

use crate::logging::LogFormat;
use crate::transport::TransportKind;

/// Engine executable launched by the subprocess transport.
pub const DEFAULT_ENGINE: &str = "radare2";

/// Shared library stem searched for by the dynamic transport.
pub const DEFAULT_LIBRARY: &str = "libr_core";

/// Interval between polls of the diagnostic stream, in milliseconds.
pub const DEFAULT_EVENT_POLL_MS: u64 = 50;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Owned engine executable name.
#[must_use]
pub fn default_engine_string() -> String {
    DEFAULT_ENGINE.to_owned()
}

/// Owned library stem.
#[must_use]
pub fn default_library_string() -> String {
    DEFAULT_LIBRARY.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Default transport.
#[must_use]
pub const fn default_transport() -> TransportKind {
    TransportKind::Subprocess
}

/// Default poll interval as a [`Duration`].
#[must_use]
pub const fn default_event_poll_interval() -> Duration {
    Duration::from_millis(DEFAULT_EVENT_POLL_MS)
}
