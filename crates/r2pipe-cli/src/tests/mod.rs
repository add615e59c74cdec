//! Tests driving the CLI runtime end to end.

mod support;
#[cfg(unix)]
mod unit;
