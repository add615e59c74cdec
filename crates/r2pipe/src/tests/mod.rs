//! Tests exercising [`crate::Pipe`] across its backends.

mod pipe;
mod support;
