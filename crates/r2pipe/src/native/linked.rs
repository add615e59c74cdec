//! Entry points bound at build time against `libr_core`.

use std::ffi::{c_char, c_void};

use super::CoreApi;

#[link(name = "r_core")]
unsafe extern "C" {
    fn r_core_new() -> *mut c_void;
    fn r_core_free(core: *mut c_void);
    fn r_core_cmd_str(core: *mut c_void, command: *const c_char) -> *mut c_char;
}

/// The statically linked entry points.
pub(crate) fn linked_api() -> CoreApi {
    CoreApi {
        create: r_core_new,
        destroy: r_core_free,
        execute: r_core_cmd_str,
    }
}
