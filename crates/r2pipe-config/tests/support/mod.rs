//! Environment helpers shared by configuration tests.

use std::ffi::{OsStr, OsString};
use std::sync::{Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Holds the environment lock and restores overridden variables on drop.
pub struct EnvGuard {
    overrides: Vec<(String, Option<OsString>)>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Takes the lock and clears every `R2PIPE_` variable a test might read.
    pub fn acquire() -> Self {
        let lock = ENV_MUTEX.lock().unwrap_or_else(PoisonError::into_inner);
        let mut guard = Self {
            overrides: Vec::new(),
            _lock: lock,
        };
        for key in [
            "R2PIPE_CONFIG_PATH",
            "R2PIPE_ENGINE",
            "R2PIPE_ENGINE_ARGS",
            "R2PIPE_LIBRARY",
            "R2PIPE_TRANSPORT",
            "R2PIPE_EVENT_POLL_MS",
            "R2PIPE_LOG_FILTER",
            "R2PIPE_LOG_FORMAT",
        ] {
            guard.remove(key);
        }
        guard
    }

    /// Sets `key` for the lifetime of the guard.
    pub fn set(&mut self, key: &str, value: impl AsRef<OsStr>) {
        self.overrides.push((key.to_owned(), std::env::var_os(key)));
        // SAFETY: the guard holds the environment lock.
        unsafe { std::env::set_var(key, value) };
    }

    fn remove(&mut self, key: &str) {
        self.overrides.push((key.to_owned(), std::env::var_os(key)));
        // SAFETY: the guard holds the environment lock.
        unsafe { std::env::remove_var(key) };
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        while let Some((key, previous)) = self.overrides.pop() {
            match previous {
                // SAFETY: the lock is released only after this loop.
                Some(value) => unsafe { std::env::set_var(&key, value) },
                None => unsafe { std::env::remove_var(&key) },
            }
        }
    }
}
