//! Reaping helpers for engine processes.

use std::process::Child;

use tracing::{debug, warn};

use super::SUBPROCESS_TARGET;

/// Kills `child` and waits for it so no zombie is left behind.
///
/// Used on paths where the engine is abandoned rather than asked to quit:
/// a failed readiness read, or a backend dropped without shutdown.
pub(super) fn kill_and_reap(child: &mut Child, reason: &str) {
    match child.try_wait() {
        Ok(Some(status)) => {
            debug!(
                target: SUBPROCESS_TARGET,
                pid = child.id(),
                ?status,
                reason,
                "engine already exited"
            );
            return;
        }
        Ok(None) => {}
        Err(error) => {
            warn!(
                target: SUBPROCESS_TARGET,
                pid = child.id(),
                %error,
                "failed to check engine status, killing anyway"
            );
        }
    }

    if let Err(error) = child.kill() {
        warn!(
            target: SUBPROCESS_TARGET,
            pid = child.id(),
            %error,
            reason,
            "failed to kill engine process"
        );
        return;
    }

    match child.wait() {
        Ok(status) => debug!(
            target: SUBPROCESS_TARGET,
            pid = child.id(),
            ?status,
            reason,
            "engine process killed"
        ),
        Err(error) => warn!(
            target: SUBPROCESS_TARGET,
            pid = child.id(),
            %error,
            "failed to reap killed engine process"
        ),
    }
}
