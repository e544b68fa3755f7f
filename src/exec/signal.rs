// src/exec/signal.rs

//! Terminate-then-kill for a job's process group.

use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tracing::{debug, warn};

use crate::engine::ExitOutcome;

/// Ask the job's process group to stop, then kill it once `grace` elapses.
///
/// Returns `true` when the kill was needed.
#[cfg(unix)]
pub async fn terminate_gracefully(child: &mut Child, grace: Duration) -> bool {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        // Already reaped.
        return false;
    };
    let pgid = Pid::from_raw(pid as i32);

    if let Err(e) = killpg(pgid, Signal::SIGTERM) {
        debug!(pid, error = %e, "SIGTERM to process group failed; signalling child");
        let _ = child.start_kill();
    }

    tokio::select! {
        _ = child.wait() => false,
        _ = tokio::time::sleep(grace) => {
            warn!(pid, ?grace, "process group still alive after grace period; killing");
            if killpg(pgid, Signal::SIGKILL).is_err() {
                let _ = child.start_kill();
            }
            let _ = child.wait().await;
            true
        }
    }
}

#[cfg(not(unix))]
pub async fn terminate_gracefully(child: &mut Child, _grace: Duration) -> bool {
    if let Err(e) = child.kill().await {
        warn!(error = %e, "failed to kill child process");
    }
    false
}

/// Map an exit status to the outcome shown in the summary line.
pub fn exit_outcome(status: ExitStatus) -> ExitOutcome {
    if let Some(code) = status.code() {
        return ExitOutcome::Code(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return ExitOutcome::Signal(sig);
        }
    }
    ExitOutcome::Code(-1)
}
