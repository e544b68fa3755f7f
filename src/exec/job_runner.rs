// src/exec/job_runner.rs

//! Runs a single job from spawn to its one terminal event.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

use crate::engine::{Elevation, ExitOutcome, OutputStream, RuntimeEvent};
use crate::exec::LaunchRequest;
use crate::exec::launcher::{LaunchSettings, build_command, resolve_script_path};
use crate::exec::output::spawn_reader;
use crate::exec::signal::{exit_outcome, terminate_gracefully};
use crate::types::JobId;

/// How long to wait for buffered output after the process is gone.
///
/// Background grandchildren can hold the pipes open indefinitely.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

enum Terminal {
    Exited(ExitOutcome),
    Cancelled { forced: bool },
}

/// Run one job.
///
/// Sends `JobStarted` (or `JobLaunchFailed`), then every output line, then
/// exactly one of `JobExited` / `JobCancelled`. Output is fully drained
/// before the terminal event so no line can arrive after it.
///
/// `cancel_rx` carries the grace period to allow before killing.
pub async fn run_job(
    request: LaunchRequest,
    settings: &LaunchSettings,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    mut cancel_rx: oneshot::Receiver<Duration>,
) {
    let job = request.job;
    let resolved = resolve_script_path(&settings.root, &request.script.path);
    let mut cmd = build_command(settings, &resolved, &request.elevation);

    info!(job = %job, script = %resolved.display(), "starting job process");

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            error!(job = %job, error = %e, "failed to spawn job process");
            let _ = runtime_tx
                .send(RuntimeEvent::JobLaunchFailed {
                    job,
                    error: format!("Failed to start {}: {e}", resolved.display()),
                })
                .await;
            return;
        }
    };

    let _ = runtime_tx
        .send(RuntimeEvent::JobStarted {
            job,
            pid: child.id(),
            program: resolved.clone(),
        })
        .await;

    if let Elevation::Sudo {
        credential: Some(credential),
    } = &request.elevation
    {
        if let Some(mut stdin) = child.stdin.take() {
            let payload = Zeroizing::new(format!("{}\n", credential.expose()));
            if let Err(e) = stdin.write_all(payload.as_bytes()).await {
                warn!(job = %job, error = %e, "could not hand credential to elevation program");
            }
            // Dropping stdin closes it.
        }
    }

    let mut readers: Vec<JoinHandle<()>> = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_reader(stdout, job, OutputStream::Stdout, runtime_tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_reader(stderr, job, OutputStream::Stderr, runtime_tx.clone()));
    }

    // Either the process exits on its own, or a cancellation arrives. A
    // dropped cancel sender is not a cancellation. An exit that is already
    // available wins over a cancel that arrives in the same poll.
    let terminal = tokio::select! {
        biased;

        status = child.wait() => match status {
            Ok(status) => Terminal::Exited(exit_outcome(status)),
            Err(e) => {
                error!(job = %job, error = %e, "waiting for job process failed");
                Terminal::Exited(ExitOutcome::Code(-1))
            }
        },
        Ok(grace) = &mut cancel_rx => match child.try_wait() {
            Ok(Some(status)) => {
                debug!(job = %job, "cancellation arrived after the process exited");
                Terminal::Exited(exit_outcome(status))
            }
            _ => {
                info!(job = %job, ?grace, "cancellation requested; terminating process group");
                let forced = terminate_gracefully(&mut child, grace).await;
                Terminal::Cancelled { forced }
            }
        }
    };

    drain_readers(job, readers).await;

    let event = match terminal {
        Terminal::Exited(outcome) => {
            info!(job = %job, %outcome, "job process exited");
            RuntimeEvent::JobExited { job, outcome }
        }
        Terminal::Cancelled { forced } => RuntimeEvent::JobCancelled { job, forced },
    };

    if runtime_tx.send(event).await.is_err() {
        debug!(job = %job, "runtime gone before terminal event could be delivered");
    }
}

async fn drain_readers(job: JobId, readers: Vec<JoinHandle<()>>) {
    for mut handle in readers {
        if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, &mut handle)
            .await
            .is_err()
        {
            warn!(job = %job, "output pipe still open after process ended; detaching reader");
            handle.abort();
        }
    }
}
