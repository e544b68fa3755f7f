// src/exec/executor_loop.rs

//! Main executor loop that manages running job processes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::engine::RuntimeEvent;
use crate::exec::job_runner::run_job;
use crate::exec::launcher::{LaunchSettings, probe_elevation};
use crate::exec::{ExecRequest, LaunchRequest};
use crate::types::JobId;

/// Internal handle for a job worker.
///
/// - `cancel` carries the grace period to the worker; taken on first use.
/// - `handle` is the Tokio task running the process.
struct ActiveJob {
    cancel: Option<oneshot::Sender<Duration>>,
    handle: JoinHandle<()>,
}

/// Spawn the background executor loop.
///
/// Returns the request sender and the loop's own handle. The loop never
/// decides admission; it starts whatever it is told to start. When the
/// request channel closes, remaining workers are cancelled without grace
/// and awaited.
pub fn spawn_executor(
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    settings: LaunchSettings,
) -> (mpsc::Sender<ExecRequest>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<ExecRequest>(32);
    let settings = Arc::new(settings);

    let handle = tokio::spawn(async move {
        info!("executor loop started");

        let mut active: HashMap<JobId, ActiveJob> = HashMap::new();

        while let Some(request) = rx.recv().await {
            active.retain(|_, a| !a.handle.is_finished());

            match request {
                ExecRequest::Start(launch) => {
                    start_job(launch, &settings, &mut active, &runtime_tx);
                }
                ExecRequest::Cancel { job, grace } => cancel_job(job, grace, &mut active),
                ExecRequest::ProbeElevation => {
                    let program = settings.elevation_program.clone();
                    let tx = runtime_tx.clone();
                    tokio::spawn(async move {
                        let authorized = probe_elevation(&program).await;
                        debug!(authorized, "elevation probe finished");
                        let _ = tx.send(RuntimeEvent::ElevationProbed { authorized }).await;
                    });
                }
            }
        }

        info!(remaining = active.len(), "executor loop finished (channel closed)");
        for (job, mut entry) in active.drain() {
            if let Some(cancel) = entry.cancel.take() {
                let _ = cancel.send(Duration::ZERO);
            }
            if let Err(e) = entry.handle.await {
                debug!(job = %job, error = %e, "job worker ended abnormally");
            }
        }
    });

    (tx, handle)
}

fn start_job(
    launch: LaunchRequest,
    settings: &Arc<LaunchSettings>,
    active: &mut HashMap<JobId, ActiveJob>,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) {
    let job = launch.job;
    if active.contains_key(&job) {
        debug!(job = %job, "job already has a worker; ignoring duplicate start");
        return;
    }

    let (cancel_tx, cancel_rx) = oneshot::channel::<Duration>();
    let rt_tx = runtime_tx.clone();
    let settings = Arc::clone(settings);

    let handle = tokio::spawn(async move {
        run_job(launch, &settings, rt_tx, cancel_rx).await;
        debug!(job = %job, "job runner future finished");
    });

    active.insert(
        job,
        ActiveJob {
            cancel: Some(cancel_tx),
            handle,
        },
    );
}

fn cancel_job(job: JobId, grace: Duration, active: &mut HashMap<JobId, ActiveJob>) {
    let Some(entry) = active.get_mut(&job) else {
        debug!(job = %job, "cancel for job without a worker; already finished");
        return;
    };

    match entry.cancel.take() {
        Some(cancel) => {
            if cancel.send(grace).is_err() {
                debug!(job = %job, "process already finished while cancelling");
            }
        }
        None => debug!(job = %job, "cancel already delivered"),
    }
}
