// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.
//!
//! Every handler mutates [`CoreState`] and appends the commands the IO shell
//! must carry out. Lines written to sinks are echoed as
//! [`CoreCommand::Render`] so frontends can stream them.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::ScriptDescriptor;
use crate::engine::core::{CoreOptions, CoreState, ShutdownPhase};
use crate::engine::elevation::{ElevationStep, SubmitOutcome};
use crate::engine::jobs::Job;
use crate::engine::{
    Admission, Credential, Elevation, ElevationState, ExitOutcome, JobStatus, OutputStream,
};
use crate::exec::{ExecRequest, LaunchRequest};
use crate::sink::{SEPARATOR, SinkStatus};
use crate::types::{JobId, TabId};

/// A line appended to a sink, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkUpdate {
    pub tab: TabId,
    pub title: String,
    pub line: String,
}

/// What the credential prompt should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRequest {
    /// Labels of the scripts waiting on this prompt.
    pub scripts: Vec<String>,
    /// Number of rejected (empty) submissions so far.
    pub attempt: u32,
}

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Forward to the executor backend.
    Execute(ExecRequest),
    /// Open (or keep open) the credential prompt.
    PromptCredential(CredentialRequest),
    /// Ask the user whether to quit with jobs still active.
    ConfirmShutdown { active: usize },
    /// Display a line that was just appended to a sink.
    Render(SinkUpdate),
    /// Request that the process exits.
    RequestExit,
}

/// Decision returned by the core after handling a single `RuntimeEvent`.
#[derive(Debug, Clone)]
pub struct CoreStep {
    /// Commands the IO shell should execute.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

/// Append `text` to a tab's sink and echo it for rendering.
pub(crate) fn append(state: &mut CoreState, tab: TabId, text: &str, out: &mut Vec<CoreCommand>) {
    let Some(t) = state.tabs.get_mut(tab) else {
        debug!(tab = %tab, "append to unknown tab dropped");
        return;
    };
    let title = t.title.clone();
    for line in t.sink.append(text) {
        out.push(CoreCommand::Render(SinkUpdate {
            tab,
            title: title.clone(),
            line,
        }));
    }
}

pub(crate) fn console(state: &mut CoreState, text: &str, out: &mut Vec<CoreCommand>) {
    let tab = state.tabs.console_id();
    append(state, tab, text, out);
}

/// Handle a launch request from the frontend.
///
/// - Unknown scripts and refused duplicates are reported on the console.
/// - Scripts that need elevation go through the credential flow first; no
///   job exists until a credential (or session) is available.
/// - Everything else becomes a job and asks the gate for a slot.
pub fn handle_launch_request(
    state: &mut CoreState,
    opts: &CoreOptions,
    key: &str,
    out: &mut Vec<CoreCommand>,
) {
    if state.shutdown != ShutdownPhase::Running {
        console(state, &format!("[WARN] Shutting down; not launching {key}."), out);
        return;
    }

    let Some(script) = state.catalog.find(key).cloned() else {
        console(state, &format!("[ERROR] Unknown script: {key}"), out);
        return;
    };

    if !opts.allow_duplicate_runs {
        let live = state.jobs.live_for_script(&script.path).is_some();
        let parked = state.elevation.waiting().any(|s| s.path == script.path);
        if live || parked {
            console(
                state,
                &format!("[WARN] {} is already running. Please wait.", script.label),
                out,
            );
            return;
        }
    }

    if !script.needs_sudo {
        create_job(state, opts, script, Elevation::None, out);
        return;
    }

    let label = script.label.clone();
    match state.elevation.begin(script.clone()) {
        ElevationStep::Ready(elevation) => create_job(state, opts, script, elevation, out),
        ElevationStep::Probe => {
            info!(script = %script.path, "elevation required; probing for an existing session");
            out.push(CoreCommand::Execute(ExecRequest::ProbeElevation));
        }
        ElevationStep::Waiting => {
            console(
                state,
                &format!("[INFO] {label} is waiting for the sudo password prompt."),
                out,
            );
        }
    }
}

pub fn handle_launch_rejected(
    state: &mut CoreState,
    script: &str,
    reason: &str,
    out: &mut Vec<CoreCommand>,
) {
    warn!(script = %script, reason = %reason, "launch rejected");
    console(state, &format!("[ERROR] {reason}"), out);
}

/// Create a job for `script`, bind it to a tab and ask the gate for a slot.
fn create_job(
    state: &mut CoreState,
    opts: &CoreOptions,
    script: ScriptDescriptor,
    elevation: Elevation,
    out: &mut Vec<CoreCommand>,
) {
    let id = state.jobs.allocate_id();
    let binding = state.tabs.open_for_job(&script, id, opts.tab_reuse);

    let needs_gap = state
        .tabs
        .get(binding.tab)
        .is_some_and(|t| !t.sink.lines().is_empty());
    if needs_gap {
        append(state, binding.tab, "", out);
    }
    append(state, binding.tab, SEPARATOR, out);

    state.jobs.insert(Job {
        id,
        script,
        tab: binding.tab,
        status: JobStatus::PendingAdmission,
        elevation,
        pid: None,
        cancelling: false,
    });

    match state.gate.request_admission(id) {
        Admission::Admitted => dispatch(state, id, out),
        Admission::Queued { position } => {
            let limit = state.gate.limit();
            append(
                state,
                binding.tab,
                &format!("[INFO] Waiting for a free slot (position {position}, limit {limit})."),
                out,
            );
        }
    }
}

/// Mark an admitted job running and hand it to the executor.
fn dispatch(state: &mut CoreState, id: JobId, out: &mut Vec<CoreCommand>) {
    let Some(job) = state.jobs.get_mut(id) else {
        warn!(job = %id, "admitted job missing from table");
        return;
    };
    job.status = JobStatus::Running;
    let elevation = std::mem::replace(&mut job.elevation, Elevation::None);
    let request = LaunchRequest {
        job: id,
        script: job.script.clone(),
        elevation,
    };
    info!(job = %id, script = %request.script.path, "dispatching job");
    out.push(CoreCommand::Execute(ExecRequest::Start(request)));
}

fn dispatch_all(state: &mut CoreState, admitted: Vec<JobId>, out: &mut Vec<CoreCommand>) {
    for id in admitted {
        dispatch(state, id, out);
    }
}

/// Finalize a job: summary line, separator, sink status, tab release,
/// removal from the active table and gate release.
fn finalize(
    state: &mut CoreState,
    id: JobId,
    status: JobStatus,
    summary: &str,
    out: &mut Vec<CoreCommand>,
) {
    let Some(job) = state.jobs.retire(id, status) else {
        debug!(job = %id, "terminal event for unknown job ignored");
        return;
    };

    append(state, job.tab, summary, out);
    append(state, job.tab, SEPARATOR, out);

    let sink_status = match status {
        JobStatus::Finished(outcome) => SinkStatus::Finished(outcome),
        JobStatus::LaunchFailed => SinkStatus::LaunchFailed,
        _ => SinkStatus::Cancelled,
    };
    if let Some(tab) = state.tabs.get_mut(job.tab) {
        tab.sink.finish(sink_status);
    }
    state.tabs.release(job.tab, id);

    let admitted = state.gate.release(id);
    dispatch_all(state, admitted, out);
}

pub fn handle_job_started(
    state: &mut CoreState,
    id: JobId,
    pid: Option<u32>,
    program: &Path,
    out: &mut Vec<CoreCommand>,
) {
    let Some(job) = state.jobs.get_mut(id) else {
        debug!(job = %id, "start event for unknown job ignored");
        return;
    };
    job.pid = pid;
    let tab = job.tab;
    append(state, tab, &format!("[INFO] Running: {}", program.display()), out);
}

pub fn handle_output(
    state: &mut CoreState,
    id: JobId,
    stream: OutputStream,
    line: &str,
    out: &mut Vec<CoreCommand>,
) {
    let Some(job) = state.jobs.get(id) else {
        debug!(job = %id, "output for unknown job dropped");
        return;
    };
    let tab = job.tab;
    append(state, tab, &format!("[{}] {}", stream.prefix(), line), out);
}

pub fn handle_job_exit(
    state: &mut CoreState,
    id: JobId,
    outcome: ExitOutcome,
    out: &mut Vec<CoreCommand>,
) {
    let Some(job) = state.jobs.get(id) else {
        debug!(job = %id, "exit for unknown job ignored");
        return;
    };
    let name = job.script.file_name().to_string();
    let summary = if outcome.success() {
        format!("[DONE] {name}")
    } else {
        format!("[FAIL ({outcome})] {name}")
    };
    info!(job = %id, outcome = %outcome, "job exited");
    finalize(state, id, JobStatus::Finished(outcome), &summary, out);
}

pub fn handle_job_cancelled(
    state: &mut CoreState,
    id: JobId,
    forced: bool,
    out: &mut Vec<CoreCommand>,
) {
    let Some(job) = state.jobs.get(id) else {
        debug!(job = %id, "cancel confirmation for unknown job ignored");
        return;
    };
    let name = job.script.file_name().to_string();
    let tab = job.tab;
    if forced {
        warn!(job = %id, "process ignored termination signal; killed after grace period");
        append(
            state,
            tab,
            "[WARN] Process ignored the termination signal; killed after the grace period.",
            out,
        );
        console(
            state,
            &format!("[WARN] {name} ({id}) had to be killed after the grace period."),
            out,
        );
    }
    finalize(state, id, JobStatus::Cancelled, &format!("[CANCELLED] {name}"), out);
}

pub fn handle_launch_failure(
    state: &mut CoreState,
    id: JobId,
    error: &str,
    out: &mut Vec<CoreCommand>,
) {
    let Some(job) = state.jobs.get(id) else {
        debug!(job = %id, "launch failure for unknown job ignored");
        return;
    };
    let label = job.script.label.clone();
    warn!(job = %id, error = %error, "launch failed");
    console(state, &format!("[ERROR] Failed to launch {label}: {error}"), out);
    finalize(state, id, JobStatus::LaunchFailed, &format!("[ERROR] {error}"), out);
}

/// Cancel a job.
///
/// - Queued jobs are withdrawn from the gate and never start a process.
/// - Running jobs get a cancel request; they are finalized when the worker
///   reports back.
pub fn handle_cancel_request(
    state: &mut CoreState,
    opts: &CoreOptions,
    id: JobId,
    out: &mut Vec<CoreCommand>,
) {
    let Some(job) = state.jobs.get_mut(id) else {
        console(state, &format!("[WARN] Job {id} is not active."), out);
        return;
    };

    match job.status {
        JobStatus::PendingAdmission => {
            let name = job.script.file_name().to_string();
            state.gate.withdraw(id);
            info!(job = %id, "cancelled before admission");
            finalize(
                state,
                id,
                JobStatus::Cancelled,
                &format!("[CANCELLED] {name} (never started)"),
                out,
            );
        }
        JobStatus::Running if job.cancelling => {
            console(state, &format!("[INFO] Job {id} is already being cancelled."), out);
        }
        JobStatus::Running => {
            job.cancelling = true;
            let tab = job.tab;
            info!(job = %id, grace = ?opts.cancel_grace_period, "cancelling running job");
            append(state, tab, "[INFO] Cancelling...", out);
            out.push(CoreCommand::Execute(ExecRequest::Cancel {
                job: id,
                grace: opts.cancel_grace_period,
            }));
        }
        _ => {}
    }
}

pub fn handle_limit_change(state: &mut CoreState, limit: usize, out: &mut Vec<CoreCommand>) {
    let admitted = state.gate.set_limit(limit);
    let applied = state.gate.limit();
    console(state, &format!("[INFO] Max concurrent scripts: {applied}"), out);
    dispatch_all(state, admitted, out);
}

pub fn handle_elevation_probe(
    state: &mut CoreState,
    opts: &CoreOptions,
    authorized: bool,
    out: &mut Vec<CoreCommand>,
) {
    match state.elevation.probed(authorized) {
        Some(released) => {
            for (script, elevation) in released {
                create_job(state, opts, script, elevation, out);
            }
        }
        None => out.push(CoreCommand::PromptCredential(credential_request(state, 0))),
    }
}

pub fn handle_credential_submitted(
    state: &mut CoreState,
    opts: &CoreOptions,
    credential: Credential,
    out: &mut Vec<CoreCommand>,
) {
    match state.elevation.submit(credential) {
        SubmitOutcome::Rejected => {
            let attempt = match state.elevation.state() {
                ElevationState::AwaitingInput { attempts, .. } => *attempts,
                _ => 0,
            };
            debug!(attempt, "empty credential rejected; prompt stays open");
            out.push(CoreCommand::PromptCredential(credential_request(state, attempt)));
        }
        SubmitOutcome::Released(released) => {
            for (script, elevation) in released {
                create_job(state, opts, script, elevation, out);
            }
        }
        SubmitOutcome::Ignored => {
            debug!("credential submitted while no prompt was pending");
        }
    }
}

pub fn handle_credential_cancelled(state: &mut CoreState, out: &mut Vec<CoreCommand>) {
    for script in state.elevation.cancel() {
        console(state, &format!("[WARN] Aborted by user: {}", script.label), out);
    }
}

fn credential_request(state: &CoreState, attempt: u32) -> CredentialRequest {
    CredentialRequest {
        scripts: state.elevation.waiting().map(|s| s.label.clone()).collect(),
        attempt,
    }
}

pub fn handle_tab_move(
    state: &mut CoreState,
    tab: TabId,
    index: usize,
    out: &mut Vec<CoreCommand>,
) {
    match state.tabs.move_to(tab, index) {
        Ok(pos) => debug!(tab = %tab, position = pos, "tab moved"),
        Err(e) => console(state, &format!("[WARN] {e}"), out),
    }
}

pub fn handle_tab_close(state: &mut CoreState, tab: TabId, out: &mut Vec<CoreCommand>) {
    match state.tabs.close(tab) {
        Ok(closed) => console(state, &format!("[INFO] Closed tab: {}", closed.title), out),
        Err(e) => console(state, &format!("[WARN] Cannot close tab: {e}"), out),
    }
}

pub fn handle_close_finished_tabs(state: &mut CoreState, out: &mut Vec<CoreCommand>) {
    for closed in state.tabs.close_finished() {
        console(state, &format!("[INFO] Closed finished tab: {}", closed.title), out);
    }
}

pub fn handle_tab_clear(state: &mut CoreState, tab: TabId, out: &mut Vec<CoreCommand>) {
    match state.tabs.get_mut(tab) {
        Some(t) => t.sink.clear(),
        None => console(state, &format!("[WARN] No tab {tab}"), out),
    }
}

pub fn handle_scratchpad_note(state: &mut CoreState, text: &str, out: &mut Vec<CoreCommand>) {
    let tab = state.tabs.scratchpad_id();
    append(state, tab, text, out);
}

pub fn handle_shutdown_request(
    state: &mut CoreState,
    opts: &CoreOptions,
    confirmed: bool,
    out: &mut Vec<CoreCommand>,
) {
    if state.jobs.is_empty() || confirmed {
        begin_drain(state, opts, out);
        return;
    }
    state.shutdown = ShutdownPhase::AwaitingConfirmation;
    out.push(CoreCommand::ConfirmShutdown {
        active: state.jobs.active_count(),
    });
}

/// Cancel everything and wait for the active table to empty.
pub fn begin_drain(state: &mut CoreState, opts: &CoreOptions, out: &mut Vec<CoreCommand>) {
    if state.shutdown == ShutdownPhase::Draining {
        return;
    }
    state.shutdown = ShutdownPhase::Draining;

    for script in state.elevation.cancel() {
        console(state, &format!("[WARN] Aborted by shutdown: {}", script.label), out);
    }

    let active: Vec<JobId> = state.jobs.active().map(|j| j.id).collect();
    if !active.is_empty() {
        info!(count = active.len(), "cancelling active jobs before exit");
        console(
            state,
            &format!("[INFO] Cancelling {} active job(s) before exit.", active.len()),
            out,
        );
    }
    for id in active {
        handle_cancel_request(state, opts, id, out);
    }
}

pub fn handle_shutdown_aborted(state: &mut CoreState, out: &mut Vec<CoreCommand>) {
    if state.shutdown == ShutdownPhase::AwaitingConfirmation {
        state.shutdown = ShutdownPhase::Running;
        console(state, "[INFO] Shutdown aborted.", out);
    }
}
