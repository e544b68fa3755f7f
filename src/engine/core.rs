// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - reading events from channels
//! - forwarding `ExecRequest`s to the executor
//! - talking to the frontend (prompts, rendering)
//!
//! All lifecycle transitions (admission, sink finalization, tab binding)
//! happen here, on the single coordinator, so the core can be unit tested
//! without Tokio, channels or processes.

use std::time::Duration;

use crate::catalog::ScriptCatalog;
use crate::config::{RunnerSettings, ScriptDescriptor};
use crate::engine::elevation::ElevationFlow;
use crate::engine::event_handlers::{self as handlers, CoreCommand, CoreStep};
use crate::engine::gate::ConcurrencyGate;
use crate::engine::jobs::JobTable;
use crate::engine::{ElevationState, JobStatus, RuntimeEvent, RuntimeOptions};
use crate::sink::TabRegistry;
use crate::types::{JobId, TabReusePolicy};

/// Knobs the core reads but never changes.
#[derive(Debug, Clone, Copy)]
pub struct CoreOptions {
    pub tab_reuse: TabReusePolicy,
    pub allow_duplicate_runs: bool,
    pub cancel_grace_period: Duration,
    pub runtime: RuntimeOptions,
}

impl CoreOptions {
    pub fn from_settings(settings: &RunnerSettings, runtime: RuntimeOptions) -> Self {
        Self {
            tab_reuse: settings.tab_reuse,
            allow_duplicate_runs: settings.allow_duplicate_runs,
            cancel_grace_period: settings.cancel_grace_period,
            runtime,
        }
    }
}

/// Where the application is in its shutdown sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    Running,
    AwaitingConfirmation,
    /// Every active job has been asked to stop; exit once they are gone.
    Draining,
}

/// Mutable state owned by the coordinator.
#[derive(Debug)]
pub struct CoreState {
    pub(crate) catalog: ScriptCatalog,
    pub(crate) gate: ConcurrencyGate,
    pub(crate) jobs: JobTable,
    pub(crate) tabs: TabRegistry,
    pub(crate) elevation: ElevationFlow<ScriptDescriptor>,
    pub(crate) shutdown: ShutdownPhase,
    pub(crate) input_closed: bool,
}

impl CoreState {
    /// Nothing is running, queued or waiting on a prompt.
    pub(crate) fn is_idle(&self) -> bool {
        self.jobs.is_empty() && !self.elevation.is_awaiting()
    }
}

/// Pure core runtime.
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug)]
pub struct CoreRuntime {
    state: CoreState,
    options: CoreOptions,
}

impl CoreRuntime {
    pub fn new(
        catalog: ScriptCatalog,
        max_concurrent: usize,
        cache_credential: bool,
        options: CoreOptions,
    ) -> Self {
        Self {
            state: CoreState {
                catalog,
                gate: ConcurrencyGate::new(max_concurrent),
                jobs: JobTable::new(),
                tabs: TabRegistry::new(),
                elevation: ElevationFlow::new(cache_credential),
                shutdown: ShutdownPhase::Running,
                input_closed: false,
            },
            options,
        }
    }

    pub fn catalog(&self) -> &ScriptCatalog {
        &self.state.catalog
    }

    pub fn tabs(&self) -> &TabRegistry {
        &self.state.tabs
    }

    pub fn jobs(&self) -> &JobTable {
        &self.state.jobs
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.state.gate
    }

    pub fn elevation_state(&self) -> &ElevationState {
        self.state.elevation.state()
    }

    pub fn shutdown_phase(&self) -> ShutdownPhase {
        self.state.shutdown
    }

    pub fn job_status(&self, job: JobId) -> Option<JobStatus> {
        self.state.jobs.status(job)
    }

    /// Whether the core is waiting on the user (credential or quit prompt).
    pub fn interaction_pending(&self) -> bool {
        self.state.elevation.is_awaiting()
            || self.state.shutdown == ShutdownPhase::AwaitingConfirmation
    }

    /// Expose whether nothing is running or waiting (for tests).
    pub fn is_idle(&self) -> bool {
        self.state.is_idle()
    }

    /// Write an application message to the console sink.
    pub fn log_console(&mut self, message: &str) -> Vec<CoreCommand> {
        let mut out = Vec::new();
        handlers::console(&mut self.state, message, &mut out);
        out
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        let state = &mut self.state;
        let opts = &self.options;
        let mut out = Vec::new();

        match event {
            RuntimeEvent::LaunchRequested { script } => {
                handlers::handle_launch_request(state, opts, &script, &mut out)
            }
            RuntimeEvent::LaunchRejected { script, reason } => {
                handlers::handle_launch_rejected(state, &script, &reason, &mut out)
            }
            RuntimeEvent::CancelRequested { job } => {
                handlers::handle_cancel_request(state, opts, job, &mut out)
            }
            RuntimeEvent::LimitChanged { limit } => {
                handlers::handle_limit_change(state, limit, &mut out)
            }
            RuntimeEvent::ElevationProbed { authorized } => {
                handlers::handle_elevation_probe(state, opts, authorized, &mut out)
            }
            RuntimeEvent::CredentialSubmitted { credential } => {
                handlers::handle_credential_submitted(state, opts, credential, &mut out)
            }
            RuntimeEvent::CredentialCancelled => {
                handlers::handle_credential_cancelled(state, &mut out)
            }
            RuntimeEvent::JobStarted { job, pid, program } => {
                handlers::handle_job_started(state, job, pid, &program, &mut out)
            }
            RuntimeEvent::JobLaunchFailed { job, error } => {
                handlers::handle_launch_failure(state, job, &error, &mut out)
            }
            RuntimeEvent::OutputLine { job, stream, line } => {
                handlers::handle_output(state, job, stream, &line, &mut out)
            }
            RuntimeEvent::JobExited { job, outcome } => {
                handlers::handle_job_exit(state, job, outcome, &mut out)
            }
            RuntimeEvent::JobCancelled { job, forced } => {
                handlers::handle_job_cancelled(state, job, forced, &mut out)
            }
            RuntimeEvent::TabMoved { tab, index } => {
                handlers::handle_tab_move(state, tab, index, &mut out)
            }
            RuntimeEvent::TabClosed { tab } => handlers::handle_tab_close(state, tab, &mut out),
            RuntimeEvent::FinishedTabsClosed => {
                handlers::handle_close_finished_tabs(state, &mut out)
            }
            RuntimeEvent::TabCleared { tab } => handlers::handle_tab_clear(state, tab, &mut out),
            RuntimeEvent::ScratchpadNote { text } => {
                handlers::handle_scratchpad_note(state, &text, &mut out)
            }
            RuntimeEvent::Query(_) => {
                // Answered by the shell from read-only accessors.
            }
            RuntimeEvent::ShutdownRequested { confirmed } => {
                handlers::handle_shutdown_request(state, opts, confirmed, &mut out)
            }
            RuntimeEvent::ShutdownConfirmed => {
                handlers::begin_drain(state, opts, &mut out)
            }
            RuntimeEvent::ShutdownAborted => handlers::handle_shutdown_aborted(state, &mut out),
            RuntimeEvent::InputClosed => {
                state.input_closed = true;
            }
        }

        let keep_running = !self.should_exit();
        if !keep_running {
            out.push(CoreCommand::RequestExit);
        }

        CoreStep {
            commands: out,
            keep_running,
        }
    }

    fn should_exit(&self) -> bool {
        let state = &self.state;
        match state.shutdown {
            ShutdownPhase::Draining => state.jobs.is_empty(),
            ShutdownPhase::AwaitingConfirmation => false,
            ShutdownPhase::Running => {
                self.options.runtime.exit_when_idle && state.input_closed && state.is_idle()
            }
        }
    }
}
