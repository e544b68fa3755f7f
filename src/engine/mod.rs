// src/engine/mod.rs

//! Orchestration engine for scriptrun.
//!
//! This module ties together:
//! - the concurrency gate (how many jobs may run, who waits)
//! - the active-jobs table
//! - the elevation credential flow
//! - the tab registry and its log sinks
//! - the main runtime event loop that reacts to:
//!   - launch / cancel / tab requests from the frontend
//!   - output and exit events from job workers
//!   - credential and shutdown answers
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::fmt;
use std::path::PathBuf;

use crate::types::{JobId, TabId};

/// How a process ended on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Exited with this status code.
    Code(i32),
    /// Terminated by this signal (crash, or an external kill).
    Signal(i32),
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        matches!(self, ExitOutcome::Code(0))
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Code(c) => write!(f, "{c}"),
            ExitOutcome::Signal(s) => write!(f, "signal {s}"),
        }
    }
}

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn prefix(&self) -> &'static str {
        match self {
            OutputStream::Stdout => "OUT",
            OutputStream::Stderr => "ERR",
        }
    }
}

/// Status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Waiting for a slot in the concurrency gate.
    PendingAdmission,
    /// Admitted; the process is starting or running.
    Running,
    /// The process exited on its own.
    Finished(ExitOutcome),
    /// Cancelled while queued or while running.
    Cancelled,
    /// Admitted, but the process could not be spawned.
    LaunchFailed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::PendingAdmission | JobStatus::Running)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::PendingAdmission => write!(f, "pending admission"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Finished(outcome) => write!(f, "finished:{outcome}"),
            JobStatus::Cancelled => write!(f, "cancelled"),
            JobStatus::LaunchFailed => write!(f, "launch failed"),
        }
    }
}

/// Read-only requests answered by the runtime shell from core state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Jobs,
    Tabs,
    Show { tab: TabId },
    Scripts { search: Option<String>, tag: Option<String> },
    Save { tab: TabId, path: PathBuf },
    Help,
}

/// Options shared by the core and the async shell.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// If true, exit once no more requests will arrive and every job has
    /// reached a terminal state (used by `run`).
    pub exit_when_idle: bool,
}

/// Events flowing into the runtime from the frontend and from job workers.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// Launch the script with this label or path.
    LaunchRequested { script: String },
    /// A launch was refused before reaching the core (e.g. missing file).
    LaunchRejected { script: String, reason: String },
    /// Cancel a queued or running job.
    CancelRequested { job: JobId },
    /// Change the concurrency limit.
    LimitChanged { limit: usize },

    /// Result of checking for an existing elevation session.
    ElevationProbed { authorized: bool },
    /// The user confirmed the credential prompt.
    CredentialSubmitted { credential: Credential },
    /// The user cancelled the credential prompt.
    CredentialCancelled,

    /// A worker spawned the job's process.
    JobStarted {
        job: JobId,
        pid: Option<u32>,
        program: PathBuf,
    },
    /// A worker failed to spawn the job's process.
    JobLaunchFailed { job: JobId, error: String },
    /// One line of output.
    OutputLine {
        job: JobId,
        stream: OutputStream,
        line: String,
    },
    /// The process exited on its own.
    JobExited { job: JobId, outcome: ExitOutcome },
    /// The process was stopped after a cancel request.
    JobCancelled { job: JobId, forced: bool },

    TabMoved { tab: TabId, index: usize },
    TabClosed { tab: TabId },
    FinishedTabsClosed,
    TabCleared { tab: TabId },
    /// Append a line to the scratchpad.
    ScratchpadNote { text: String },

    /// Answered by the shell without touching core state.
    Query(Query),

    /// Quit requested; `confirmed` skips the confirmation prompt.
    ShutdownRequested { confirmed: bool },
    ShutdownConfirmed,
    ShutdownAborted,
    /// No further requests will arrive from the frontend.
    InputClosed,
}

impl RuntimeEvent {
    /// Whether this event is a direct reaction to user input.
    pub fn is_interactive(&self) -> bool {
        matches!(
            self,
            RuntimeEvent::LaunchRequested { .. }
                | RuntimeEvent::LaunchRejected { .. }
                | RuntimeEvent::CancelRequested { .. }
                | RuntimeEvent::LimitChanged { .. }
                | RuntimeEvent::CredentialSubmitted { .. }
                | RuntimeEvent::CredentialCancelled
                | RuntimeEvent::TabMoved { .. }
                | RuntimeEvent::TabClosed { .. }
                | RuntimeEvent::FinishedTabsClosed
                | RuntimeEvent::TabCleared { .. }
                | RuntimeEvent::ScratchpadNote { .. }
                | RuntimeEvent::Query(_)
                | RuntimeEvent::ShutdownRequested { .. }
                | RuntimeEvent::ShutdownConfirmed
                | RuntimeEvent::ShutdownAborted
        )
    }
}

pub mod core;
pub mod elevation;
pub mod event_handlers;
pub mod gate;
pub mod jobs;
pub mod runtime;

pub use self::core::{CoreOptions, CoreRuntime};
pub use elevation::{Credential, Elevation, ElevationFlow, ElevationState};
pub use event_handlers::{CoreCommand, CoreStep, CredentialRequest, SinkUpdate};
pub use gate::{Admission, ConcurrencyGate};
pub use jobs::{Job, JobTable};
pub use runtime::{RunSummary, Runtime};
