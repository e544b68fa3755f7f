// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running scripts, using
//! `tokio::process::Command`, and reporting back to the runtime via
//! `RuntimeEvent`s. Nothing here touches core state.
//!
//! - [`backend`] provides the `ExecutorBackend` trait and the production
//!   `RealExecutorBackend`, which tests replace with fakes.
//! - [`executor_loop`] owns the table of worker handles and routes start /
//!   cancel / probe requests.
//! - [`job_runner`] runs one job: spawn, credential hand-off, wait or cancel.
//! - [`launcher`] resolves script paths and builds the command line.
//! - [`output`] drains stdout / stderr into `OutputLine` events.
//! - [`signal`] implements terminate-then-kill for process groups.

use std::time::Duration;

use crate::config::ScriptDescriptor;
use crate::engine::Elevation;
use crate::types::JobId;

pub mod backend;
pub mod executor_loop;
pub mod job_runner;
pub mod launcher;
pub mod output;
pub mod signal;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use executor_loop::spawn_executor;
pub use launcher::{LaunchSettings, resolve_script_path};

/// Everything a worker needs to start one job.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub job: JobId,
    pub script: ScriptDescriptor,
    pub elevation: Elevation,
}

/// Requests from the runtime to the executor.
#[derive(Debug, Clone)]
pub enum ExecRequest {
    Start(LaunchRequest),
    /// Terminate the job's process group, killing it after `grace`.
    Cancel { job: JobId, grace: Duration },
    /// Check whether the elevation program already holds a valid session.
    ProbeElevation,
}
