// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The runtime talks to an `ExecutorBackend` instead of a raw mpsc sender.
//! This makes it easy to swap in a fake executor in tests while keeping the
//! production executor in [`super::executor_loop`].
//!
//! - `RealExecutorBackend` is the default implementation used by `scriptrun`.
//!   It wraps the `spawn_executor` loop and forwards requests over an mpsc
//!   channel.
//! - Tests can provide their own `ExecutorBackend` that, for example, records
//!   which jobs were started and emits `JobExited` events directly.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::ScriptDescriptor;
use crate::engine::RuntimeEvent;
use crate::errors::{Result, ScriptrunError};
use crate::exec::ExecRequest;
use crate::exec::executor_loop::spawn_executor;
use crate::exec::launcher::{LaunchSettings, preflight};

/// Trait abstracting how jobs are executed.
///
/// Production code uses [`RealExecutorBackend`]; tests can provide their own
/// implementation that doesn't spawn real processes.
pub trait ExecutorBackend: Send {
    /// Check a script before a job is created for it. The error's message is
    /// shown to the user.
    fn preflight(&self, _script: &ScriptDescriptor) -> Result<()> {
        Ok(())
    }

    /// Forward a start / cancel / probe request.
    fn dispatch(
        &mut self,
        request: ExecRequest,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Stop accepting requests and wait (bounded) for workers to finish.
    fn shutdown(
        &mut self,
        _timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }
}

/// Real executor backend used in production.
pub struct RealExecutorBackend {
    tx: Option<mpsc::Sender<ExecRequest>>,
    loop_handle: Option<JoinHandle<()>>,
    settings: LaunchSettings,
}

impl RealExecutorBackend {
    /// Create a new real executor backend, wiring it to the given runtime
    /// event sender.
    ///
    /// This spawns the background executor loop immediately.
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, settings: LaunchSettings) -> Self {
        let (tx, loop_handle) = spawn_executor(runtime_tx, settings.clone());
        Self {
            tx: Some(tx),
            loop_handle: Some(loop_handle),
            settings,
        }
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn preflight(&self, script: &ScriptDescriptor) -> Result<()> {
        preflight(&self.settings, script).map(|_| ())
    }

    fn dispatch(
        &mut self,
        request: ExecRequest,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Clone the sender so the future doesn't borrow `self` across `await`.
        let tx = self.tx.clone();

        Box::pin(async move {
            let tx = tx.ok_or_else(|| {
                ScriptrunError::LaunchFailure("executor has been shut down".to_string())
            })?;
            tx.send(request).await.map_err(|_| {
                ScriptrunError::LaunchFailure("executor loop is not running".to_string())
            })
        })
    }

    fn shutdown(
        &mut self,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        // Closing the channel ends the loop, which cancels leftovers.
        self.tx.take();
        let handle = self.loop_handle.take();

        Box::pin(async move {
            let Some(mut handle) = handle else {
                return Ok(());
            };
            match tokio::time::timeout(timeout, &mut handle).await {
                Ok(_) => info!("executor stopped"),
                Err(_) => {
                    warn!(?timeout, "executor did not stop in time; abandoning workers");
                    handle.abort();
                }
            }
            Ok(())
        })
    }
}
