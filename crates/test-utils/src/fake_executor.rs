use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use scriptrun::config::ScriptDescriptor;
use scriptrun::engine::{ExitOutcome, OutputStream, RuntimeEvent};
use scriptrun::errors::{Result, ScriptrunError};
use scriptrun::exec::{ExecRequest, ExecutorBackend};

/// A fake executor that:
/// - records every request it receives
/// - immediately reports start, one output line and an exit for each job,
///   unless the script is "held", in which case the job runs until cancelled
/// - answers elevation probes with a fixed result.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    requests: Arc<Mutex<Vec<ExecRequest>>>,
    exit_codes: HashMap<String, i32>,
    held: HashSet<String>,
    missing: HashSet<String>,
    session_valid: bool,
}

impl FakeExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            runtime_tx,
            requests: Arc::new(Mutex::new(Vec::new())),
            exit_codes: HashMap::new(),
            held: HashSet::new(),
            missing: HashSet::new(),
            session_valid: false,
        }
    }

    /// Shared view of the recorded requests.
    pub fn requests(&self) -> Arc<Mutex<Vec<ExecRequest>>> {
        Arc::clone(&self.requests)
    }

    pub fn with_exit_code(mut self, path: &str, code: i32) -> Self {
        self.exit_codes.insert(path.to_string(), code);
        self
    }

    /// Jobs for `path` start but never exit on their own.
    pub fn hold(mut self, path: &str) -> Self {
        self.held.insert(path.to_string());
        self
    }

    /// `path` fails the pre-flight check.
    pub fn missing(mut self, path: &str) -> Self {
        self.missing.insert(path.to_string());
        self
    }

    pub fn with_session(mut self, valid: bool) -> Self {
        self.session_valid = valid;
        self
    }
}

impl ExecutorBackend for FakeExecutor {
    fn preflight(&self, script: &ScriptDescriptor) -> Result<()> {
        if self.missing.contains(&script.path) {
            Err(ScriptrunError::ScriptNotFound(script.path.clone()))
        } else {
            Ok(())
        }
    }

    fn dispatch(
        &mut self,
        request: ExecRequest,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        self.requests.lock().unwrap().push(request.clone());

        let mut events = Vec::new();
        match request {
            ExecRequest::Start(launch) => {
                let job = launch.job;
                let path = launch.script.path.clone();
                events.push(RuntimeEvent::JobStarted {
                    job,
                    pid: None,
                    program: PathBuf::from(&path),
                });
                events.push(RuntimeEvent::OutputLine {
                    job,
                    stream: OutputStream::Stdout,
                    line: format!("hello from {}", launch.script.label),
                });
                if !self.held.contains(&path) {
                    let code = self.exit_codes.get(&path).copied().unwrap_or(0);
                    events.push(RuntimeEvent::JobExited {
                        job,
                        outcome: ExitOutcome::Code(code),
                    });
                }
            }
            ExecRequest::Cancel { job, .. } => {
                events.push(RuntimeEvent::JobCancelled { job, forced: false });
            }
            ExecRequest::ProbeElevation => {
                events.push(RuntimeEvent::ElevationProbed {
                    authorized: self.session_valid,
                });
            }
        }

        let tx = self.runtime_tx.clone();
        Box::pin(async move {
            for event in events {
                tx.send(event).await.map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}
