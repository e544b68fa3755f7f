// src/engine/runtime.rs

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::core::ShutdownPhase;
use crate::errors::Result;
use crate::exec::{ExecRequest, ExecutorBackend};
use crate::frontend::Frontend;
use crate::report;
use crate::types::TabId;

use super::core::CoreRuntime;
use super::{CoreCommand, JobStatus, Query, RuntimeEvent};

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// How the session's jobs ended, for the process exit code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    /// Non-zero exits, signals, cancellations and launch failures.
    pub failed: usize,
    /// Launch requests refused before a job existed.
    pub rejected: usize,
}

impl RunSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.rejected == 0
    }
}

/// Drives the core in response to `RuntimeEvent`s, delegating process work
/// to an `ExecutorBackend` and user interaction to a `Frontend`.
///
/// This is a pure IO shell around `CoreRuntime`, which contains all the
/// runtime semantics. This struct handles async IO: reading events from
/// channels, dispatching requests to the executor and answering queries.
pub struct Runtime<E: ExecutorBackend, F: Frontend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    frontend: F,
    shutdown_timeout: Duration,
    /// Events produced by the shell itself, handled before new input.
    follow_ups: VecDeque<RuntimeEvent>,
    /// A user request has been received and not yet settled.
    ack_owed: bool,
    rejected: usize,
}

impl<E: ExecutorBackend, F: Frontend> fmt::Debug for Runtime<E, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("ack_owed", &self.ack_owed)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend, F: Frontend> Runtime<E, F> {
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        executor: E,
        frontend: F,
    ) -> Self {
        Self {
            core,
            event_rx,
            executor,
            frontend,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            follow_ups: VecDeque::new(),
            ack_owed: false,
            rejected: 0,
        }
    }

    /// Upper bound on waiting for workers once the loop has stopped.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Main event loop.
    ///
    /// - Consumes `RuntimeEvent`s from `event_rx`.
    /// - Feeds them into the core runtime.
    /// - Executes commands returned by the core (start processes, prompt,
    ///   render, exit).
    pub async fn run(mut self) -> Result<RunSummary> {
        info!("scriptrun runtime started");

        loop {
            let event = match self.follow_ups.pop_front() {
                Some(e) => e,
                None => match self.event_rx.recv().await {
                    Some(e) => e,
                    None => {
                        info!("runtime event channel closed; exiting");
                        break;
                    }
                },
            };

            debug!(?event, "runtime received event");
            if event.is_interactive() {
                self.ack_owed = true;
            }

            let event = self.prepare(event).await;

            // Feed the event into the pure core and get commands back.
            let step = self.core.step(event);

            for command in step.commands {
                self.execute_command(command).await;
            }

            if !step.keep_running {
                info!("core requested exit; stopping runtime");
                break;
            }

            self.settle_if_done();
        }

        self.frontend.finish();
        self.executor.shutdown(self.shutdown_timeout).await?;

        let summary = self.summary();
        info!(?summary, "runtime exiting");
        Ok(summary)
    }

    /// Work the core cannot do: file checks before a launch and answers to
    /// read-only queries.
    async fn prepare(&mut self, event: RuntimeEvent) -> RuntimeEvent {
        match event {
            RuntimeEvent::LaunchRequested { script } => {
                let Some(descriptor) = self.core.catalog().find(&script) else {
                    self.rejected += 1;
                    return RuntimeEvent::LaunchRequested { script };
                };
                match self.executor.preflight(descriptor) {
                    Ok(()) => RuntimeEvent::LaunchRequested { script },
                    Err(err) => {
                        self.rejected += 1;
                        RuntimeEvent::LaunchRejected {
                            script,
                            reason: err.to_string(),
                        }
                    }
                }
            }
            RuntimeEvent::Query(query) => {
                self.answer(&query).await;
                RuntimeEvent::Query(query)
            }
            other => other,
        }
    }

    async fn answer(&mut self, query: &Query) {
        match query {
            Query::Jobs => self.frontend.present(&report::jobs_report(&self.core)),
            Query::Tabs => self.frontend.present(&report::tabs_report(&self.core)),
            Query::Show { tab } => match report::show_tab(&self.core, *tab) {
                Some(text) => self.frontend.present(&text),
                None => self.console(&format!("[WARN] No tab {tab}")).await,
            },
            Query::Scripts { search, tag } => {
                let text =
                    report::scripts_report(self.core.catalog(), search.as_deref(), tag.as_deref());
                self.frontend.present(&text);
            }
            Query::Save { tab, path } => self.save_tab(*tab, path).await,
            Query::Help => self.frontend.present(report::HELP),
        }
    }

    async fn save_tab(&mut self, tab: TabId, path: &std::path::Path) {
        let contents = self
            .core
            .tabs()
            .get(tab)
            .map(|t| (!t.sink.is_empty()).then(|| format!("{}\n", t.sink.text())));
        let text = match contents {
            None => {
                self.console(&format!("[WARN] No tab {tab}")).await;
                return;
            }
            Some(None) => {
                self.console("[INFO] Current tab is empty; nothing to save.").await;
                return;
            }
            Some(Some(text)) => text,
        };

        let message = match tokio::fs::write(path, text).await {
            Ok(()) => {
                info!(tab = %tab, path = %path.display(), "tab saved");
                format!("[INFO] Tab saved to: {}", path.display())
            }
            Err(e) => {
                warn!(tab = %tab, path = %path.display(), error = %e, "saving tab failed");
                format!("[ERROR] Failed to save: {e}")
            }
        };
        self.console(&message).await;
    }

    async fn console(&mut self, message: &str) {
        for command in self.core.log_console(message) {
            self.execute_command(command).await;
        }
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) {
        match command {
            CoreCommand::Execute(request) => self.dispatch(request).await,
            CoreCommand::PromptCredential(request) => {
                self.ack_owed = false;
                self.frontend.prompt_credential(request);
            }
            CoreCommand::ConfirmShutdown { active } => {
                self.ack_owed = false;
                self.frontend.confirm_shutdown(active);
            }
            CoreCommand::Render(update) => self.frontend.render(&update),
            CoreCommand::RequestExit => {
                info!("core issued RequestExit command");
            }
        }
    }

    async fn dispatch(&mut self, request: ExecRequest) {
        let fallback = match &request {
            ExecRequest::Start(launch) => Some(RuntimeEvent::JobLaunchFailed {
                job: launch.job,
                error: "executor unavailable".to_string(),
            }),
            ExecRequest::ProbeElevation => {
                Some(RuntimeEvent::ElevationProbed { authorized: false })
            }
            ExecRequest::Cancel { .. } => None,
        };

        if let Err(e) = self.executor.dispatch(request).await {
            warn!(error = %e, "executor rejected request");
            if let Some(event) = fallback {
                self.follow_ups.push_back(event);
            }
        }
    }

    /// Tell the frontend it may take the next command once nothing is
    /// waiting on the user.
    fn settle_if_done(&mut self) {
        if self.ack_owed
            && self.follow_ups.is_empty()
            && !self.core.interaction_pending()
            && self.core.shutdown_phase() != ShutdownPhase::Draining
        {
            self.ack_owed = false;
            self.frontend.settle();
        }
    }

    fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            rejected: self.rejected,
            ..RunSummary::default()
        };
        for (_, status) in self.core.jobs().finished_statuses() {
            match status {
                JobStatus::Finished(outcome) if outcome.success() => summary.succeeded += 1,
                _ => summary.failed += 1,
            }
        }
        summary
    }
}
