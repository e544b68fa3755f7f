use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use scriptrun::engine::{Credential, CredentialRequest, RuntimeEvent, SinkUpdate};
use scriptrun::frontend::Frontend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontendCall {
    Render(SinkUpdate),
    Present(String),
    PromptCredential(CredentialRequest),
    ConfirmShutdown(usize),
    Settle,
    Finish,
}

/// Frontend that records every call and answers prompts from a script.
pub struct RecordingFrontend {
    calls: Arc<Mutex<Vec<FrontendCall>>>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    /// `Some(secret)` submits, `None` cancels.
    credentials: VecDeque<Option<String>>,
    confirm_shutdown: Option<bool>,
}

impl RecordingFrontend {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            runtime_tx,
            credentials: VecDeque::new(),
            confirm_shutdown: None,
        }
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<FrontendCall>>> {
        Arc::clone(&self.calls)
    }

    /// Queue an answer for the next credential prompt.
    pub fn answer_credential(mut self, answer: Option<&str>) -> Self {
        self.credentials.push_back(answer.map(str::to_string));
        self
    }

    pub fn answer_shutdown(mut self, confirm: bool) -> Self {
        self.confirm_shutdown = Some(confirm);
        self
    }

    fn record(&self, call: FrontendCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn reply(&self, event: RuntimeEvent) {
        self.runtime_tx
            .try_send(event)
            .expect("runtime channel full or closed in test");
    }
}

impl Frontend for RecordingFrontend {
    fn render(&mut self, update: &SinkUpdate) {
        self.record(FrontendCall::Render(update.clone()));
    }

    fn present(&mut self, text: &str) {
        self.record(FrontendCall::Present(text.to_string()));
    }

    fn prompt_credential(&mut self, request: CredentialRequest) {
        self.record(FrontendCall::PromptCredential(request));
        match self.credentials.pop_front() {
            Some(Some(secret)) => self.reply(RuntimeEvent::CredentialSubmitted {
                credential: Credential::new(secret),
            }),
            Some(None) => self.reply(RuntimeEvent::CredentialCancelled),
            None => {}
        }
    }

    fn confirm_shutdown(&mut self, active: usize) {
        self.record(FrontendCall::ConfirmShutdown(active));
        match self.confirm_shutdown {
            Some(true) => self.reply(RuntimeEvent::ShutdownConfirmed),
            Some(false) => self.reply(RuntimeEvent::ShutdownAborted),
            None => {}
        }
    }

    fn settle(&mut self) {
        self.record(FrontendCall::Settle);
    }

    fn finish(&mut self) {
        self.record(FrontendCall::Finish);
    }
}

/// Lines rendered into tabs with this title, in order.
pub fn rendered_lines(calls: &[FrontendCall], title: &str) -> Vec<String> {
    calls
        .iter()
        .filter_map(|c| match c {
            FrontendCall::Render(u) if u.title == title => Some(u.line.clone()),
            _ => None,
        })
        .collect()
}
