// src/frontend/terminal.rs

//! Frontend for `scriptrun run`: output goes straight to stdout and prompts
//! run on Tokio's blocking pool.

use tokio::sync::mpsc;
use tracing::warn;

use crate::engine::{CredentialRequest, RuntimeEvent, SinkUpdate};
use crate::frontend::{Frontend, ask_confirm_shutdown, ask_credential, format_update};
use crate::sink::CONSOLE_TITLE;

pub struct TerminalFrontend {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
}

impl TerminalFrontend {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self { runtime_tx }
    }

    fn ask(&self, question: impl FnOnce() -> RuntimeEvent + Send + 'static) {
        let tx = self.runtime_tx.clone();
        tokio::task::spawn_blocking(move || {
            let answer = question();
            if tx.blocking_send(answer).is_err() {
                warn!("runtime stopped before the prompt was answered");
            }
        });
    }
}

impl Frontend for TerminalFrontend {
    fn render(&mut self, update: &SinkUpdate) {
        println!("{}", format_update(update, CONSOLE_TITLE));
    }

    fn present(&mut self, text: &str) {
        println!("{text}");
    }

    fn prompt_credential(&mut self, request: CredentialRequest) {
        self.ask(move || ask_credential(&request));
    }

    fn confirm_shutdown(&mut self, active: usize) {
        self.ask(move || ask_confirm_shutdown(active));
    }
}
