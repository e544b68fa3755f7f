// src/frontend/repl.rs

//! Interactive shell.
//!
//! A dedicated input thread reads one command at a time and forwards it to
//! the runtime. After each command it waits for an [`Ack`]: either "ready
//! for the next command", or a prompt the runtime wants answered first.
//! Output from running scripts is printed by the runtime as it arrives.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc as std_mpsc;
use std::thread;

use tokio::sync::mpsc;
use tracing::debug;

use crate::engine::{CredentialRequest, Query, RuntimeEvent, SinkUpdate};
use crate::frontend::{Frontend, ask_confirm_shutdown, ask_credential, format_update};
use crate::sink::CONSOLE_TITLE;
use crate::types::{JobId, TabId};

const PROMPT: &str = "scriptrun> ";

/// Message from the runtime to the input thread.
#[derive(Debug)]
pub enum Ack {
    Ready,
    Credential(CredentialRequest),
    ConfirmShutdown { active: usize },
    Exit,
}

pub struct ReplFrontend {
    acks: std_mpsc::Sender<Ack>,
}

impl ReplFrontend {
    /// Start the input thread reading from stdin.
    pub fn spawn(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
    ) -> io::Result<(Self, thread::JoinHandle<()>)> {
        let (ack_tx, ack_rx) = std_mpsc::channel();
        let handle = thread::Builder::new()
            .name("scriptrun-input".to_string())
            .spawn(move || {
                let stdin = io::stdin();
                input_loop(stdin.lock(), &runtime_tx, &ack_rx);
            })?;
        Ok((Self { acks: ack_tx }, handle))
    }

    fn send(&self, ack: Ack) {
        if self.acks.send(ack).is_err() {
            debug!("input thread is gone");
        }
    }
}

impl Frontend for ReplFrontend {
    fn render(&mut self, update: &SinkUpdate) {
        println!("{}", format_update(update, CONSOLE_TITLE));
    }

    fn present(&mut self, text: &str) {
        println!("{text}");
    }

    fn prompt_credential(&mut self, request: CredentialRequest) {
        self.send(Ack::Credential(request));
    }

    fn confirm_shutdown(&mut self, active: usize) {
        self.send(Ack::ConfirmShutdown { active });
    }

    fn settle(&mut self) {
        self.send(Ack::Ready);
    }

    fn finish(&mut self) {
        self.send(Ack::Exit);
    }
}

fn input_loop(
    mut input: impl BufRead,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
    acks: &std_mpsc::Receiver<Ack>,
) {
    let mut line = String::new();
    loop {
        print!("{PROMPT}");
        let _ = io::stdout().flush();

        line.clear();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => {
                let _ = runtime_tx.blocking_send(RuntimeEvent::InputClosed);
                return;
            }
            Ok(_) => {}
        }

        let event = match parse_command(&line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(msg) => {
                eprintln!("{msg}");
                continue;
            }
        };

        if runtime_tx.blocking_send(event).is_err() {
            return;
        }
        if !await_ready(runtime_tx, acks) {
            return;
        }
    }
}

/// Serve prompts until the runtime says it is ready for the next command.
/// Returns `false` when the shell should stop reading.
fn await_ready(runtime_tx: &mpsc::Sender<RuntimeEvent>, acks: &std_mpsc::Receiver<Ack>) -> bool {
    loop {
        let answer = match acks.recv() {
            Ok(Ack::Ready) => return true,
            Ok(Ack::Exit) | Err(_) => return false,
            Ok(Ack::Credential(request)) => ask_credential(&request),
            Ok(Ack::ConfirmShutdown { active }) => ask_confirm_shutdown(active),
        };
        if runtime_tx.blocking_send(answer).is_err() {
            return false;
        }
    }
}

/// Parse one shell line. `Ok(None)` for blank lines.
pub fn parse_command(line: &str) -> Result<Option<RuntimeEvent>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (cmd, rest) = match line.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (line, ""),
    };

    let event = match cmd {
        "run" => RuntimeEvent::LaunchRequested {
            script: required(rest, "usage: run <label or path>")?.to_string(),
        },
        "cancel" => RuntimeEvent::CancelRequested {
            job: required(rest, "usage: cancel <job>")?.parse::<JobId>()?,
        },
        "limit" => {
            let limit = required(rest, "usage: limit <n>")?
                .parse::<usize>()
                .map_err(|_| format!("invalid limit: {rest}"))?;
            RuntimeEvent::LimitChanged { limit }
        }
        "jobs" => RuntimeEvent::Query(Query::Jobs),
        "tabs" => RuntimeEvent::Query(Query::Tabs),
        "help" | "?" => RuntimeEvent::Query(Query::Help),
        "show" => RuntimeEvent::Query(Query::Show {
            tab: required(rest, "usage: show <tab>")?.parse::<TabId>()?,
        }),
        "move" => {
            let (tab, index) = required(rest, "usage: move <tab> <index>")?
                .split_once(char::is_whitespace)
                .ok_or("usage: move <tab> <index>")?;
            RuntimeEvent::TabMoved {
                tab: tab.parse::<TabId>()?,
                index: index
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| format!("invalid index: {index}"))?,
            }
        }
        "close" => RuntimeEvent::TabClosed {
            tab: required(rest, "usage: close <tab>")?.parse::<TabId>()?,
        },
        "close-finished" => RuntimeEvent::FinishedTabsClosed,
        "clear" => RuntimeEvent::TabCleared {
            tab: required(rest, "usage: clear <tab>")?.parse::<TabId>()?,
        },
        "note" => RuntimeEvent::ScratchpadNote {
            text: rest.to_string(),
        },
        "save" => {
            let (tab, path) = required(rest, "usage: save <tab> <file>")?
                .split_once(char::is_whitespace)
                .ok_or("usage: save <tab> <file>")?;
            RuntimeEvent::Query(Query::Save {
                tab: tab.parse::<TabId>()?,
                path: PathBuf::from(path.trim()),
            })
        }
        "scripts" => parse_scripts_query(rest)?,
        "quit" | "exit" => RuntimeEvent::ShutdownRequested { confirmed: false },
        other => return Err(format!("unknown command: {other} (try \"help\")")),
    };

    Ok(Some(event))
}

fn required<'a>(rest: &'a str, usage: &str) -> Result<&'a str, String> {
    if rest.is_empty() {
        Err(usage.to_string())
    } else {
        Ok(rest)
    }
}

/// `scripts [--tag <tag>] [search words]`
fn parse_scripts_query(rest: &str) -> Result<RuntimeEvent, String> {
    let mut tag = None;
    let mut words = Vec::new();
    let mut parts = rest.split_whitespace();
    while let Some(part) = parts.next() {
        if part == "--tag" {
            tag = Some(parts.next().ok_or("usage: scripts [--tag <tag>] [search]")?.to_string());
        } else {
            words.push(part);
        }
    }
    let search = (!words.is_empty()).then(|| words.join(" "));
    Ok(RuntimeEvent::Query(Query::Scripts { search, tag }))
}
