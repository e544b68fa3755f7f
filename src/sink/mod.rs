// src/sink/mod.rs

//! Log sinks and the tab registry that owns them.
//!
//! - [`LogSink`] is an append-only list of lines plus a status flag.
//! - [`tabs`] maps stable tab ids to sinks and to the job (if any) currently
//!   writing into them.

pub mod tabs;

pub use tabs::{Tab, TabBinding, TabError, TabKind, TabRegistry};

use crate::engine::ExitOutcome;

/// Title of the permanent tab receiving application messages.
pub const CONSOLE_TITLE: &str = "Console";
/// Title of the permanent, user-editable notes tab.
pub const SCRATCHPAD_TITLE: &str = "Scratchpad";

/// Line that frames each run inside a tab.
pub const SEPARATOR: &str = "##################################################";

/// Lifecycle state of a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkStatus {
    /// Accepting output (or permanent sink).
    Open,
    /// The process behind the sink exited on its own.
    Finished(ExitOutcome),
    /// The job was cancelled, either while queued or while running.
    Cancelled,
    /// The process could not be started.
    LaunchFailed,
}

impl SinkStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SinkStatus::Open)
    }
}

#[derive(Debug, Clone)]
pub struct LogSink {
    lines: Vec<String>,
    status: SinkStatus,
    editable: bool,
}

impl LogSink {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            status: SinkStatus::Open,
            editable: false,
        }
    }

    /// A sink the user may edit directly (the scratchpad).
    pub fn editable() -> Self {
        Self {
            editable: true,
            ..Self::new()
        }
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    pub fn status(&self) -> SinkStatus {
        self.status
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.trim().is_empty())
    }

    /// Append text, splitting on embedded newlines. Returns the lines added.
    pub fn append(&mut self, text: &str) -> Vec<String> {
        let added: Vec<String> = text
            .split('\n')
            .map(|l| l.trim_end_matches('\r').to_string())
            .collect();
        self.lines.extend(added.iter().cloned());
        added
    }

    pub fn finish(&mut self, status: SinkStatus) {
        self.status = status;
    }

    /// Mark the sink as accepting output again (tab reuse).
    pub fn reopen(&mut self) {
        self.status = SinkStatus::Open;
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Full contents, trimmed of surrounding blank lines.
    pub fn text(&self) -> String {
        self.lines.join("\n").trim().to_string()
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_splits_lines_and_strips_carriage_returns() {
        let mut sink = LogSink::new();
        let added = sink.append("one\r\ntwo");
        assert_eq!(added, vec!["one", "two"]);
        assert_eq!(sink.lines(), &["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn whitespace_only_sink_counts_as_empty() {
        let mut sink = LogSink::new();
        sink.append("");
        sink.append("   ");
        assert!(sink.is_empty());
        assert_eq!(sink.text(), "");
    }

    #[test]
    fn finish_then_reopen() {
        let mut sink = LogSink::new();
        sink.finish(SinkStatus::Cancelled);
        assert!(sink.status().is_terminal());
        sink.reopen();
        assert_eq!(sink.status(), SinkStatus::Open);
    }
}
