// src/report.rs

//! Plain-text answers to read-only queries.

use std::fmt::Write as _;

use crate::catalog::ScriptCatalog;
use crate::engine::CoreRuntime;
use crate::sink::{SinkStatus, Tab, TabKind};
use crate::types::TabId;

pub const HELP: &str = "\
commands:
  run <label|path>           launch a script
  cancel <job>               cancel a queued or running job (e.g. cancel #3)
  limit <n>                  set max concurrent scripts (1-20)
  jobs                       list active jobs
  tabs                       list tabs in display order
  show <tab>                 print a tab's contents (e.g. show t2)
  move <tab> <index>         move a tab in the tab strip
  close <tab>                close a tab that has no running job
  close-finished             close every finished script tab
  clear <tab>                clear a tab's contents
  note <text>                append a line to the scratchpad
  save <tab> <file>          write a tab's contents to a file
  scripts [--tag t] [text]   list scripts, optionally filtered
  help                       show this help
  quit                       cancel everything and exit";

/// Active jobs plus gate occupancy.
pub fn jobs_report(core: &CoreRuntime) -> String {
    let gate = core.gate();
    let mut out = format!(
        "running {}/{} (queued {})",
        gate.running_count(),
        gate.limit(),
        gate.queued_count()
    );
    for job in core.jobs().active() {
        let title = core
            .tabs()
            .get(job.tab)
            .map(|t| t.title.as_str())
            .unwrap_or("?");
        let _ = write!(
            out,
            "\n  {:<5} {:<18} {} -> {} ({})",
            job.id.to_string(),
            job.status.to_string(),
            job.script.label,
            job.tab,
            title
        );
        if job.cancelling {
            out.push_str(" [cancelling]");
        }
    }
    out
}

pub fn tabs_report(core: &CoreRuntime) -> String {
    let mut out = String::new();
    for (index, tab) in core.tabs().ordered().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        let _ = write!(
            out,
            "{index:>2}. {:<4} {} ({})",
            tab.id.to_string(),
            tab.title,
            tab_state(tab)
        );
    }
    out
}

fn tab_state(tab: &Tab) -> String {
    match (&tab.kind, tab.live_job()) {
        (TabKind::Console | TabKind::Scratchpad, _) => "permanent".to_string(),
        (_, Some(job)) => format!("job {job}"),
        (_, None) => match tab.sink.status() {
            SinkStatus::Open => "idle".to_string(),
            SinkStatus::Finished(outcome) if outcome.success() => "done".to_string(),
            SinkStatus::Finished(outcome) => format!("failed ({outcome})"),
            SinkStatus::Cancelled => "cancelled".to_string(),
            SinkStatus::LaunchFailed => "launch failed".to_string(),
        },
    }
}

pub fn show_tab(core: &CoreRuntime, tab: TabId) -> Option<String> {
    core.tabs().get(tab).map(|t| {
        let mut out = format!("== {} ({}) ==", t.title, t.id);
        for line in t.sink.lines() {
            out.push('\n');
            out.push_str(line);
        }
        out
    })
}

pub fn scripts_report(catalog: &ScriptCatalog, search: Option<&str>, tag: Option<&str>) -> String {
    let mut out = String::new();
    for script in catalog.filter(search, tag) {
        if !out.is_empty() {
            out.push('\n');
        }
        let _ = write!(out, "{:<24} {}", script.label, script.path);
        if script.needs_sudo {
            out.push_str("  [sudo]");
        }
        if !script.tags.is_empty() {
            let tags: Vec<&str> = script.tags.iter().map(String::as_str).collect();
            let _ = write!(out, "  #{}", tags.join(" #"));
        }
        if !script.description.is_empty() {
            let _ = write!(out, "\n    {}", script.description);
        }
    }
    if out.is_empty() {
        out.push_str("no matching scripts");
    }
    out
}
