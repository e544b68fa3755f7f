// src/sink/tabs.rs

//! Tab registry: an id-keyed arena of tabs plus a separate display order.
//!
//! Every lookup goes through [`TabId`]. The `order` vector only describes
//! where a tab is shown; moving or closing tabs never changes which sink a
//! given id refers to, nor which job is bound to it.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::config::ScriptDescriptor;
use crate::sink::{CONSOLE_TITLE, LogSink, SCRATCHPAD_TITLE};
use crate::types::{JobId, TabId, TabReusePolicy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabKind {
    Console,
    Scratchpad,
    Script { path: String },
}

impl TabKind {
    pub fn is_permanent(&self) -> bool {
        matches!(self, TabKind::Console | TabKind::Scratchpad)
    }
}

#[derive(Debug, Clone)]
pub struct Tab {
    pub id: TabId,
    pub title: String,
    pub kind: TabKind,
    pub sink: LogSink,
    /// The job currently writing into this tab, if any.
    live_job: Option<JobId>,
}

impl Tab {
    pub fn live_job(&self) -> Option<JobId> {
        self.live_job
    }

    /// True for script tabs whose last run has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        !self.kind.is_permanent() && self.live_job.is_none() && self.sink.status().is_terminal()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TabError {
    #[error("no tab {0}")]
    NotFound(TabId),
    #[error("tab {0} is permanent and cannot be closed")]
    Permanent(TabId),
    #[error("tab {tab} is still in use by job {job}")]
    Busy { tab: TabId, job: JobId },
}

/// Result of binding a job to a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabBinding {
    pub tab: TabId,
    /// True when an earlier, finished tab of the same script was reused.
    pub reused: bool,
}

#[derive(Debug)]
pub struct TabRegistry {
    tabs: HashMap<TabId, Tab>,
    order: Vec<TabId>,
    next_id: u64,
    console: TabId,
    scratchpad: TabId,
}

impl TabRegistry {
    /// A registry holding the permanent Console and Scratchpad tabs.
    pub fn new() -> Self {
        let mut registry = Self {
            tabs: HashMap::new(),
            order: Vec::new(),
            next_id: 0,
            console: TabId(0),
            scratchpad: TabId(0),
        };
        registry.console =
            registry.insert(CONSOLE_TITLE.to_string(), TabKind::Console, LogSink::new());
        registry.scratchpad =
            registry.insert(SCRATCHPAD_TITLE.to_string(), TabKind::Scratchpad, LogSink::editable());
        registry
    }

    pub fn console_id(&self) -> TabId {
        self.console
    }

    pub fn scratchpad_id(&self) -> TabId {
        self.scratchpad
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: TabId) -> Option<&Tab> {
        self.tabs.get(&id)
    }

    pub fn get_mut(&mut self, id: TabId) -> Option<&mut Tab> {
        self.tabs.get_mut(&id)
    }

    /// Current display position of a tab.
    pub fn position(&self, id: TabId) -> Option<usize> {
        self.order.iter().position(|t| *t == id)
    }

    /// Tabs in display order.
    pub fn ordered(&self) -> impl Iterator<Item = &Tab> {
        self.order.iter().filter_map(|id| self.tabs.get(id))
    }

    /// Find or create the tab a new job of `script` will write into, and bind
    /// the job to it.
    ///
    /// With [`TabReusePolicy::Reuse`], the first finished tab of the same
    /// script (in display order) is reused. A tab bound to a live job is
    /// never reused, so at most one job writes into any tab.
    pub fn open_for_job(
        &mut self,
        script: &ScriptDescriptor,
        job: JobId,
        policy: TabReusePolicy,
    ) -> TabBinding {
        let reusable = match policy {
            TabReusePolicy::Reuse => self
                .ordered()
                .find(|t| {
                    t.is_finished()
                        && matches!(&t.kind, TabKind::Script { path } if *path == script.path)
                })
                .map(|t| t.id),
            TabReusePolicy::New => None,
        };

        let (id, reused) = match reusable {
            Some(id) => (id, true),
            None => {
                let kind = TabKind::Script {
                    path: script.path.clone(),
                };
                (self.insert(script.label.clone(), kind, LogSink::new()), false)
            }
        };

        if let Some(tab) = self.tabs.get_mut(&id) {
            tab.live_job = Some(job);
            tab.sink.reopen();
        }
        debug!(tab = %id, job = %job, reused, "bound job to tab");

        TabBinding { tab: id, reused }
    }

    /// Unbind `job` from `tab`. Does nothing if another job (or none) is bound.
    pub fn release(&mut self, tab: TabId, job: JobId) -> bool {
        match self.tabs.get_mut(&tab) {
            Some(t) if t.live_job == Some(job) => {
                t.live_job = None;
                true
            }
            _ => false,
        }
    }

    /// Close a script tab that no live job is writing into.
    pub fn close(&mut self, id: TabId) -> Result<Tab, TabError> {
        let tab = self.tabs.get(&id).ok_or(TabError::NotFound(id))?;
        if tab.kind.is_permanent() {
            return Err(TabError::Permanent(id));
        }
        if let Some(job) = tab.live_job {
            return Err(TabError::Busy { tab: id, job });
        }

        self.order.retain(|t| *t != id);
        self.tabs.remove(&id).ok_or(TabError::NotFound(id))
    }

    /// Close every script tab whose run has finished. Returns the closed tabs
    /// in their former display order.
    pub fn close_finished(&mut self) -> Vec<Tab> {
        let finished: Vec<TabId> = self
            .ordered()
            .filter(|t| t.is_finished())
            .map(|t| t.id)
            .collect();

        finished
            .into_iter()
            .filter_map(|id| self.close(id).ok())
            .collect()
    }

    /// Move a tab to `index` in the display order (clamped to the end).
    /// Returns the position the tab ended up at.
    pub fn move_to(&mut self, id: TabId, index: usize) -> Result<usize, TabError> {
        let from = self.position(id).ok_or(TabError::NotFound(id))?;
        self.order.remove(from);
        let to = index.min(self.order.len());
        self.order.insert(to, id);
        Ok(to)
    }

    fn insert(&mut self, title: String, kind: TabKind, sink: LogSink) -> TabId {
        let id = TabId(self.next_id);
        self.next_id += 1;
        self.tabs.insert(
            id,
            Tab {
                id,
                title,
                kind,
                sink,
                live_job: None,
            },
        );
        self.order.push(id);
        id
    }
}

impl Default for TabRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ExitOutcome;
    use crate::sink::SinkStatus;

    fn script(path: &str) -> ScriptDescriptor {
        ScriptDescriptor {
            label: path.to_uppercase(),
            path: path.to_string(),
            needs_sudo: false,
            tags: Default::default(),
            description: String::new(),
        }
    }

    fn finish(reg: &mut TabRegistry, tab: TabId, job: JobId) {
        reg.release(tab, job);
        reg.get_mut(tab)
            .unwrap()
            .sink
            .finish(SinkStatus::Finished(ExitOutcome::Code(0)));
    }

    #[test]
    fn starts_with_permanent_tabs_that_cannot_be_closed() {
        let mut reg = TabRegistry::new();
        assert_eq!(reg.len(), 2);
        let console = reg.console_id();
        assert!(matches!(reg.close(console), Err(TabError::Permanent(id)) if id == console));
    }

    #[test]
    fn finished_tab_is_reused_but_live_tab_is_not() {
        let mut reg = TabRegistry::new();
        let a = script("a.sh");

        let first = reg.open_for_job(&a, JobId(1), TabReusePolicy::Reuse);
        assert!(!first.reused);

        // Still live: a second job must get its own tab.
        let second = reg.open_for_job(&a, JobId(2), TabReusePolicy::Reuse);
        assert_ne!(first.tab, second.tab);

        finish(&mut reg, first.tab, JobId(1));
        let third = reg.open_for_job(&a, JobId(3), TabReusePolicy::Reuse);
        assert_eq!(third, TabBinding { tab: first.tab, reused: true });
        assert_eq!(reg.get(first.tab).unwrap().live_job(), Some(JobId(3)));
    }

    #[test]
    fn new_policy_never_reuses() {
        let mut reg = TabRegistry::new();
        let a = script("a.sh");
        let first = reg.open_for_job(&a, JobId(1), TabReusePolicy::New);
        finish(&mut reg, first.tab, JobId(1));
        let second = reg.open_for_job(&a, JobId(2), TabReusePolicy::New);
        assert_ne!(first.tab, second.tab);
    }

    #[test]
    fn busy_tab_cannot_be_closed() {
        let mut reg = TabRegistry::new();
        let binding = reg.open_for_job(&script("a.sh"), JobId(7), TabReusePolicy::Reuse);
        assert_eq!(
            reg.close(binding.tab).unwrap_err(),
            TabError::Busy { tab: binding.tab, job: JobId(7) }
        );
    }

    #[test]
    fn stale_release_does_not_unbind_newer_job() {
        let mut reg = TabRegistry::new();
        let a = script("a.sh");
        let b = reg.open_for_job(&a, JobId(1), TabReusePolicy::Reuse);
        finish(&mut reg, b.tab, JobId(1));
        reg.open_for_job(&a, JobId(2), TabReusePolicy::Reuse);

        assert!(!reg.release(b.tab, JobId(1)));
        assert_eq!(reg.get(b.tab).unwrap().live_job(), Some(JobId(2)));
    }

    #[test]
    fn move_clamps_to_end() {
        let mut reg = TabRegistry::new();
        let console = reg.console_id();
        assert_eq!(reg.move_to(console, 99), Ok(1));
        assert_eq!(
            reg.ordered().map(|t| t.id).collect::<Vec<_>>(),
            vec![reg.scratchpad_id(), console]
        );
    }
}
