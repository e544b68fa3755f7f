// src/engine/jobs.rs

//! Active-jobs table.

use std::collections::{BTreeMap, HashMap};

use crate::config::ScriptDescriptor;
use crate::engine::{Elevation, JobStatus};
use crate::types::{JobId, TabId};

/// One launch of a script.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub script: ScriptDescriptor,
    pub tab: TabId,
    pub status: JobStatus,
    /// Held until the job is dispatched, then dropped.
    pub elevation: Elevation,
    pub pid: Option<u32>,
    /// A cancel request has been sent to the worker.
    pub cancelling: bool,
}

/// Jobs that have not reached a terminal state, plus the terminal status of
/// every job removed this session.
#[derive(Debug, Default)]
pub struct JobTable {
    active: BTreeMap<JobId, Job>,
    finished: HashMap<JobId, JobStatus>,
    next_id: u64,
}

impl JobTable {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Self::default()
        }
    }

    pub fn allocate_id(&mut self) -> JobId {
        let id = JobId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        id
    }

    pub fn insert(&mut self, job: Job) {
        self.active.insert(job.id, job);
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.active.get(&id)
    }

    pub fn get_mut(&mut self, id: JobId) -> Option<&mut Job> {
        self.active.get_mut(&id)
    }

    /// Remove an active job, remembering its terminal status.
    pub fn retire(&mut self, id: JobId, status: JobStatus) -> Option<Job> {
        let mut job = self.active.remove(&id)?;
        job.status = status;
        job.elevation = Elevation::None;
        self.finished.insert(id, status);
        Some(job)
    }

    pub fn status(&self, id: JobId) -> Option<JobStatus> {
        self.active
            .get(&id)
            .map(|j| j.status)
            .or_else(|| self.finished.get(&id).copied())
    }

    pub fn active(&self) -> impl Iterator<Item = &Job> {
        self.active.values()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn running_count(&self) -> usize {
        self.active
            .values()
            .filter(|j| j.status == JobStatus::Running)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// The live job for a script path, if any.
    pub fn live_for_script(&self, path: &str) -> Option<&Job> {
        self.active.values().find(|j| j.script.path == path)
    }

    pub fn finished_statuses(&self) -> impl Iterator<Item = (JobId, JobStatus)> + '_ {
        self.finished.iter().map(|(id, s)| (*id, *s))
    }
}
