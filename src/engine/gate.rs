// src/engine/gate.rs

use std::collections::{BTreeSet, VecDeque};

use tracing::{debug, warn};

use crate::types::{JobId, clamp_limit};

/// Result of asking the gate for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// Waiting; `position` is 1-based within the FIFO queue.
    Queued { position: usize },
}

/// Caps the number of simultaneously running jobs.
///
/// Semantics:
/// - `request_admission` admits while `running < limit`, otherwise appends
///   the job to a FIFO queue. Admission never fails, it can only be delayed.
/// - `release` frees a slot and admits queued jobs in FIFO order for as long
///   as the limit allows.
/// - `set_limit` never touches running jobs, even when the new limit is
///   below the current running count; it simply stops admitting until enough
///   jobs have finished. Raising the limit is an admission check and may
///   admit queued jobs right away.
#[derive(Debug)]
pub struct ConcurrencyGate {
    limit: usize,
    running: BTreeSet<JobId>,
    queue: VecDeque<JobId>,
}

impl ConcurrencyGate {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: clamp_limit(limit),
            running: BTreeSet::new(),
            queue: VecDeque::new(),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    pub fn is_running(&self, job: JobId) -> bool {
        self.running.contains(&job)
    }

    pub fn is_queued(&self, job: JobId) -> bool {
        self.queue.contains(&job)
    }

    pub fn is_idle(&self) -> bool {
        self.running.is_empty() && self.queue.is_empty()
    }

    pub fn request_admission(&mut self, job: JobId) -> Admission {
        if self.running.contains(&job) {
            return Admission::Admitted;
        }
        if let Some(idx) = self.queue.iter().position(|j| *j == job) {
            return Admission::Queued { position: idx + 1 };
        }

        if self.queue.is_empty() && self.running.len() < self.limit {
            self.running.insert(job);
            debug!(job = %job, running = self.running.len(), limit = self.limit, "admitted");
            Admission::Admitted
        } else {
            self.queue.push_back(job);
            debug!(job = %job, queued = self.queue.len(), limit = self.limit, "queued");
            Admission::Queued {
                position: self.queue.len(),
            }
        }
    }

    /// Free the slot held by `job` and return the jobs admitted as a result.
    ///
    /// Releasing a job that is not running is a no-op apart from pumping the
    /// queue.
    pub fn release(&mut self, job: JobId) -> Vec<JobId> {
        if !self.running.remove(&job) {
            debug!(job = %job, "release for job without a slot");
        }
        self.admit_waiting()
    }

    /// Remove a queued job without ever admitting it.
    pub fn withdraw(&mut self, job: JobId) -> bool {
        let before = self.queue.len();
        self.queue.retain(|j| *j != job);
        before != self.queue.len()
    }

    /// Change the limit. Returns jobs admitted immediately by a raise.
    pub fn set_limit(&mut self, limit: usize) -> Vec<JobId> {
        let clamped = clamp_limit(limit);
        if clamped != limit {
            warn!(requested = limit, applied = clamped, "concurrency limit clamped");
        }
        self.limit = clamped;
        self.admit_waiting()
    }

    fn admit_waiting(&mut self) -> Vec<JobId> {
        let mut admitted = Vec::new();
        while self.running.len() < self.limit {
            let Some(next) = self.queue.pop_front() else {
                break;
            };
            self.running.insert(next);
            debug!(job = %next, running = self.running.len(), "admitted from queue");
            admitted.push(next);
        }
        admitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_limit_then_queues_fifo() {
        let mut gate = ConcurrencyGate::new(2);
        assert_eq!(gate.request_admission(JobId(1)), Admission::Admitted);
        assert_eq!(gate.request_admission(JobId(2)), Admission::Admitted);
        assert_eq!(gate.request_admission(JobId(3)), Admission::Queued { position: 1 });
        assert_eq!(gate.request_admission(JobId(4)), Admission::Queued { position: 2 });

        assert_eq!(gate.release(JobId(1)), vec![JobId(3)]);
        assert_eq!(gate.release(JobId(2)), vec![JobId(4)]);
        assert_eq!(gate.running_count(), 2);
        assert_eq!(gate.queued_count(), 0);
    }

    #[test]
    fn lowering_limit_keeps_running_jobs() {
        let mut gate = ConcurrencyGate::new(3);
        for i in 1..=3 {
            gate.request_admission(JobId(i));
        }
        gate.request_admission(JobId(4));

        assert!(gate.set_limit(1).is_empty());
        assert_eq!(gate.running_count(), 3);

        // Two releases only bring us down to the new limit.
        assert!(gate.release(JobId(1)).is_empty());
        assert!(gate.release(JobId(2)).is_empty());
        assert_eq!(gate.release(JobId(3)), vec![JobId(4)]);
    }

    #[test]
    fn raising_limit_admits_waiting_jobs() {
        let mut gate = ConcurrencyGate::new(1);
        gate.request_admission(JobId(1));
        gate.request_admission(JobId(2));
        gate.request_admission(JobId(3));
        assert_eq!(gate.set_limit(3), vec![JobId(2), JobId(3)]);
    }

    #[test]
    fn withdrawn_job_is_never_admitted() {
        let mut gate = ConcurrencyGate::new(1);
        gate.request_admission(JobId(1));
        gate.request_admission(JobId(2));
        assert!(gate.withdraw(JobId(2)));
        assert!(gate.release(JobId(1)).is_empty());
        assert!(gate.is_idle());
    }

    #[test]
    fn limit_is_clamped() {
        let mut gate = ConcurrencyGate::new(0);
        assert_eq!(gate.limit(), 1);
        gate.set_limit(50);
        assert_eq!(gate.limit(), 20);
    }
}
