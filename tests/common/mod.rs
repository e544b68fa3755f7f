#![allow(dead_code)]

use scriptrun::engine::{CoreCommand, CoreRuntime, CoreStep, CredentialRequest, Elevation};
use scriptrun::exec::ExecRequest;
use scriptrun::types::{JobId, TabId};

/// Jobs the step asked the executor to start, with their elevation.
pub fn started(step: &CoreStep) -> Vec<(JobId, Elevation)> {
    step.commands
        .iter()
        .filter_map(|c| match c {
            CoreCommand::Execute(ExecRequest::Start(l)) => Some((l.job, l.elevation.clone())),
            _ => None,
        })
        .collect()
}

pub fn started_ids(step: &CoreStep) -> Vec<JobId> {
    started(step).into_iter().map(|(id, _)| id).collect()
}

pub fn cancels(step: &CoreStep) -> Vec<JobId> {
    step.commands
        .iter()
        .filter_map(|c| match c {
            CoreCommand::Execute(ExecRequest::Cancel { job, .. }) => Some(*job),
            _ => None,
        })
        .collect()
}

pub fn probes(step: &CoreStep) -> usize {
    step.commands
        .iter()
        .filter(|c| matches!(c, CoreCommand::Execute(ExecRequest::ProbeElevation)))
        .count()
}

pub fn prompt(step: &CoreStep) -> Option<CredentialRequest> {
    step.commands.iter().find_map(|c| match c {
        CoreCommand::PromptCredential(r) => Some(r.clone()),
        _ => None,
    })
}

pub fn tab_lines(core: &CoreRuntime, tab: TabId) -> Vec<String> {
    core.tabs()
        .get(tab)
        .map(|t| t.sink.lines().to_vec())
        .unwrap_or_default()
}

pub fn console_lines(core: &CoreRuntime) -> Vec<String> {
    tab_lines(core, core.tabs().console_id())
}

pub fn tab_of(core: &CoreRuntime, job: JobId) -> TabId {
    core.jobs()
        .get(job)
        .map(|j| j.tab)
        .expect("job should be active")
}
