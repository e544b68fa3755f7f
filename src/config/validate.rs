// src/config/validate.rs

use std::collections::{BTreeSet, HashSet};

use tracing::warn;

use crate::config::model::{
    RawScriptDescriptor, RawSettingsFile, RunnerSettings, ScriptDescriptor, parse_duration,
};
use crate::errors::{Result, ScriptrunError};
use crate::types::{MAX_CONCURRENT, MIN_CONCURRENT};

impl TryFrom<RawSettingsFile> for RunnerSettings {
    type Error = ScriptrunError;

    fn try_from(raw: RawSettingsFile) -> std::result::Result<Self, Self::Error> {
        let r = raw.runner;

        if !(MIN_CONCURRENT..=MAX_CONCURRENT).contains(&r.max_concurrent) {
            return Err(ScriptrunError::ConfigError(format!(
                "[runner].max_concurrent must be between {MIN_CONCURRENT} and \
                 {MAX_CONCURRENT} (got {})",
                r.max_concurrent
            )));
        }

        let cancel_grace_period = parse_duration(&r.cancel_grace_period).ok_or_else(|| {
            ScriptrunError::ConfigError(format!(
                "[runner].cancel_grace_period is not a valid duration: {:?}",
                r.cancel_grace_period
            ))
        })?;

        let shutdown_timeout = parse_duration(&r.shutdown_timeout).ok_or_else(|| {
            ScriptrunError::ConfigError(format!(
                "[runner].shutdown_timeout is not a valid duration: {:?}",
                r.shutdown_timeout
            ))
        })?;

        if r.elevation_program.trim().is_empty() {
            return Err(ScriptrunError::ConfigError(
                "[runner].elevation_program must not be empty".to_string(),
            ));
        }

        Ok(RunnerSettings {
            max_concurrent: r.max_concurrent,
            cancel_grace_period,
            shutdown_timeout,
            tab_reuse: r.tab_reuse,
            allow_duplicate_runs: r.allow_duplicate_runs,
            cache_credential: r.cache_credential,
            elevation_program: r.elevation_program,
        })
    }
}

/// Validate the raw script list and turn it into typed descriptors.
///
/// Rejects empty labels/paths and duplicate paths (the path is a script's
/// identity). Duplicate labels are allowed but logged, since label lookups
/// then resolve to the first entry.
pub fn validate_scripts(raw: Vec<RawScriptDescriptor>) -> Result<Vec<ScriptDescriptor>> {
    let mut seen_paths: HashSet<String> = HashSet::new();
    let mut seen_labels: HashSet<String> = HashSet::new();
    let mut scripts = Vec::with_capacity(raw.len());

    for (index, entry) in raw.into_iter().enumerate() {
        let label = entry.label.trim().to_string();
        let path = entry.path.trim().to_string();

        if label.is_empty() {
            return Err(ScriptrunError::ConfigError(format!(
                "script #{index} has an empty `label`"
            )));
        }
        if path.is_empty() {
            return Err(ScriptrunError::ConfigError(format!(
                "script '{label}' has an empty `path`"
            )));
        }
        if !seen_paths.insert(path.clone()) {
            return Err(ScriptrunError::ConfigError(format!(
                "script path '{path}' is listed more than once"
            )));
        }
        if !seen_labels.insert(label.to_lowercase()) {
            warn!(
                label = %label,
                path = %path,
                "duplicate script label; lookups by label use the first entry"
            );
        }

        let tags: BTreeSet<String> = entry
            .tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        scripts.push(ScriptDescriptor {
            label,
            path,
            needs_sudo: entry.needs_sudo,
            tags,
            description: entry.description,
        });
    }

    Ok(scripts)
}
