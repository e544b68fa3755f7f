// src/config/model.rs

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{DEFAULT_MAX_CONCURRENT, TabReusePolicy};

/// One entry of the script list as read from JSON.
///
/// ```json
/// [
///   {
///     "label": "Update packages",
///     "path": "scripts/update.sh",
///     "needs_sudo": true,
///     "tags": ["system", "apt"],
///     "description": "apt update && apt upgrade"
///   }
/// ]
/// ```
///
/// Only `label` and `path` are mandatory.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawScriptDescriptor {
    pub label: String,
    pub path: String,
    #[serde(default)]
    pub needs_sudo: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: String,
}

/// A validated script descriptor. Read-only after load.
///
/// `path` is kept exactly as written in the configuration; it is resolved
/// against the application root only when the script is launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptDescriptor {
    pub label: String,
    pub path: String,
    pub needs_sudo: bool,
    pub tags: BTreeSet<String>,
    pub description: String,
}

impl ScriptDescriptor {
    /// Short display name used in summary lines (`[DONE] backup.sh`).
    pub fn file_name(&self) -> &str {
        self.path
            .rsplit(['/', '\\'])
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.path)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// Settings file as read from TOML.
///
/// ```toml
/// [runner]
/// max_concurrent = 5
/// cancel_grace_period = "3s"
/// shutdown_timeout = "5s"
/// tab_reuse = "reuse"
/// allow_duplicate_runs = false
/// cache_credential = true
/// elevation_program = "sudo"
/// ```
///
/// The file and every key in it are optional.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawSettingsFile {
    #[serde(default)]
    pub runner: RunnerSection,
}

/// `[runner]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerSection {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Time between SIGTERM and SIGKILL when cancelling a job.
    #[serde(default = "default_cancel_grace_period")]
    pub cancel_grace_period: String,

    /// Upper bound on how long shutdown waits for workers.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: String,

    #[serde(default)]
    pub tab_reuse: TabReusePolicy,

    #[serde(default)]
    pub allow_duplicate_runs: bool,

    #[serde(default = "default_cache_credential")]
    pub cache_credential: bool,

    #[serde(default = "default_elevation_program")]
    pub elevation_program: String,
}

fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT
}

fn default_cancel_grace_period() -> String {
    "3s".to_string()
}

fn default_shutdown_timeout() -> String {
    "5s".to_string()
}

fn default_cache_credential() -> bool {
    true
}

fn default_elevation_program() -> String {
    "sudo".to_string()
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            cancel_grace_period: default_cancel_grace_period(),
            shutdown_timeout: default_shutdown_timeout(),
            tab_reuse: TabReusePolicy::default(),
            allow_duplicate_runs: false,
            cache_credential: default_cache_credential(),
            elevation_program: default_elevation_program(),
        }
    }
}

/// Validated runner settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerSettings {
    pub max_concurrent: usize,
    pub cancel_grace_period: Duration,
    pub shutdown_timeout: Duration,
    pub tab_reuse: TabReusePolicy,
    pub allow_duplicate_runs: bool,
    pub cache_credential: bool,
    pub elevation_program: String,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            cancel_grace_period: Duration::from_secs(3),
            shutdown_timeout: Duration::from_secs(5),
            tab_reuse: TabReusePolicy::default(),
            allow_duplicate_runs: false,
            cache_credential: true,
            elevation_program: default_elevation_program(),
        }
    }
}

/// Everything the application needs from configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory script paths are resolved against.
    pub root: PathBuf,
    pub scripts: Vec<ScriptDescriptor>,
    pub settings: RunnerSettings,
}

/// Parse a short duration string: `"250ms"`, `"3s"`, `"2m"` or a bare
/// number of seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        return ms.trim().parse::<u64>().ok().map(Duration::from_millis);
    }
    if let Some(secs) = s.strip_suffix('s') {
        return secs.trim().parse::<f64>().ok().and_then(secs_to_duration);
    }
    if let Some(mins) = s.strip_suffix('m') {
        return mins
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|m| secs_to_duration(m * 60.0));
    }
    s.parse::<f64>().ok().and_then(secs_to_duration)
}

fn secs_to_duration(secs: f64) -> Option<Duration> {
    if secs.is_finite() && secs >= 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_units() {
        assert_eq!(parse_duration("250ms"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("3s"), Some(Duration::from_secs(3)));
        assert_eq!(parse_duration("1.5s"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("4"), Some(Duration::from_secs(4)));
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration("-1s"), None);
    }

    #[test]
    fn file_name_is_last_path_component() {
        let d = ScriptDescriptor {
            label: "Backup".into(),
            path: "scripts/nightly/backup.sh".into(),
            needs_sudo: false,
            tags: BTreeSet::new(),
            description: String::new(),
        };
        assert_eq!(d.file_name(), "backup.sh");
    }
}
