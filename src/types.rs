use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Lowest concurrency limit a user can configure.
pub const MIN_CONCURRENT: usize = 1;
/// Highest concurrency limit a user can configure.
pub const MAX_CONCURRENT: usize = 20;
/// Concurrency limit used when nothing else is configured.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Identifier of a single launch. Allocated monotonically, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_start_matches('#');
        digits
            .parse::<u64>()
            .map(JobId)
            .map_err(|_| format!("invalid job id: {s} (expected e.g. \"#3\" or \"3\")"))
    }
}

/// Identifier of an output tab, captured when the tab is created.
///
/// Tabs are always addressed by this id; their position in the tab strip is
/// a separate, mutable property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

impl FromStr for TabId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_start_matches('t');
        digits
            .parse::<u64>()
            .map(TabId)
            .map_err(|_| format!("invalid tab id: {s} (expected e.g. \"t2\" or \"2\")"))
    }
}

/// What to do with an existing, fully finished tab when its script runs again.
///
/// - `Reuse`: append a separator and the new run's output to the old tab
///   (default, matches the historical behaviour).
/// - `New`: always open a fresh tab per run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabReusePolicy {
    #[default]
    Reuse,
    New,
}

impl fmt::Display for TabReusePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TabReusePolicy::Reuse => f.write_str("reuse"),
            TabReusePolicy::New => f.write_str("new"),
        }
    }
}

impl FromStr for TabReusePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reuse" => Ok(TabReusePolicy::Reuse),
            "new" => Ok(TabReusePolicy::New),
            other => Err(format!(
                "invalid tab_reuse: {other} (expected \"reuse\" or \"new\")"
            )),
        }
    }
}

/// Clamp a requested concurrency limit into the supported range.
pub fn clamp_limit(limit: usize) -> usize {
    limit.clamp(MIN_CONCURRENT, MAX_CONCURRENT)
}
