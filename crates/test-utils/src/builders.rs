#![allow(dead_code)]

use std::time::Duration;

use scriptrun::catalog::ScriptCatalog;
use scriptrun::config::ScriptDescriptor;
use scriptrun::engine::{CoreOptions, CoreRuntime, RuntimeOptions};
use scriptrun::types::{DEFAULT_MAX_CONCURRENT, TabReusePolicy};

/// Builder for `ScriptDescriptor`.
pub struct ScriptBuilder {
    script: ScriptDescriptor,
}

impl ScriptBuilder {
    pub fn new(label: &str, path: &str) -> Self {
        Self {
            script: ScriptDescriptor {
                label: label.to_string(),
                path: path.to_string(),
                needs_sudo: false,
                tags: Default::default(),
                description: String::new(),
            },
        }
    }

    pub fn sudo(mut self) -> Self {
        self.script.needs_sudo = true;
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.script.tags.insert(tag.to_string());
        self
    }

    pub fn description(mut self, text: &str) -> Self {
        self.script.description = text.to_string();
        self
    }

    pub fn build(self) -> ScriptDescriptor {
        self.script
    }
}

/// Shorthand for a plain script whose label is its file stem.
pub fn script(path: &str) -> ScriptDescriptor {
    let label = path
        .rsplit('/')
        .next()
        .and_then(|f| f.split('.').next())
        .unwrap_or(path);
    ScriptBuilder::new(label, path).build()
}

/// Builder for a `CoreRuntime` with test-friendly defaults.
pub struct CoreBuilder {
    scripts: Vec<ScriptDescriptor>,
    max_concurrent: usize,
    cache_credential: bool,
    options: CoreOptions,
}

impl CoreBuilder {
    pub fn new() -> Self {
        Self {
            scripts: Vec::new(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            cache_credential: true,
            options: CoreOptions {
                tab_reuse: TabReusePolicy::Reuse,
                allow_duplicate_runs: false,
                cancel_grace_period: Duration::from_secs(3),
                runtime: RuntimeOptions {
                    exit_when_idle: false,
                },
            },
        }
    }

    pub fn with_script(mut self, script: ScriptDescriptor) -> Self {
        self.scripts.push(script);
        self
    }

    pub fn max_concurrent(mut self, limit: usize) -> Self {
        self.max_concurrent = limit;
        self
    }

    pub fn cache_credential(mut self, val: bool) -> Self {
        self.cache_credential = val;
        self
    }

    pub fn tab_reuse(mut self, policy: TabReusePolicy) -> Self {
        self.options.tab_reuse = policy;
        self
    }

    pub fn allow_duplicate_runs(mut self, val: bool) -> Self {
        self.options.allow_duplicate_runs = val;
        self
    }

    pub fn exit_when_idle(mut self, val: bool) -> Self {
        self.options.runtime.exit_when_idle = val;
        self
    }

    pub fn build(self) -> CoreRuntime {
        CoreRuntime::new(
            ScriptCatalog::new(self.scripts),
            self.max_concurrent,
            self.cache_credential,
            self.options,
        )
    }
}

impl Default for CoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
