// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{
    AppConfig, RawScriptDescriptor, RawSettingsFile, RunnerSettings, ScriptDescriptor,
};
use crate::config::validate::validate_scripts;
use crate::errors::{Result, ScriptrunError};

/// Default script list file name, looked up under the application root.
pub const DEFAULT_SCRIPTS_FILE: &str = "scripts.json";
/// Default settings file name, looked up under the application root.
pub const DEFAULT_SETTINGS_FILE: &str = "scriptrun.toml";
/// Environment variable that overrides the application root.
pub const ROOT_ENV_VAR: &str = "SCRIPTRUN_ROOT";

/// Read the JSON script list without semantic validation.
pub fn load_raw_scripts(path: impl AsRef<Path>) -> Result<Vec<RawScriptDescriptor>> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        ScriptrunError::ConfigError(format!("cannot read script list {}: {e}", path.display()))
    })?;
    let raw: Vec<RawScriptDescriptor> = serde_json::from_str(&contents)?;
    Ok(raw)
}

/// Read and validate the JSON script list.
pub fn load_scripts(path: impl AsRef<Path>) -> Result<Vec<ScriptDescriptor>> {
    let raw = load_raw_scripts(&path)?;
    validate_scripts(raw)
}

/// Read and validate the TOML settings file.
///
/// A missing file is only an error when `required` is set (i.e. the user
/// named the file explicitly); otherwise defaults are used.
pub fn load_settings(path: impl AsRef<Path>, required: bool) -> Result<RunnerSettings> {
    let path = path.as_ref();
    if !path.exists() {
        if required {
            return Err(ScriptrunError::ConfigError(format!(
                "settings file {} does not exist",
                path.display()
            )));
        }
        debug!(path = %path.display(), "no settings file; using defaults");
        return Ok(RunnerSettings::default());
    }

    let contents = fs::read_to_string(path)?;
    let raw: RawSettingsFile = toml::from_str(&contents)?;
    RunnerSettings::try_from(raw)
}

/// Work out the application root.
///
/// Priority:
/// 1. explicit `--root`
/// 2. `SCRIPTRUN_ROOT`
/// 3. the directory holding the running executable
///
/// The caller's current directory is deliberately not part of this chain:
/// script paths must keep working wherever the runner is started from.
/// A relative `--root` or `SCRIPTRUN_ROOT` is made absolute once, here.
pub fn resolve_app_root(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(root) = explicit {
        return Ok(std::path::absolute(root)?);
    }
    if let Some(root) = std::env::var_os(ROOT_ENV_VAR).filter(|v| !v.is_empty()) {
        return Ok(std::path::absolute(PathBuf::from(root))?);
    }
    let exe = std::env::current_exe()?;
    exe.parent().map(Path::to_path_buf).ok_or_else(|| {
        ScriptrunError::ConfigError(format!(
            "cannot determine application root from executable {}",
            exe.display()
        ))
    })
}

/// Load everything: root, script list and settings.
///
/// `scripts` / `settings` override the default file locations; relative
/// overrides are taken as given (relative to the current directory), while
/// the defaults live under the root.
pub fn load_app_config(
    root: PathBuf,
    scripts: Option<&Path>,
    settings: Option<&Path>,
) -> Result<AppConfig> {
    let scripts_path = scripts
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.join(DEFAULT_SCRIPTS_FILE));
    let settings_path = settings
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.join(DEFAULT_SETTINGS_FILE));

    debug!(
        root = %root.display(),
        scripts = %scripts_path.display(),
        settings = %settings_path.display(),
        "loading configuration"
    );

    let scripts = load_scripts(&scripts_path)?;
    let settings = load_settings(&settings_path, settings.is_some())?;

    Ok(AppConfig {
        root,
        scripts,
        settings,
    })
}
