// src/exec/launcher.rs

//! Script path resolution and command construction.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::config::ScriptDescriptor;
use crate::engine::Elevation;
use crate::errors::{Result, ScriptrunError};

/// Process-independent knobs for building commands.
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    /// Relative script paths are resolved against this directory.
    pub root: PathBuf,
    /// Program used for elevated runs (normally `sudo`).
    pub elevation_program: String,
    /// Interpreter the script is handed to.
    pub interpreter: String,
}

impl LaunchSettings {
    pub fn new(root: impl Into<PathBuf>, elevation_program: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            elevation_program: elevation_program.into(),
            interpreter: "bash".to_string(),
        }
    }
}

/// Absolute paths are kept; relative ones are joined onto `root`.
///
/// The result is always absolute; the child runs from the script's own
/// directory, where a cwd-relative path no longer resolves.
pub fn resolve_script_path(root: &Path, script_path: &str) -> PathBuf {
    let path = Path::new(script_path);
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };
    std::path::absolute(&joined).unwrap_or(joined)
}

/// Check that the script file exists before any job is created.
pub fn preflight(settings: &LaunchSettings, script: &ScriptDescriptor) -> Result<PathBuf> {
    let resolved = resolve_script_path(&settings.root, &script.path);
    if resolved.is_file() {
        Ok(resolved)
    } else {
        Err(ScriptrunError::ScriptNotFound(resolved.display().to_string()))
    }
}

/// Build the command for one run.
///
/// - `Elevation::None`: `<interpreter> <script>`
/// - with a credential: `<elevation> -S -p "" <interpreter> <script>`; the
///   credential is written to stdin by the caller, never passed as an argument
/// - session only: `<elevation> -n <interpreter> <script>`
///
/// The working directory is the script's own directory and the child leads
/// its own process group so cancellation can reach its descendants.
pub fn build_command(settings: &LaunchSettings, resolved: &Path, elevation: &Elevation) -> Command {
    let mut cmd = match elevation {
        Elevation::None => {
            let mut c = Command::new(&settings.interpreter);
            c.arg(resolved);
            c
        }
        Elevation::Sudo { credential } => {
            let mut c = Command::new(&settings.elevation_program);
            if credential.is_some() {
                c.args(["-S", "-p", ""]);
            } else {
                c.arg("-n");
            }
            c.arg(&settings.interpreter).arg(resolved);
            c
        }
    };

    if let Some(dir) = resolved.parent().filter(|d| !d.as_os_str().is_empty()) {
        cmd.current_dir(dir);
    }

    let wants_stdin = matches!(elevation, Elevation::Sudo { credential: Some(_) });
    cmd.stdin(if wants_stdin { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    debug!(
        script = %resolved.display(),
        elevated = !matches!(elevation, Elevation::None),
        "built command"
    );
    cmd
}

/// Ask the elevation program whether it already holds a valid session,
/// without prompting.
pub async fn probe_elevation(program: &str) -> bool {
    let status = Command::new(program)
        .args(["-n", "true"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await;

    match status {
        Ok(s) => s.success(),
        Err(e) => {
            debug!(program, error = %e, "elevation probe could not run");
            false
        }
    }
}
