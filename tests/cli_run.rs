// tests/cli_run.rs
//
// The `run` subcommand end to end: argument parsing, config loading and real
// processes. Unix only (scripts go through bash).
#![cfg(unix)]

use std::error::Error;
use std::ffi::OsStr;
use std::path::Path;

use clap::Parser;
use scriptrun::cli::CliArgs;
use scriptrun_test_utils::{init_tracing, relative_to_cwd};

type TestResult = Result<(), Box<dyn Error>>;

/// An application root with `scripts.json` and two scripts in `tools/`.
fn app_root(dir: &Path) -> Result<(), Box<dyn Error>> {
    std::fs::create_dir(dir.join("tools"))?;
    std::fs::write(dir.join("tools/ok.sh"), "echo hi\n")?;
    std::fs::write(dir.join("tools/fail.sh"), "echo failing >&2\nexit 2\n")?;
    std::fs::write(
        dir.join("scripts.json"),
        r#"[
            {"label": "A", "path": "tools/ok.sh"},
            {"label": "B", "path": "tools/fail.sh"},
            {"label": "Gone", "path": "tools/missing.sh"}
        ]"#,
    )?;
    Ok(())
}

async fn run_with(root: &Path, targets: &[&str]) -> Result<i32, Box<dyn Error>> {
    let mut argv = vec!["scriptrun".to_string(), "--root".to_string()];
    argv.push(root.to_string_lossy().into_owned());
    argv.push("run".to_string());
    argv.extend(targets.iter().map(|t| t.to_string()));

    let args = CliArgs::try_parse_from(argv)?;
    Ok(scriptrun::run(args).await?)
}

#[tokio::test]
async fn run_succeeds_for_a_passing_script() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    app_root(dir.path())?;

    assert_eq!(run_with(dir.path(), &["A"]).await?, 0);
    Ok(())
}

#[tokio::test]
async fn run_reports_failure_when_any_script_fails() -> TestResult {
    let dir = tempfile::tempdir()?;
    app_root(dir.path())?;

    assert_eq!(run_with(dir.path(), &["A", "B"]).await?, 1);
    Ok(())
}

#[tokio::test]
async fn run_reports_failure_for_a_missing_script_file() -> TestResult {
    let dir = tempfile::tempdir()?;
    app_root(dir.path())?;

    assert_eq!(run_with(dir.path(), &["Gone"]).await?, 1);
    Ok(())
}

#[tokio::test]
async fn run_accepts_a_relative_root() -> TestResult {
    let dir = tempfile::tempdir()?;
    app_root(dir.path())?;
    let root = relative_to_cwd(dir.path())?;
    assert!(root.is_relative());

    assert_eq!(run_with(&root, &["A"]).await?, 0);
    Ok(())
}

#[tokio::test]
async fn scripts_flag_selects_the_catalogue_file() -> TestResult {
    let dir = tempfile::tempdir()?;
    app_root(dir.path())?;
    let catalogue = dir.path().join("other.json");
    std::fs::write(&catalogue, r#"[{"label": "Only", "path": "tools/ok.sh"}]"#)?;

    let args = CliArgs::try_parse_from([
        OsStr::new("scriptrun"),
        OsStr::new("--root"),
        dir.path().as_os_str(),
        OsStr::new("--scripts"),
        catalogue.as_os_str(),
        OsStr::new("run"),
        OsStr::new("Only"),
    ])?;
    assert_eq!(scriptrun::run(args).await?, 0);
    Ok(())
}
