// tests/process_unix.rs
//
// Real processes via bash. Unix only.
#![cfg(unix)]

use std::error::Error;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use scriptrun::engine::{Credential, Elevation, ExitOutcome, OutputStream, RuntimeEvent};
use scriptrun::errors::ScriptrunError;
use scriptrun::exec::{
    ExecRequest, ExecutorBackend, LaunchRequest, LaunchSettings, RealExecutorBackend,
};
use scriptrun::types::JobId;
use scriptrun_test_utils::builders::{ScriptBuilder, script};
use scriptrun_test_utils::{init_tracing, relative_to_cwd};

type TestResult = Result<(), Box<dyn Error>>;

fn write_script(dir: &Path, name: &str, body: &str) -> Result<PathBuf, Box<dyn Error>> {
    let path = dir.join(name);
    std::fs::write(&path, body)?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

fn start(job: u64, path: &str, elevation: Elevation) -> ExecRequest {
    ExecRequest::Start(LaunchRequest {
        job: JobId(job),
        script: script(path),
        elevation,
    })
}

fn is_terminal(event: &RuntimeEvent) -> bool {
    matches!(
        event,
        RuntimeEvent::JobExited { .. }
            | RuntimeEvent::JobCancelled { .. }
            | RuntimeEvent::JobLaunchFailed { .. }
    )
}

/// Receive events until the first terminal one (inclusive).
async fn until_terminal(rx: &mut mpsc::Receiver<RuntimeEvent>) -> Vec<RuntimeEvent> {
    let mut events = Vec::new();
    loop {
        let event = timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("timed out waiting for job events")
            .expect("event channel closed");
        let done = is_terminal(&event);
        events.push(event);
        if done {
            return events;
        }
    }
}

fn lines(events: &[RuntimeEvent], want: OutputStream) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            RuntimeEvent::OutputLine { stream, line, .. } if *stream == want => Some(line.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn streams_both_pipes_and_reports_exit_code() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    write_script(
        dir.path(),
        "mixed.sh",
        "echo one\necho warn >&2\nprintf 'no newline'\nexit 3\n",
    )?;

    let (tx, mut rx) = mpsc::channel(64);
    let mut backend = RealExecutorBackend::new(tx, LaunchSettings::new(dir.path(), "sudo"));
    backend.dispatch(start(1, "mixed.sh", Elevation::None)).await?;

    let events = until_terminal(&mut rx).await;
    assert!(matches!(
        &events[0],
        RuntimeEvent::JobStarted { job: JobId(1), pid: Some(_), program }
            if program.ends_with("mixed.sh")
    ));
    assert_eq!(lines(&events, OutputStream::Stdout), vec!["one", "no newline"]);
    assert_eq!(lines(&events, OutputStream::Stderr), vec!["warn"]);
    assert!(matches!(
        events.last(),
        Some(RuntimeEvent::JobExited { job: JobId(1), outcome: ExitOutcome::Code(3) })
    ));

    backend.shutdown(Duration::from_secs(2)).await?;
    Ok(())
}

#[tokio::test]
async fn runs_in_the_script_directory() -> TestResult {
    let dir = tempfile::tempdir()?;
    std::fs::create_dir(dir.path().join("tools"))?;
    write_script(&dir.path().join("tools"), "where.sh", "pwd\n")?;

    let (tx, mut rx) = mpsc::channel(64);
    let mut backend = RealExecutorBackend::new(tx, LaunchSettings::new(dir.path(), "sudo"));
    backend.dispatch(start(1, "tools/where.sh", Elevation::None)).await?;

    let events = until_terminal(&mut rx).await;
    let cwd = PathBuf::from(&lines(&events, OutputStream::Stdout)[0]);
    assert_eq!(cwd.canonicalize()?, dir.path().join("tools").canonicalize()?);
    Ok(())
}

#[tokio::test]
async fn relative_root_still_finds_scripts_in_subdirectories() -> TestResult {
    let dir = tempfile::tempdir()?;
    std::fs::create_dir(dir.path().join("tools"))?;
    write_script(&dir.path().join("tools"), "hello.sh", "echo hello\n")?;
    let root = relative_to_cwd(dir.path())?;
    assert!(root.is_relative());

    let (tx, mut rx) = mpsc::channel(64);
    let mut backend = RealExecutorBackend::new(tx, LaunchSettings::new(root, "sudo"));
    backend.preflight(&script("tools/hello.sh"))?;
    backend.dispatch(start(1, "tools/hello.sh", Elevation::None)).await?;

    let events = until_terminal(&mut rx).await;
    assert!(matches!(
        &events[0],
        RuntimeEvent::JobStarted { program, .. } if program.is_absolute()
    ));
    assert_eq!(lines(&events, OutputStream::Stdout), vec!["hello"]);
    assert!(matches!(
        events.last(),
        Some(RuntimeEvent::JobExited { job: JobId(1), outcome: ExitOutcome::Code(0) })
    ));
    backend.shutdown(Duration::from_secs(2)).await?;
    Ok(())
}

#[tokio::test]
async fn cancel_after_exit_keeps_the_exit_code() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_script(dir.path(), "quick.sh", "echo done\n")?;

    let (tx, mut rx) = mpsc::channel(64);
    let mut backend = RealExecutorBackend::new(tx, LaunchSettings::new(dir.path(), "sudo"));
    backend.dispatch(start(1, "quick.sh", Elevation::None)).await?;

    let mut seen = Vec::new();
    loop {
        let event = timeout(Duration::from_secs(10), rx.recv()).await?.ok_or("closed")?;
        let done = matches!(&event, RuntimeEvent::OutputLine { line, .. } if line == "done");
        seen.push(event);
        if done {
            break;
        }
    }
    // The script has nothing left to do; give it time to be gone.
    tokio::time::sleep(Duration::from_millis(200)).await;
    backend
        .dispatch(ExecRequest::Cancel {
            job: JobId(1),
            grace: Duration::from_secs(5),
        })
        .await?;
    if !seen.iter().any(is_terminal) {
        seen.extend(until_terminal(&mut rx).await);
    }

    assert!(matches!(
        seen.last(),
        Some(RuntimeEvent::JobExited { job: JobId(1), outcome: ExitOutcome::Code(0) })
    ));
    assert!(!seen.iter().any(|e| matches!(e, RuntimeEvent::JobCancelled { .. })));
    backend.shutdown(Duration::from_secs(2)).await?;
    Ok(())
}

#[tokio::test]
async fn cooperative_script_stops_on_terminate() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_script(dir.path(), "slow.sh", "echo begin\nsleep 30\necho never\n")?;

    let (tx, mut rx) = mpsc::channel(64);
    let mut backend = RealExecutorBackend::new(tx, LaunchSettings::new(dir.path(), "sudo"));
    backend.dispatch(start(1, "slow.sh", Elevation::None)).await?;

    // Wait for the first line so the process is definitely running.
    loop {
        let event = timeout(Duration::from_secs(10), rx.recv()).await?.ok_or("closed")?;
        if matches!(&event, RuntimeEvent::OutputLine { line, .. } if line == "begin") {
            break;
        }
    }
    backend
        .dispatch(ExecRequest::Cancel {
            job: JobId(1),
            grace: Duration::from_secs(5),
        })
        .await?;

    let events = until_terminal(&mut rx).await;
    assert!(matches!(
        events.last(),
        Some(RuntimeEvent::JobCancelled { job: JobId(1), forced: false })
    ));
    assert!(!lines(&events, OutputStream::Stdout).contains(&"never".to_string()));
    Ok(())
}

#[tokio::test]
async fn script_ignoring_terminate_is_killed_after_grace() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_script(
        dir.path(),
        "stubborn.sh",
        "trap '' TERM\necho started\nwhile true; do sleep 0.1; done\n",
    )?;

    let (tx, mut rx) = mpsc::channel(64);
    let mut backend = RealExecutorBackend::new(tx, LaunchSettings::new(dir.path(), "sudo"));
    backend.dispatch(start(7, "stubborn.sh", Elevation::None)).await?;

    let mut seen = Vec::new();
    loop {
        let event = timeout(Duration::from_secs(10), rx.recv()).await?.ok_or("closed")?;
        let ready = matches!(&event, RuntimeEvent::OutputLine { line, .. } if line == "started");
        seen.push(event);
        if ready {
            break;
        }
    }

    let grace = Duration::from_millis(300);
    let began = tokio::time::Instant::now();
    backend
        .dispatch(ExecRequest::Cancel { job: JobId(7), grace })
        .await?;
    seen.extend(until_terminal(&mut rx).await);

    assert!(matches!(
        seen.last(),
        Some(RuntimeEvent::JobCancelled { job: JobId(7), forced: true })
    ));
    assert!(began.elapsed() >= grace);
    assert!(began.elapsed() < Duration::from_secs(5));
    // Output produced before the kill is kept.
    assert_eq!(lines(&seen, OutputStream::Stdout), vec!["started"]);
    Ok(())
}

#[tokio::test]
async fn credential_reaches_stdin_and_never_argv() -> TestResult {
    let dir = tempfile::tempdir()?;
    // Stand-in elevation program: reads the secret, reports what it saw,
    // then runs the remaining command like sudo would.
    let fake = write_script(
        dir.path(),
        "fake-sudo",
        "#!/bin/sh\nread -r secret\necho \"argv: $*\"\n\
         echo \"secret: $secret\"\nshift 3\nexec \"$@\"\n",
    )?;
    write_script(dir.path(), "privileged.sh", "echo privileged work\n")?;

    let settings = LaunchSettings::new(dir.path(), fake.to_string_lossy());
    let (tx, mut rx) = mpsc::channel(64);
    let mut backend = RealExecutorBackend::new(tx, settings);

    let elevation = Elevation::Sudo {
        credential: Some(Credential::new("hunter2")),
    };
    let request = ExecRequest::Start(LaunchRequest {
        job: JobId(1),
        script: ScriptBuilder::new("Privileged", "privileged.sh").sudo().build(),
        elevation,
    });
    backend.dispatch(request).await?;

    let events = until_terminal(&mut rx).await;
    let out = lines(&events, OutputStream::Stdout);
    let argv = out.iter().find(|l| l.starts_with("argv: ")).ok_or("no argv line")?;
    assert!(argv.contains("-S"));
    assert!(!argv.contains("hunter2"));
    assert!(out.contains(&"secret: hunter2".to_string()));
    assert!(out.contains(&"privileged work".to_string()));
    assert!(matches!(
        events.last(),
        Some(RuntimeEvent::JobExited { outcome: ExitOutcome::Code(0), .. })
    ));
    Ok(())
}

#[tokio::test]
async fn spawn_failure_is_reported_as_launch_failure() -> TestResult {
    let dir = tempfile::tempdir()?;
    write_script(dir.path(), "a.sh", "echo a\n")?;

    let mut settings = LaunchSettings::new(dir.path(), "sudo");
    settings.interpreter = dir.path().join("no-such-shell").to_string_lossy().into_owned();

    let (tx, mut rx) = mpsc::channel(64);
    let mut backend = RealExecutorBackend::new(tx, settings);
    backend.dispatch(start(1, "a.sh", Elevation::None)).await?;

    let events = until_terminal(&mut rx).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], RuntimeEvent::JobLaunchFailed { job: JobId(1), .. }));
    Ok(())
}

#[tokio::test]
async fn probe_reports_existing_session() -> TestResult {
    let dir = tempfile::tempdir()?;
    let yes = write_script(dir.path(), "always-yes", "#!/bin/sh\nexit 0\n")?;
    let no = write_script(dir.path(), "always-no", "#!/bin/sh\nexit 1\n")?;

    for (program, expected) in [(yes, true), (no, false)] {
        let (tx, mut rx) = mpsc::channel(8);
        let settings = LaunchSettings::new(dir.path(), program.to_string_lossy());
        let mut backend = RealExecutorBackend::new(tx, settings);
        backend.dispatch(ExecRequest::ProbeElevation).await?;
        let event = timeout(Duration::from_secs(5), rx.recv()).await?;
        assert!(matches!(
            event,
            Some(RuntimeEvent::ElevationProbed { authorized }) if authorized == expected
        ));
    }
    Ok(())
}

#[test]
fn preflight_rejects_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, _rx) = mpsc::channel(1);
    let rt = tokio::runtime::Runtime::new().unwrap();
    let _guard = rt.enter();
    let backend = RealExecutorBackend::new(tx, LaunchSettings::new(dir.path(), "sudo"));

    let err = backend.preflight(&script("gone.sh")).unwrap_err();
    match err {
        ScriptrunError::ScriptNotFound(path) => assert!(path.ends_with("gone.sh")),
        other => panic!("Expected ScriptNotFound, got: {other:?}"),
    }
}
