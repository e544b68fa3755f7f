// src/lib.rs

pub mod catalog;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod frontend;
pub mod logging;
pub mod report;
pub mod sink;
pub mod types;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::catalog::ScriptCatalog;
use crate::cli::{CliArgs, Command};
use crate::config::{AppConfig, load_app_config, resolve_app_root};
use crate::engine::{CoreOptions, CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions};
use crate::exec::{LaunchSettings, RealExecutorBackend};
use crate::frontend::{Frontend, ReplFrontend, TerminalFrontend};
use crate::types::clamp_limit;

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together:
/// - config loading
/// - core runtime / async shell
/// - executor
/// - frontend (one-shot terminal or interactive shell)
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<i32> {
    let root = resolve_app_root(args.root.as_deref())?;
    let mut cfg = load_app_config(root, args.catalog.as_deref(), args.settings.as_deref())
        .context("loading configuration")?;

    if let Some(limit) = args.max_concurrent {
        cfg.settings.max_concurrent = clamp_limit(limit);
    }

    match args.command {
        Command::Check => {
            print_check(&cfg);
            Ok(0)
        }
        Command::List { search, tag, tags } => {
            let catalog = ScriptCatalog::new(cfg.scripts);
            if tags {
                for t in catalog.tags() {
                    println!("{t}");
                }
            } else {
                println!(
                    "{}",
                    report::scripts_report(&catalog, search.as_deref(), tag.as_deref())
                );
            }
            Ok(0)
        }
        Command::Run { scripts } => {
            let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(256);
            let frontend = TerminalFrontend::new(rt_tx.clone());

            for script in scripts {
                rt_tx.send(RuntimeEvent::LaunchRequested { script }).await?;
            }
            rt_tx.send(RuntimeEvent::InputClosed).await?;

            let summary = drive(cfg, rt_tx, rt_rx, frontend).await?;
            Ok(if summary.all_succeeded() { 0 } else { 1 })
        }
        Command::Shell => {
            let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(256);
            let (frontend, _input_thread) =
                ReplFrontend::spawn(rt_tx.clone()).context("starting input thread")?;

            println!(
                "scriptrun: {} script(s) loaded, limit {}. Type \"help\" for commands.",
                cfg.scripts.len(),
                cfg.settings.max_concurrent
            );

            drive(cfg, rt_tx, rt_rx, frontend).await?;
            Ok(0)
        }
    }
}

/// Build the core, executor and runtime, then run until the core exits.
async fn drive<F: Frontend>(
    cfg: AppConfig,
    rt_tx: mpsc::Sender<RuntimeEvent>,
    rt_rx: mpsc::Receiver<RuntimeEvent>,
    frontend: F,
) -> Result<engine::RunSummary> {
    let settings = cfg.settings;
    info!(
        root = %cfg.root.display(),
        scripts = cfg.scripts.len(),
        max_concurrent = settings.max_concurrent,
        "starting scriptrun"
    );

    let executor = RealExecutorBackend::new(
        rt_tx.clone(),
        LaunchSettings::new(cfg.root, settings.elevation_program.clone()),
    );

    // Ctrl-C → cancel everything and exit.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested { confirmed: true }).await;
        });
    }
    drop(rt_tx);

    let options = CoreOptions::from_settings(&settings, RuntimeOptions { exit_when_idle: true });

    // Construct the pure core runtime (single source of truth for semantics).
    let core = CoreRuntime::new(
        ScriptCatalog::new(cfg.scripts),
        settings.max_concurrent,
        settings.cache_credential,
        options,
    );

    // Construct the async IO shell around the core.
    let runtime = Runtime::new(core, rt_rx, executor, frontend)
        .with_shutdown_timeout(settings.shutdown_timeout);
    let summary = runtime.run().await?;

    debug!(?summary, "runtime finished");
    Ok(summary)
}

/// Print the validated configuration without running anything.
fn print_check(cfg: &AppConfig) {
    let s = &cfg.settings;
    println!("scriptrun check");
    println!("  root = {}", cfg.root.display());
    println!("  runner.max_concurrent = {}", s.max_concurrent);
    println!("  runner.cancel_grace_period = {:?}", s.cancel_grace_period);
    println!("  runner.shutdown_timeout = {:?}", s.shutdown_timeout);
    println!("  runner.tab_reuse = {}", s.tab_reuse);
    println!("  runner.allow_duplicate_runs = {}", s.allow_duplicate_runs);
    println!("  runner.cache_credential = {}", s.cache_credential);
    println!("  runner.elevation_program = {}", s.elevation_program);
    println!();

    println!("scripts ({}):", cfg.scripts.len());
    for script in &cfg.scripts {
        let resolved = exec::resolve_script_path(&cfg.root, &script.path);
        let missing = if resolved.is_file() { "" } else { "  (missing)" };
        println!("  - {}", script.label);
        println!("      path: {}{missing}", resolved.display());
        if script.needs_sudo {
            println!("      needs_sudo: true");
        }
        if !script.tags.is_empty() {
            println!("      tags: {:?}", script.tags);
        }
    }

    debug!("check complete (no execution)");
}
