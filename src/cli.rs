// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `scriptrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "scriptrun",
    version,
    about = "Run catalogued shell scripts with bounded concurrency and per-run output tabs.",
    long_about = None
)]
pub struct CliArgs {
    /// Application root. Relative script paths resolve against it.
    ///
    /// If omitted, `SCRIPTRUN_ROOT` or the executable's directory is used.
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Script catalogue (JSON). Default: `<root>/scripts.json`.
    #[arg(long = "scripts", global = true, value_name = "PATH")]
    pub catalog: Option<PathBuf>,

    /// Settings file (TOML). Default: `<root>/scriptrun.toml`, if present.
    #[arg(long, global = true, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Override the configured concurrency limit (1-20).
    #[arg(long, global = true, value_name = "N")]
    pub max_concurrent: Option<usize>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SCRIPTRUN_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List catalogued scripts.
    List {
        /// Case-insensitive substring of the label.
        #[arg(long)]
        search: Option<String>,
        /// Only scripts carrying this tag.
        #[arg(long)]
        tag: Option<String>,
        /// Print the tag list instead of scripts.
        #[arg(long)]
        tags: bool,
    },
    /// Run scripts (by label or path) and exit when all have finished.
    Run {
        #[arg(required = true, value_name = "SCRIPT")]
        scripts: Vec<String>,
    },
    /// Interactive shell.
    Shell,
    /// Validate configuration and print the catalogue; runs nothing.
    Check,
}

impl Command {
    /// Whether this command drives the interactive shell.
    pub fn is_interactive(&self) -> bool {
        matches!(self, Command::Shell)
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_work_after_subcommand() {
        let args = CliArgs::try_parse_from([
            "scriptrun",
            "run",
            "backup",
            "Disk Cleanup",
            "--max-concurrent",
            "2",
            "--root",
            "/opt/app",
        ])
        .unwrap();
        assert_eq!(args.max_concurrent, Some(2));
        assert_eq!(args.root, Some(PathBuf::from("/opt/app")));
        match args.command {
            Command::Run { scripts } => assert_eq!(scripts, vec!["backup", "Disk Cleanup"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn catalog_flag_and_run_targets_do_not_collide() {
        let args = CliArgs::try_parse_from([
            "scriptrun",
            "--scripts",
            "/etc/scriptrun/scripts.json",
            "run",
            "backup",
        ])
        .unwrap();
        assert_eq!(args.catalog, Some(PathBuf::from("/etc/scriptrun/scripts.json")));
        match args.command {
            Command::Run { scripts } => assert_eq!(scripts, vec!["backup"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn run_requires_a_script() {
        assert!(CliArgs::try_parse_from(["scriptrun", "run"]).is_err());
    }
}
