//! Command-line interface definition for rbackup.
//!
//! This module defines the CLI commands and their arguments, and the logic
//! behind each of them: running a backup, printing the planned commands, and
//! showing which configuration files are in use.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::runtime::Builder;
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, debug, warn};

use crate::config::{ConfigPaths, GlobalConfig, Targets};
use crate::error::Error;
use crate::orchestrator::{Orchestrator, Summary};
use crate::runner::{CommandLine, ProcessRunner};
use crate::{fileset, sysexits};

/// Command-line interface definition for rbackup.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Global configuration file (TOML).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
    /// Targets file (YAML).
    #[arg(short = 'f', long, global = true)]
    pub targets_file: Option<PathBuf>,
    /// Subcommand to execute. Defaults to `run`.
    #[command(subcommand)]
    pub commands: Option<Commands>,
}

/// Supported rbackup commands.
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Back up every target, or only the given ones.
    Run {
        /// Target name(s) to back up.
        #[arg(short, long, value_delimiter = ',')]
        target: Vec<String>,
        /// Number of targets backed up at the same time.
        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
        jobs: u16,
    },
    /// Print the commands a run would execute without executing them.
    Plan {
        /// Target name(s) to plan.
        #[arg(short, long, value_delimiter = ',')]
        target: Vec<String>,
    },
    /// Display the paths of the configuration files in use.
    Config,
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Run {
            target: vec![],
            jobs: 1,
        }
    }
}

/// Maps a startup error to the process exit status.
pub fn exit_code(err: &Error) -> i32 {
    match err {
        Error::Read { .. } => sysexits::EX_NOINPUT,
        Error::MissingBackupRoot
        | Error::Toml { .. }
        | Error::Yaml { .. }
        | Error::TargetKey(_)
        | Error::UnknownTarget(_)
        | Error::Quoting(_) => sysexits::EX_CONFIG,
        Error::LogFile { .. } => sysexits::EX_CANTCREAT,
        _ => sysexits::EX_SOFTWARE,
    }
}

/// Maps the outcome of a run to the process exit status.
pub fn summary_exit_code(summary: &Summary) -> i32 {
    if summary.was_cancelled() {
        sysexits::EX_TEMPFAIL
    } else if summary.has_failures() {
        sysexits::EX_IOERR
    } else {
        0
    }
}

/// Prints the paths of the configuration files.
pub fn config(paths: &ConfigPaths) {
    println!("config file: {}", paths.config.display());
    println!("targets file: {}", paths.targets.display());
}

/// Writes the mkdir and sync commands of every target to `out`.
///
/// Targets that cannot be resolved are reported inline and counted; the
/// count is returned.
pub fn plan(global: &GlobalConfig, targets: &Targets, out: &mut impl Write) -> io::Result<usize> {
    let mut failures = 0;
    for entry in targets.iter() {
        writeln!(out, "# {}", entry.name())?;
        let resolved = entry
            .config()
            .and_then(|target| Ok((fileset::resolve(global, entry.name(), &target)?, target)));
        let (jobs, target) = match resolved {
            Ok(resolved) => resolved,
            Err(e) => {
                writeln!(out, "# error: {e}")?;
                failures += 1;
                continue;
            }
        };
        let redirect = target
            .log_file
            .as_ref()
            .map(|log| format!(" >> {} 2>&1", log.display()))
            .unwrap_or_default();
        for job in &jobs {
            let commands = CommandLine::mkdir(global, &job.destination).and_then(|mkdir| {
                let sync = CommandLine::sync(global, &job.options, &job.source, &job.destination)?;
                Ok((mkdir, sync))
            });
            match commands {
                Ok((mkdir, sync)) => {
                    writeln!(out, "{mkdir}")?;
                    writeln!(out, "{sync}{redirect}")?;
                }
                Err(e) => {
                    writeln!(out, "# error: {e}")?;
                    failures += 1;
                    break;
                }
            }
        }
    }
    Ok(failures)
}

/// Runs the backup of `targets` and returns the per-target outcome.
///
/// Log lines go through `dispatch`. Ctrl-C cancels the run: the running sync
/// is killed and the remaining targets are skipped.
pub fn run(
    global: GlobalConfig,
    targets: Targets,
    jobs: usize,
    dispatch: Dispatch,
) -> anyhow::Result<Summary> {
    let rt = Builder::new_multi_thread().enable_all().build()?;
    let cancel = CancellationToken::new();
    let runner = ProcessRunner::new(global.clone(), cancel.clone());
    let orchestrator = Orchestrator::new(global, runner, cancel.clone()).with_parallel(jobs);

    let summary = rt.block_on(
        async move {
            let interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    interrupt.cancel();
                }
            });

            debug!("Backing up {} target(s)", targets.len());
            let summary = orchestrator.run_all(&targets).await;
            if summary.was_cancelled() {
                warn!("Backup interrupted");
            } else if summary.has_failures() {
                let failed: Vec<&str> = summary.failed().collect();
                warn!("Backup failed for: {}", failed.join(", "));
            }
            summary
        }
        .with_subscriber(dispatch),
    );
    Ok(summary)
}
