//! Backup run.
//!
//! The orchestrator walks the targets in document order, resolves each one
//! into sync jobs and hands the jobs to a [`Runner`]. An error stops only the
//! target it happened in; the run always continues with the next target.

use std::path::Path;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{GlobalConfig, TargetConfig, TargetEntry, Targets};
use crate::error::{Error, Result};
use crate::fileset;
use crate::runner::Runner;

/// How a single target ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed(String),
    /// Interrupted or never started because the run was cancelled.
    Cancelled,
}

/// Outcome of every target of a run, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub targets: Vec<(String, Outcome)>,
}

impl Summary {
    pub fn failed(&self) -> impl Iterator<Item = &str> {
        self.targets.iter().filter_map(|(name, outcome)| match outcome {
            Outcome::Failed(_) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }

    pub fn was_cancelled(&self) -> bool {
        self.targets
            .iter()
            .any(|(_, outcome)| *outcome == Outcome::Cancelled)
    }
}

/// Drives a backup run over a set of targets.
pub struct Orchestrator<R> {
    global: GlobalConfig,
    runner: R,
    cancel: CancellationToken,
    parallel: usize,
}

impl<R: Runner> Orchestrator<R> {
    pub fn new(global: GlobalConfig, runner: R, cancel: CancellationToken) -> Self {
        Self {
            global,
            runner,
            cancel,
            parallel: 1,
        }
    }

    /// Runs up to `parallel` targets at the same time. Jobs of one target
    /// always run one after the other.
    pub fn with_parallel(mut self, parallel: usize) -> Self {
        self.parallel = parallel.max(1);
        self
    }

    /// Backs up every target.
    pub async fn run_all(&self, targets: &Targets) -> Summary {
        let targets: Vec<(String, Outcome)> = stream::iter(targets.iter())
            .map(|entry| async move { (entry.name().to_string(), self.run_target(entry).await) })
            .buffered(self.parallel)
            .collect()
            .await;
        Summary { targets }
    }

    async fn run_target(&self, entry: &TargetEntry) -> Outcome {
        let name = entry.name();
        if self.cancel.is_cancelled() {
            warn!("Skipped backup: {name}");
            return Outcome::Cancelled;
        }

        info!("Begin backup: {name}");
        let res = match entry.config() {
            Ok(config) => self.run_one(name, &config).await,
            Err(e) => Err(e),
        };
        match res {
            Ok(()) => {
                info!("End backup: {name}");
                Outcome::Succeeded
            }
            Err(Error::Cancelled) => {
                warn!("Cancelled backup: {name}");
                Outcome::Cancelled
            }
            Err(e) => {
                error!("Error: {name}: {e}");
                Outcome::Failed(e.to_string())
            }
        }
    }

    /// Resolves the target's fileset and runs its jobs in order.
    pub async fn run_one(&self, name: &str, target: &TargetConfig) -> Result<()> {
        let jobs = fileset::resolve(&self.global, name, target)?;
        let log_file = target.log_file.as_deref();

        for job in &jobs {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let source = &job.source;
            let destination = job.destination.display();
            match log_file {
                Some(log) => info!(
                    "backup {source} to {destination}, log file available at {}",
                    log.display()
                ),
                None => info!("backup {source} to {destination}"),
            }

            let code = self.runner.ensure_dir(&job.destination).await?;
            self.check("mkdir", &job.destination, code)?;

            let code = self
                .runner
                .sync(&job.options, source, &job.destination, log_file)
                .await?;
            self.check(&self.global.rsync, &job.destination, code)?;

            info!("finished backup {source} to {destination}");
        }
        Ok(())
    }

    /// Applies the exit code policy: in strict mode a non-zero code fails the
    /// target, otherwise it is only logged.
    fn check(&self, command: &str, destination: &Path, code: i32) -> Result<()> {
        if code == 0 {
            return Ok(());
        }
        if self.global.strict {
            return Err(Error::CommandFailed {
                command: command.to_string(),
                path: destination.to_path_buf(),
                code,
            });
        }
        debug!("ignoring exit code {code} of {command} for {}", destination.display());
        Ok(())
    }
}
