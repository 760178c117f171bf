//! External process execution.
//!
//! A backup job needs two external programs: one that creates the destination
//! directory and one that synchronizes the files. [`Runner`] is the seam the
//! orchestrator talks to, [`ProcessRunner`] the implementation that spawns
//! the configured commands.

use std::borrow::Cow;
use std::ffi::OsString;
use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::GlobalConfig;
use crate::error::{Error, Result};
use crate::job::SyncOption;

/// Executes the external commands of a sync job and reports their exit codes.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Creates `path` and its parents.
    async fn ensure_dir(&self, path: &Path) -> Result<i32>;

    /// Synchronizes `source` into `destination`, appending the command's
    /// output to `log_file` when one is given.
    async fn sync(
        &self,
        options: &[SyncOption],
        source: &str,
        destination: &Path,
        log_file: Option<&Path>,
    ) -> Result<i32>;
}

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<OsString>,
}

impl CommandLine {
    /// Splits a configured command such as `sudo rsync` into program and
    /// leading arguments, honouring shell quotes.
    fn parse(command: &str, kind: &'static str) -> Result<Self> {
        let mut words = shlex::split(command)
            .ok_or_else(|| Error::Quoting(command.to_string()))?
            .into_iter();
        let program = words.next().ok_or(Error::EmptyCommand(kind))?;
        Ok(Self {
            program,
            args: words.map(OsString::from).collect(),
        })
    }

    /// `mkdir -p <path>`.
    pub fn mkdir(global: &GlobalConfig, path: &Path) -> Result<Self> {
        let mut command = Self::parse(&global.mkdir, "mkdir")?;
        command.args.push("-p".into());
        command.args.push(path.into());
        Ok(command)
    }

    /// `rsync <global options> <job options> <source> <destination>`.
    pub fn sync(
        global: &GlobalConfig,
        options: &[SyncOption],
        source: &str,
        destination: &Path,
    ) -> Result<Self> {
        let mut command = Self::parse(&global.rsync, "rsync")?;
        for option in effective_options(global, options) {
            command.args.extend(option.args()?.into_iter().map(OsString::from));
        }
        command.args.push(source.into());
        command.args.push(destination.into());
        Ok(command)
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&quoted(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quoted(&arg.to_string_lossy()))?;
        }
        Ok(())
    }
}

/// Quotes `arg` for display when splitting it again would change it.
fn quoted(arg: &str) -> Cow<'_, str> {
    if arg.contains(|c: char| c.is_whitespace() || c == '\'' || c == '"') {
        shlex::try_quote(arg).unwrap_or(Cow::Borrowed(arg))
    } else {
        Cow::Borrowed(arg)
    }
}

/// The job's options with the global option string in front.
pub fn effective_options(global: &GlobalConfig, options: &[SyncOption]) -> Vec<SyncOption> {
    let mut effective = Vec::with_capacity(options.len() + 1);
    effective.push(SyncOption::Raw(global.rsync_option.clone()));
    effective.extend_from_slice(options);
    effective
}

/// Where the output of a child process goes.
enum Output<'a> {
    Inherit,
    Discard,
    Append(&'a Path),
}

/// Runs the configured mkdir and sync commands as child processes.
///
/// Cancelling the token kills a running child.
pub struct ProcessRunner {
    global: GlobalConfig,
    cancel: CancellationToken,
}

impl ProcessRunner {
    pub fn new(global: GlobalConfig, cancel: CancellationToken) -> Self {
        Self { global, cancel }
    }

    async fn execute(&self, command_line: &CommandLine, output: Output<'_>) -> Result<i32> {
        debug!("Executing: {command_line}");
        let mut command = command_line.to_command();
        command.stdin(Stdio::null()).kill_on_drop(true);
        match output {
            Output::Inherit => {}
            Output::Discard => {
                command.stdout(Stdio::null()).stderr(Stdio::null());
            }
            Output::Append(path) => {
                let log_error = |source| Error::LogFile {
                    path: path.to_path_buf(),
                    source,
                };
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(log_error)?;
                let stderr = file.try_clone().map_err(log_error)?;
                command.stdout(Stdio::from(file)).stderr(Stdio::from(stderr));
            }
        }

        let spawn_error = |source| Error::Spawn {
            command: command_line.to_string(),
            source,
        };
        let mut child = command.spawn().map_err(spawn_error)?;
        let status = tokio::select! {
            status = child.wait() => status.map_err(spawn_error)?,
            _ = self.cancel.cancelled() => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to stop '{command_line}': {e}");
                }
                return Err(Error::Cancelled);
            }
        };

        // Killed by a signal
        let code = status.code().unwrap_or(-1);
        debug!("command exited with code {code}");
        Ok(code)
    }
}

#[async_trait]
impl Runner for ProcessRunner {
    async fn ensure_dir(&self, path: &Path) -> Result<i32> {
        let command = CommandLine::mkdir(&self.global, path)?;
        self.execute(&command, Output::Inherit).await
    }

    async fn sync(
        &self,
        options: &[SyncOption],
        source: &str,
        destination: &Path,
        log_file: Option<&Path>,
    ) -> Result<i32> {
        let command = CommandLine::sync(&self.global, options, source, destination)?;
        let output = match log_file {
            Some(path) => Output::Append(path),
            None => Output::Discard,
        };
        self.execute(&command, output).await
    }
}
