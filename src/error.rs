use std::io;
use std::path::PathBuf;

/// Errors produced while loading configuration or running a backup.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("BackupRoot not specified in configuration file")]
    MissingBackupRoot,

    #[error("Cannot read '{}': {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Cannot parse '{}': {source}", path.display())]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Cannot parse '{}': {source}", path.display())]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Target names must be strings, found {0}")]
    TargetKey(String),

    #[error("Unknown target '{0}'")]
    UnknownTarget(String),

    #[error("Invalid target definition: {0}")]
    TargetDefinition(serde_yaml::Error),

    #[error("No fileset defined")]
    MissingFileset,

    #[error("Unable to find current path: {0}")]
    CurrentDir(io::Error),

    #[error("No {0} command configured")]
    EmptyCommand(&'static str),

    #[error("Unbalanced quotes in '{0}'")]
    Quoting(String),

    #[error("Failed to execute '{command}': {source}")]
    Spawn { command: String, source: io::Error },

    #[error("Cannot open log file '{}': {source}", path.display())]
    LogFile { path: PathBuf, source: io::Error },

    #[error("{command} for '{}' exited with code {code}", path.display())]
    CommandFailed {
        command: String,
        path: PathBuf,
        code: i32,
    },

    #[error("Backup cancelled")]
    Cancelled,
}

/// Unified result type for all fallible operations in rbackup.
pub type Result<T> = std::result::Result<T, Error>;
