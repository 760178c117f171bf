use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Glob passed to the sync tool to skip every dotfile and dot-directory.
pub const HIDDEN_FILES_PATTERN: &str = ".*";

/// One option of a sync invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOption {
    /// Free-form option string, possibly holding several flags. Split with
    /// shell quoting rules, so `-e 'ssh -p 2222'` stays two arguments.
    Raw(String),
    /// Exclude pattern, passed as a single `--exclude=<pattern>` argument.
    Exclude(String),
}

impl SyncOption {
    /// Expands the option into command-line arguments.
    pub fn args(&self) -> Result<Vec<String>> {
        match self {
            SyncOption::Raw(s) => shlex::split(s).ok_or_else(|| Error::Quoting(s.clone())),
            SyncOption::Exclude(pattern) => Ok(vec![format!("--exclude={pattern}")]),
        }
    }
}

impl fmt::Display for SyncOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOption::Raw(s) => f.write_str(s),
            SyncOption::Exclude(pattern) => write!(f, "--exclude={pattern}"),
        }
    }
}

/// A single synchronization of one include path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncJob {
    /// Target options followed by derived excludes. Global options are not included.
    pub options: Vec<SyncOption>,
    /// `host:/absolute/path`.
    pub source: String,
    pub destination: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_option_args() {
        let option = SyncOption::Raw("-a  --delete -v".to_string());
        assert_eq!(option.args().unwrap(), vec!["-a", "--delete", "-v"]);
        assert!(SyncOption::Raw(String::new()).args().unwrap().is_empty());
    }

    #[test]
    fn test_raw_option_honours_quotes() {
        let option = SyncOption::Raw("-a -e 'ssh -p 2222' --rsync-path=\"sudo rsync\"".to_string());
        assert_eq!(
            option.args().unwrap(),
            vec!["-a", "-e", "ssh -p 2222", "--rsync-path=sudo rsync"]
        );
    }

    #[test]
    fn test_unbalanced_quote_is_rejected() {
        let option = SyncOption::Raw("-e 'ssh -p 2222".to_string());
        assert!(matches!(option.args(), Err(Error::Quoting(s)) if s == "-e 'ssh -p 2222"));
    }

    #[test]
    fn test_exclude_option_keeps_spaces() {
        let option = SyncOption::Exclude("My Documents/cache".to_string());
        assert_eq!(option.args().unwrap(), vec!["--exclude=My Documents/cache"]);
        assert_eq!(option.to_string(), "--exclude=My Documents/cache");
    }
}
