//! Fileset resolution.
//!
//! Turns a target definition into the ordered list of sync jobs that back it
//! up: one job per include path, with the target's options, the dotfile
//! exclusion and every exclude that applies to that include path.

use crate::config::{GlobalConfig, TargetConfig};
use crate::error::Result;
use crate::job::{HIDDEN_FILES_PATTERN, SyncJob, SyncOption};
use crate::path;

/// Resolves the sync jobs of target `name`.
///
/// Jobs come back in the order of the fileset's include list.
pub fn resolve(global: &GlobalConfig, name: &str, target: &TargetConfig) -> Result<Vec<SyncJob>> {
    let host = target.host(name);
    let concatenation = target.dest.as_deref();
    let destination_root = target.destination_root(name, global);
    let option = target.option_string();
    let fileset = target.fileset()?;
    let backup_hidden_files = target.backup_hidden_files(global);

    let mut jobs = Vec::with_capacity(fileset.include.len());
    for include in &fileset.include {
        let abs_path = path::absolute_path(include)?;
        let source = format!("{host}:{}", abs_path.display());
        let destination = match concatenation {
            Some(dest) => dest.to_path_buf(),
            None => path::join_relative(&destination_root, &path::relative_parent(&abs_path)),
        };

        let mut options = vec![SyncOption::Raw(option.clone())];
        if !backup_hidden_files {
            options.push(SyncOption::Exclude(HIDDEN_FILES_PATTERN.to_string()));
        }
        options.extend(
            fileset
                .exclude
                .iter()
                .filter_map(|exclude| exclude_pattern(include, exclude))
                .map(SyncOption::Exclude),
        );

        jobs.push(SyncJob {
            options,
            source,
            destination,
        });
    }
    Ok(jobs)
}

/// Expresses `exclude` relative to the include root, if it applies to it.
///
/// Excludes nested under the include path lose the include prefix, bare
/// patterns are kept as they are, and absolute paths elsewhere do not apply.
/// Under a `/` include every exclude is kept verbatim, so absolute ones stay
/// anchored to the transfer root.
fn exclude_pattern(include: &str, exclude: &str) -> Option<String> {
    let root = include.trim_end_matches('/');
    if root.is_empty() {
        return Some(exclude.to_string());
    }
    let nested = exclude
        .strip_prefix(root)
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|rest| !rest.is_empty());
    match nested {
        Some(rest) => Some(rest.to_string()),
        None if !exclude.starts_with('/') => Some(exclude.to_string()),
        None => None,
    }
}
