use std::env;
use std::path::{Component, Path, PathBuf};

use path_clean::PathClean;

use crate::error::{Error, Result};

/// Makes a path absolute against the current directory and normalizes it
/// lexically. Symbolic links are not resolved.
pub fn absolute_path(path: &str) -> Result<PathBuf> {
    let path = Path::new(path);
    let abs_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().map_err(Error::CurrentDir)?.join(path)
    };
    Ok(abs_path.clean())
}

/// Returns the parent directory of an absolute path as a relative path,
/// e.g. `/home/alice/docs` gives `home/alice`. The root has no parent and
/// gives an empty path.
pub fn relative_parent(path: &Path) -> PathBuf {
    path.parent()
        .map(|parent| {
            parent
                .components()
                .filter(|c| matches!(c, Component::Normal(_)))
                .collect()
        })
        .unwrap_or_default()
}

/// Joins `rel` onto `root`, returning `root` unchanged when `rel` is empty.
pub fn join_relative(root: &Path, rel: &Path) -> PathBuf {
    if rel.as_os_str().is_empty() {
        root.to_path_buf()
    } else {
        root.join(rel)
    }
}
