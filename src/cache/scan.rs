//! Bulk operations that work directly on the files in a cache directory
//!
//! These bypass the per-bucket stores entirely; callers are responsible for
//! dropping any in-memory state that the scan invalidates.

use std::fs;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use super::error::{CacheError, Result};

/// Sums the sizes of every regular file directly inside `dir`
pub fn total_size(dir: &Path) -> Result<u64> {
    let mut total = 0;
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if entry.file_type().is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

/// Deletes every file directly inside `dir` whose name ends with `ext` and
/// satisfies `filter`, stopping at the first failure.
///
/// Returns the number of files removed.
pub fn remove_matching<F>(dir: &Path, ext: &str, mut filter: F) -> Result<usize>
where
    F: FnMut(&str) -> bool,
{
    let mut removed = 0;
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }

        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if !name.ends_with(ext) || !filter(name) {
            continue;
        }

        fs::remove_file(entry.path()).map_err(|source| CacheError::Remove {
            path: entry.path().to_path_buf(),
            source,
        })?;
        debug!(target: "filecache", path = %entry.path().display(), "removed cache file");
        removed += 1;
    }
    Ok(removed)
}
