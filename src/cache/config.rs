//! Where a cacher keeps its bucket files

use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// File extension used for bucket files unless configured otherwise
pub const DEFAULT_EXT: &str = ".cache";

/// Directory and file extension for a `Cacher`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacherConfig {
    dir: PathBuf,
    ext: String,
}

impl CacherConfig {
    /// Creates a config for `dir` with the default extension
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ext: DEFAULT_EXT.to_string(),
        }
    }

    /// Creates a config rooted at the per-user cache directory
    ///
    /// Uses `~/.cache/filecache/` on Linux, or the equivalent platform path.
    /// Returns `None` if no home directory can be determined.
    pub fn default_location() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "filecache")?;
        Some(Self::new(project_dirs.cache_dir()))
    }

    /// Replaces the bucket file extension
    pub fn with_ext(mut self, ext: impl Into<String>) -> Self {
        self.ext = ext.into();
        self
    }

    /// Returns the path of the file backing `bucket`
    pub fn bucket_path(&self, bucket: &str) -> PathBuf {
        self.dir.join(format!("{}{}", bucket, self.ext))
    }

    /// Directory holding one file per bucket
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Suffix appended to the bucket name to form its file name
    pub fn ext(&self) -> &str {
        &self.ext
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_path_uses_extension() {
        let config = CacherConfig::new("/var/cache/app");
        assert_eq!(
            config.bucket_path("users"),
            PathBuf::from("/var/cache/app/users.cache")
        );

        let config = config.with_ext(".db");
        assert_eq!(
            config.bucket_path("users"),
            PathBuf::from("/var/cache/app/users.db")
        );
    }

    #[test]
    fn test_default_location_mentions_project() {
        if let Some(config) = CacherConfig::default_location() {
            let path_str = config.dir.to_string_lossy();
            assert!(path_str.contains("filecache"));
            assert_eq!(config.ext, DEFAULT_EXT);
        }
        // Passes when no home directory exists (e.g. in CI)
    }
}
