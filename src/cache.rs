use color_eyre::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Log file kept in the cache directory.
pub const LOG_FILE: &str = "csvflow.log";

/// Manages the cache directory (log file and scratch data)
#[derive(Clone)]
pub struct CacheManager {
    pub(crate) cache_dir: PathBuf,
}

impl CacheManager {
    /// Create a new CacheManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| color_eyre::eyre::eyre!("Could not determine cache directory"))?
            .join(app_name);

        Ok(Self { cache_dir })
    }

    /// Cache manager rooted at an explicit directory (tests, portable installs)
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn cache_file(&self, filename: &str) -> PathBuf {
        self.cache_dir.join(filename)
    }

    pub fn ensure_cache_dir(&self) -> Result<()> {
        if !self.cache_dir.exists() {
            fs::create_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }

    pub fn log_path(&self) -> PathBuf {
        self.cache_file(LOG_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_path_inside_cache_dir() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::with_dir(dir.path().join("csvflow"));
        cache.ensure_cache_dir().unwrap();
        assert!(cache.cache_dir().is_dir());
        assert_eq!(cache.log_path(), dir.path().join("csvflow").join(LOG_FILE));
    }
}
