//====================================================================

use std::path::Path;

use serde::{Deserialize, Serialize};

//====================================================================

#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error(transparent)]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

//====================================================================

// The on-disk record of what the sandbox holds: the application version the
// cache was written under, plus the file names of fully downloaded bundles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchCache {
    pub cache_app_version: String,
    cached_files: Vec<String>,
}

impl PatchCache {
    pub fn new(app_version: impl Into<String>) -> Self {
        Self {
            cache_app_version: app_version.into(),
            cached_files: Vec::new(),
        }
    }

    pub fn load_file(path: &Path) -> Result<Self, CacheError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save_file(&self, path: &Path) -> Result<(), CacheError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    #[inline]
    pub fn set_app_version(&mut self, app_version: impl Into<String>) {
        self.cache_app_version = app_version.into();
    }

    #[inline]
    pub fn contains(&self, file_name: &str) -> bool {
        self.cached_files.iter().any(|name| name == file_name)
    }

    pub fn record(&mut self, file_name: impl Into<String>) -> bool {
        let file_name = file_name.into();
        match self.contains(&file_name) {
            true => false,
            false => {
                self.cached_files.push(file_name);
                true
            }
        }
    }

    // Deletes every recorded bundle file and forgets the records.
    pub fn clear_cache_files(&mut self, cache_dir: &Path) {
        for file_name in self.cached_files.drain(..) {
            let path = cache_dir.join(&file_name);
            if let Err(error) = std::fs::remove_file(&path) {
                log::warn!("Failed to delete cached file {:?}: {}", path, error);
            }
        }
    }
}

//====================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_lookup() {
        let mut cache = PatchCache::new("1.0.0");

        assert!(cache.record("aabbcc.bundle"));
        assert!(!cache.record("aabbcc.bundle"));
        assert!(cache.contains("aabbcc.bundle"));
        assert!(!cache.contains("missing.bundle"));
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let mut cache = PatchCache::new("1.0.0");
        cache.record("aabbcc.bundle");
        cache.save_file(&path).unwrap();

        let loaded = PatchCache::load_file(&path).unwrap();
        assert_eq!(loaded.cache_app_version, "1.0.0");
        assert!(loaded.contains("aabbcc.bundle"));
    }

    #[test]
    fn clear_removes_files_and_records() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("aabbcc.bundle"), b"data").unwrap();

        let mut cache = PatchCache::new("1.0.0");
        cache.record("aabbcc.bundle");
        cache.clear_cache_files(dir.path());

        assert!(!cache.contains("aabbcc.bundle"));
        assert!(!dir.path().join("aabbcc.bundle").exists());
    }
}

//====================================================================
