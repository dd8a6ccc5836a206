use color_eyre::Result;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Subdirectory holding downloaded data files
const FILES_DIR: &str = "files";

/// Registry of known cache files (removed by `clear_all`)
const CACHE_FILES: &[&str] = &["packbench.log"];

fn url_digest(url: &str) -> String {
    hex::encode(Sha256::digest(url.as_bytes()))
}

/// Manages the cache directory: downloaded pack files and the debug log
#[derive(Clone, Debug)]
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

    /// Create a CacheManager rooted at a custom directory (primarily for testing)
    pub fn with_dir(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get path to a specific cache file
    pub fn cache_file(&self, filename: &str) -> PathBuf {
        self.cache_dir.join(filename)
    }

    pub fn files_dir(&self) -> PathBuf {
        self.cache_dir.join(FILES_DIR)
    }

    /// Where a downloaded copy of `url` is kept, named by a digest of the URL.
    pub fn cached_download(&self, url: &str) -> PathBuf {
        self.files_dir().join(format!("{}.parquet", url_digest(url)))
    }

    /// Sidecar holding the validator (ETag or equivalent) of the cached copy.
    fn validator_file(&self, url: &str) -> PathBuf {
        self.files_dir().join(format!("{}.validator", url_digest(url)))
    }

    /// Validator recorded when `url` was last downloaded, if any.
    pub fn stored_validator(&self, url: &str) -> Option<String> {
        fs::read_to_string(self.validator_file(url))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Record the validator of a fresh download. `None` forgets any old one,
    /// so the next use downloads again.
    pub fn store_validator(&self, url: &str, validator: Option<&str>) -> Result<()> {
        let path = self.validator_file(url);
        match validator {
            Some(v) => fs::write(&path, v)?,
            None => {
                if path.exists() {
                    fs::remove_file(&path)?;
                }
            }
        }
        Ok(())
    }

    pub fn ensure_cache_dir(&self) -> Result<()> {
        if !self.cache_dir.exists() {
            fs::create_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }

    pub fn ensure_files_dir(&self) -> Result<PathBuf> {
        let dir = self.files_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }
        Ok(dir)
    }

    /// Remove all downloaded files and registered cache files
    pub fn clear_all(&self) -> Result<()> {
        let files = self.files_dir();
        if files.exists() {
            fs::remove_dir_all(&files)?;
        }
        for filename in CACHE_FILES {
            let file_path = self.cache_file(filename);
            if file_path.exists() {
                if let Err(e) = fs::remove_file(&file_path) {
                    eprintln!("Warning: Could not remove cache file {}: {}", filename, e);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cached_download_is_stable_and_flat() {
        let cache = CacheManager::with_dir(PathBuf::from("/tmp/pb"));
        let a = cache.cached_download("http://localhost:8080/data/p/releases_demo/data.parquet");
        let b = cache.cached_download("http://localhost:8080/data/p/releases_demo/data.parquet");
        assert_eq!(a, b);
        assert_eq!(a.parent(), Some(cache.files_dir().as_path()));
        assert!(a.extension().is_some_and(|e| e == "parquet"));
    }

    #[test]
    fn test_cached_download_names_do_not_collide() {
        let cache = CacheManager::with_dir(PathBuf::from("/tmp/pb"));
        assert_ne!(
            cache.cached_download("http://h/data/p/a_b/data.parquet"),
            cache.cached_download("http://h/data/p/a/b/data.parquet")
        );
    }

    #[test]
    fn test_validator_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::with_dir(dir.path().to_path_buf());
        cache.ensure_files_dir().unwrap();
        let url = "http://h/data/p/d/data.parquet";
        assert_eq!(cache.stored_validator(url), None);
        cache.store_validator(url, Some("\"abc\"")).unwrap();
        assert_eq!(cache.stored_validator(url).as_deref(), Some("\"abc\""));
        cache.store_validator(url, None).unwrap();
        assert_eq!(cache.stored_validator(url), None);
    }

    #[test]
    fn test_clear_all_removes_downloads() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::with_dir(dir.path().to_path_buf());
        let files = cache.ensure_files_dir().unwrap();
        fs::write(files.join("x.parquet"), b"data").unwrap();
        fs::write(cache.cache_file("packbench.log"), b"log").unwrap();
        cache.clear_all().unwrap();
        assert!(!files.exists());
        assert!(!cache.cache_file("packbench.log").exists());
    }
}
