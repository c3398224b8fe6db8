use crate::data::{CacheError, PartitionStore};
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::warn;

const PARTITION_EXTENSION: &str = "json";

/// FileCache stores each cache partition as a JSON file in a results folder.
///
/// The layout is `{folder}/{partition_key}.json`; the partition key is the
/// agent name. Writes go to a sibling temporary file that is renamed into
/// place, so a reader never observes a half-written partition.
#[derive(Debug, Clone)]
pub struct FileCache {
    /// The root folder path for the cache (defaults to "results")
    folder: PathBuf,
}

impl FileCache {
    /// Creates a new FileCache instance
    ///
    /// # Arguments
    /// * `folder` - Optional root folder path. If None, defaults to "results"
    pub fn new(folder: Option<PathBuf>) -> Self {
        Self {
            folder: folder.unwrap_or_else(|| PathBuf::from("results")),
        }
    }

    /// Path format: `{folder}/{key}.json`
    fn partition_path(&self, key: &str) -> PathBuf {
        self.folder.join(format!("{}.{}", key, PARTITION_EXTENSION))
    }

    fn partition_files(&self) -> Result<Vec<PathBuf>, CacheError> {
        let entries = match fs::read_dir(&self.folder) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(CacheError::Directory {
                    path: self.folder.clone(),
                    source,
                });
            }
        };

        let mut files = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| CacheError::Directory {
                    path: self.folder.clone(),
                    source,
                })?
                .path();
            if path.is_file()
                && path.extension().and_then(|ext| ext.to_str()) == Some(PARTITION_EXTENSION)
            {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl PartitionStore for FileCache {
    fn load(&self, key: &str) -> Option<String> {
        let path = self.partition_path(key);

        match fs::read_to_string(&path) {
            Ok(contents) => Some(contents),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Unreadable cache partition {}: {}", path.display(), e);
                None
            }
        }
    }

    fn save(&self, key: &str, data: &str) -> Result<(), CacheError> {
        let persist = |source| CacheError::Persist {
            key: key.to_string(),
            source,
        };

        fs::create_dir_all(&self.folder).map_err(persist)?;

        let path = self.partition_path(key);
        let staging = self.folder.join(format!(".{}.{}.tmp", key, PARTITION_EXTENSION));
        fs::write(&staging, data).map_err(persist)?;
        fs::rename(&staging, &path).map_err(persist)?;

        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self
            .partition_files()?
            .iter()
            .filter_map(|path| path.file_stem().and_then(|stem| stem.to_str()))
            .map(str::to_string)
            .collect())
    }

    fn clear(&self) -> Result<(), CacheError> {
        for path in self.partition_files()? {
            fs::remove_file(&path).map_err(|source| CacheError::Directory {
                path: path.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_path_construction() {
        let cache = FileCache::new(Some(PathBuf::from("/tmp/cache")));
        let path = cache.partition_path("agent_v1");
        assert_eq!(path, PathBuf::from("/tmp/cache/agent_v1.json"));
    }

    #[test]
    fn test_load_save() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(Some(dir.path().join("results")));

        assert_eq!(cache.load("nonexistent"), None);

        cache.save("agent", "first").unwrap();
        assert_eq!(cache.load("agent"), Some("first".to_string()));

        cache.save("agent", "second").unwrap();
        assert_eq!(cache.load("agent"), Some("second".to_string()));
        assert!(!dir.path().join("results/.agent.json.tmp").exists());
    }

    #[test]
    fn test_keys_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(Some(dir.path().to_path_buf()));

        assert!(cache.keys().unwrap().is_empty());

        cache.save("b_agent", "{}").unwrap();
        cache.save("a_agent", "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "not a partition").unwrap();

        assert_eq!(cache.keys().unwrap(), vec!["a_agent", "b_agent"]);

        cache.clear().unwrap();
        assert!(cache.keys().unwrap().is_empty());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_missing_folder_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(Some(dir.path().join("never-created")));
        assert!(cache.keys().unwrap().is_empty());
        assert!(cache.clear().is_ok());
    }

    #[test]
    fn test_default_folder() {
        let cache = FileCache::new(None);
        assert_eq!(cache.folder, PathBuf::from("results"));
    }
}
