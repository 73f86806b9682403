//! In-memory storage used by unit tests and dry runs.
//!
//! Keeps a flat path → bytes map behind one lock plus a set of known
//! directories, enough to satisfy the `Storage` contract without touching
//! the real filesystem. A write counter is maintained so tests can assert
//! how many snapshot writes actually happened.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::storage::{Storage, StorageError};

#[derive(Debug, Default)]
struct State {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
    writes: u64,
}

/// Thread-safe in-memory `Storage` implementation.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    state: Arc<Mutex<State>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `write_file` calls that succeeded so far.
    pub fn write_count(&self) -> u64 {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).writes
    }

    /// Whether a file exists at `path`.
    pub fn contains(&self, path: &Path) -> bool {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .files
            .contains_key(path)
    }
}

impl Storage for MemoryStorage {
    fn read_file(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                path: path.to_path_buf(),
            })
    }

    fn write_file(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.files.insert(path.to_path_buf(), data.to_vec());
        state.writes += 1;
        Ok(())
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>, StorageError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.dirs.contains(path) && !state.files.keys().any(|f| f.parent() == Some(path)) {
            return Err(StorageError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let entries = state
            .files
            .keys()
            .filter(|f| f.parent() == Some(path))
            .filter_map(|f| f.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        Ok(entries)
    }

    fn make_dir(&self, path: &Path) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.dirs.insert(path.to_path_buf()) {
            return Err(StorageError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_and_count() {
        let storage = MemoryStorage::new();
        let path = Path::new("/conf/lmConf-1.js");

        assert!(matches!(
            storage.read_file(path),
            Err(StorageError::NotFound { .. })
        ));

        storage.write_file(path, b"{}").unwrap();
        assert_eq!(storage.read_file(path).unwrap(), b"{}");
        assert_eq!(storage.write_count(), 1);

        storage.write_file(path, b"{ }").unwrap();
        assert_eq!(storage.write_count(), 2);
    }

    #[test]
    fn test_list_dir() {
        let storage = MemoryStorage::new();
        storage.make_dir(Path::new("/conf")).unwrap();
        assert!(storage.list_dir(Path::new("/conf")).unwrap().is_empty());

        storage
            .write_file(Path::new("/conf/lmConf-1.js"), b"{}")
            .unwrap();
        storage
            .write_file(Path::new("/conf/lmConf-2.js"), b"{}")
            .unwrap();
        assert_eq!(
            storage.list_dir(Path::new("/conf")).unwrap(),
            vec!["lmConf-1.js", "lmConf-2.js"]
        );

        assert!(matches!(
            storage.list_dir(Path::new("/absent")),
            Err(StorageError::NotFound { .. })
        ));
    }

    #[test]
    fn test_make_dir_twice() {
        let storage = MemoryStorage::new();
        storage.make_dir(Path::new("/conf")).unwrap();
        assert!(matches!(
            storage.make_dir(Path::new("/conf")),
            Err(StorageError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn test_clone_shares_state() {
        let storage = MemoryStorage::new();
        let other = storage.clone();
        storage.write_file(Path::new("/a"), b"x").unwrap();
        assert!(other.contains(Path::new("/a")));
    }
}
