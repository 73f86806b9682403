//! Storage implementation backed by the local filesystem.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::storage::{Storage, StorageError};

/// `Storage` implementation over `std::fs`.
#[derive(Debug, Default, Clone)]
pub struct OsStorage;

impl OsStorage {
    pub fn new() -> Self {
        Self
    }
}

fn map_err(path: &Path, err: std::io::Error) -> StorageError {
    match err.kind() {
        ErrorKind::NotFound => StorageError::NotFound {
            path: path.to_path_buf(),
        },
        ErrorKind::AlreadyExists => StorageError::AlreadyExists {
            path: path.to_path_buf(),
        },
        _ => StorageError::Io {
            path: path.to_path_buf(),
            source: err,
        },
    }
}

impl Storage for OsStorage {
    fn read_file(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        fs::read(path).map_err(|e| map_err(path, e))
    }

    fn write_file(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        fs::write(path, data).map_err(|e| map_err(path, e))
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>, StorageError> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).map_err(|e| map_err(path, e))? {
            let entry = entry.map_err(|e| map_err(path, e))?;
            entries.push(entry.file_name().to_string_lossy().into_owned());
        }
        entries.sort();
        Ok(entries)
    }

    fn make_dir(&self, path: &Path) -> Result<(), StorageError> {
        fs::create_dir(path).map_err(|e| map_err(path, e))
    }
}
