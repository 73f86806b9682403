//! Storage abstraction for the snapshot directory.
//!
//! # Data Flow
//! ```text
//! ConfStore::save()
//!     → read_file(lmConf-1.js)   (base snapshot)
//!     → write_file(lmConf-N.js)  (derived snapshot)
//!
//! Tests run against MemoryStorage; the daemon runs against OsStorage.
//! ```
//!
//! # Design Decisions
//! - Byte-oriented: the store owns parsing/serialization, storage owns I/O
//! - NotFound is a distinct variant so a missing base snapshot is reportable
//! - Implementations must be Send + Sync; the store is shared across tasks

pub mod memory;
pub mod os;

use std::path::{Path, PathBuf};

pub use memory::MemoryStorage;
pub use os::OsStorage;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested file or directory does not exist.
    #[error("{path} not found")]
    NotFound { path: PathBuf },

    /// The directory to create already exists.
    #[error("{path} already exists")]
    AlreadyExists { path: PathBuf },

    /// Any other I/O failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Byte-oriented access to the configuration directory.
pub trait Storage: Send + Sync {
    /// Read the full contents of a file.
    fn read_file(&self, path: &Path) -> Result<Vec<u8>, StorageError>;

    /// Write a file, replacing any existing contents.
    fn write_file(&self, path: &Path, data: &[u8]) -> Result<(), StorageError>;

    /// List the entry names of a directory (no recursion, no metadata).
    fn list_dir(&self, path: &Path) -> Result<Vec<String>, StorageError>;

    /// Create a directory.
    fn make_dir(&self, path: &Path) -> Result<(), StorageError>;
}
