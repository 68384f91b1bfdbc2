//! Storage access module
//!
//! The pipeline never touches the filesystem directly. Directory listing,
//! file reads and output writes go through the [`Storage`] trait so the host
//! environment (or a test) decides where records live.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 dyn Storage (Arc)                    │
//! │  - Shared by the JobBuilder and every worker        │
//! │  - Synchronous; workers call it from blocking tasks │
//! │  - Listings are sorted by name                      │
//! └─────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                 LocalStorage (std::fs)               │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use sgfdb::storage::{LocalStorage, Storage};
//! use std::path::Path;
//!
//! let storage = LocalStorage::new();
//! for entry in storage.list_entries(Path::new("/data/sgfdb")).unwrap() {
//!     if entry.is_dir {
//!         println!("partition: {}", entry.name);
//!     }
//! }
//! ```

mod local;

pub use local::LocalStorage;

use crate::error::StorageResult;
use std::path::Path;

/// A single directory entry as returned by [`Storage::list_entries`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// File name (no directory component)
    pub name: String,

    /// Whether the entry is a directory
    pub is_dir: bool,
}

impl Entry {
    /// Create a file entry
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }

    /// Create a directory entry
    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
        }
    }

    /// Hidden entries start with the hidden-file marker
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with(crate::config::HIDDEN_MARKER)
    }
}

/// Synchronous enumeration/read/write capability supplied by the host
pub trait Storage: Send + Sync {
    /// List the entries of a directory, sorted by name
    fn list_entries(&self, path: &Path) -> StorageResult<Vec<Entry>>;

    /// Read a whole file
    fn read_file(&self, path: &Path) -> StorageResult<Vec<u8>>;

    /// Create a directory and any missing parents
    fn create_dir_all(&self, path: &Path) -> StorageResult<()>;

    /// Write a whole file, replacing any existing content
    fn write_file(&self, path: &Path, contents: &[u8]) -> StorageResult<()>;
}
