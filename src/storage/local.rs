//! `std::fs` backed storage

use super::{Entry, Storage};
use crate::error::{StorageError, StorageResult};
use std::fs;
use std::path::Path;
use tracing::trace;

/// Storage over the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorage;

impl LocalStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Storage for LocalStorage {
    fn list_entries(&self, path: &Path) -> StorageResult<Vec<Entry>> {
        let read_dir = fs::read_dir(path).map_err(|e| StorageError::enumeration(path, &e))?;

        let mut entries = Vec::new();
        for dirent in read_dir {
            let dirent = dirent.map_err(|e| StorageError::enumeration(path, &e))?;
            // file_type() does not follow symlinks; a symlinked partition is
            // resolved with metadata() so it still counts as a directory
            let is_dir = match dirent.file_type() {
                Ok(ft) if ft.is_symlink() => dirent.path().is_dir(),
                Ok(ft) => ft.is_dir(),
                Err(e) => return Err(StorageError::enumeration(path, &e)),
            };
            entries.push(Entry {
                name: dirent.file_name().to_string_lossy().into_owned(),
                is_dir,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        trace!(path = %path.display(), count = entries.len(), "Listed directory");
        Ok(entries)
    }

    fn read_file(&self, path: &Path) -> StorageResult<Vec<u8>> {
        fs::read(path).map_err(|e| StorageError::read(path, &e))
    }

    fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        fs::create_dir_all(path).map_err(|e| StorageError::CreateDirFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> StorageResult<()> {
        fs::write(path, contents).map_err(|e| StorageError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_list_entries_sorted() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("b")).unwrap();
        fs::create_dir(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("c.sgf"), b"(;)").unwrap();

        let entries = LocalStorage::new().list_entries(dir.path()).unwrap();
        assert_eq!(
            entries,
            vec![Entry::dir("a"), Entry::dir("b"), Entry::file("c.sgf")]
        );
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempdir().unwrap();
        let err = LocalStorage::new()
            .list_entries(&dir.path().join("nope"))
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new();
        let out = dir.path().join("x/y");
        storage.create_dir_all(&out).unwrap();
        storage.write_file(&out.join("g.sgf"), b"(;GM[1])").unwrap();
        assert_eq!(storage.read_file(&out.join("g.sgf")).unwrap(), b"(;GM[1])");
    }

    #[test]
    fn test_hidden_entries() {
        assert!(Entry::dir(".git").is_hidden());
        assert!(!Entry::dir("1980").is_hidden());
    }
}
