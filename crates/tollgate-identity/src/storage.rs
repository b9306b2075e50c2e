//! # Byte Store Seam
//!
//! The registry and issuer consume persistence through the [`Storage`]
//! trait: a path-addressed byte store assumed durable and immediately
//! consistent (read-after-write). Missing files are `Ok(None)` rather than
//! errors, because "not provisioned yet" is a normal state for every
//! artifact this crate manages.
//!
//! [`FsStorage`] is the production implementation, rooted at the wallet home
//! directory. [`MemoryStorage`] backs tests and lets an in-process seller
//! and agent share one identity universe.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

/// Errors from the byte store.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Filesystem failure.
    #[error("storage I/O error at {path}: {source}")]
    Io {
        /// The relative path the operation targeted.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    fn io(path: &str, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_string(),
            source,
        }
    }
}

/// A path-addressed byte store.
///
/// Paths are relative, `/`-separated, and opaque to implementations beyond
/// directory structure. Writes create missing parent directories.
pub trait Storage: Send + Sync {
    /// Read a file; `Ok(None)` when it does not exist.
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Write a file, creating parent directories as needed.
    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Write a file so that readers observe either the old or the new
    /// content, never a torn mixture (write-temp-then-rename).
    fn write_atomic(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// List the file names directly inside a directory; empty when the
    /// directory does not exist.
    fn list_dir(&self, dir: &str) -> Result<Vec<String>, StorageError>;

    /// Create a directory (and parents) if absent.
    fn ensure_dir(&self, dir: &str) -> Result<(), StorageError>;

    /// Delete a file; deleting a missing file is not an error.
    fn remove(&self, path: &str) -> Result<(), StorageError>;
}

/// Filesystem-backed store rooted at a home directory.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl Storage for FsStorage {
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match std::fs::read(self.resolve(path)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::io(path, e))?;
        }
        std::fs::write(&full, bytes).map_err(|e| StorageError::io(path, e))
    }

    fn write_atomic(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::io(path, e))?;
        }
        let tmp = full.with_extension("tmp");
        std::fs::write(&tmp, bytes).map_err(|e| StorageError::io(path, e))?;
        std::fs::rename(&tmp, &full).map_err(|e| StorageError::io(path, e))
    }

    fn list_dir(&self, dir: &str) -> Result<Vec<String>, StorageError> {
        let entries = match std::fs::read_dir(self.resolve(dir)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(dir, e)),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io(dir, e))?;
            if entry.path().is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn ensure_dir(&self, dir: &str) -> Result<(), StorageError> {
        std::fs::create_dir_all(self.resolve(dir)).map_err(|e| StorageError::io(dir, e))
    }

    fn remove(&self, path: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.resolve(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(path, e)),
        }
    }
}

/// In-memory store for tests and in-process sharing.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    files: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.files.read().get(path).cloned())
    }

    fn write(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.files.write().insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn write_atomic(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        // A map insert under the write lock is already all-or-nothing.
        self.write(path, bytes)
    }

    fn list_dir(&self, dir: &str) -> Result<Vec<String>, StorageError> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        Ok(self
            .files
            .read()
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(String::from)
            .collect())
    }

    fn ensure_dir(&self, _dir: &str) -> Result<(), StorageError> {
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<(), StorageError> {
        self.files.write().remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &dyn Storage) {
        assert_eq!(store.read("dids/missing.json").unwrap(), None);

        store.write("dids/a.json", b"{}").unwrap();
        assert_eq!(store.read("dids/a.json").unwrap().as_deref(), Some(&b"{}"[..]));

        store.write_atomic("dids/aliases.json", b"{\"agent\":\"x\"}").unwrap();
        assert!(store.read("dids/aliases.json").unwrap().is_some());

        store.write("dids/b.json", b"{}").unwrap();
        let mut listed = store.list_dir("dids").unwrap();
        listed.sort();
        assert_eq!(listed, vec!["a.json", "aliases.json", "b.json"]);

        store.remove("dids/a.json").unwrap();
        assert_eq!(store.read("dids/a.json").unwrap(), None);
        store.remove("dids/a.json").unwrap(); // idempotent

        assert!(store.list_dir("nowhere").unwrap().is_empty());
    }

    #[test]
    fn memory_storage_contract() {
        exercise(&MemoryStorage::new());
    }

    #[test]
    fn fs_storage_contract() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&FsStorage::new(dir.path()));
    }

    #[test]
    fn fs_atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStorage::new(dir.path());
        store.write_atomic("dids/aliases.json", b"{}").unwrap();
        let listed = store.list_dir("dids").unwrap();
        assert_eq!(listed, vec!["aliases.json"]);
    }

    #[test]
    fn memory_list_dir_excludes_nested_paths() {
        let store = MemoryStorage::new();
        store.write("vcs/email-1.json", b"{}").unwrap();
        store.write("vcs/nested/deep.json", b"{}").unwrap();
        assert_eq!(store.list_dir("vcs").unwrap(), vec!["email-1.json"]);
    }
}
