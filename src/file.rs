//! External stream data files.
//!
//! A stream whose header has an `F` entry keeps its data in an external file. Documents
//! reach such files through a [`FileStore`], addressed by the file specification string
//! found in `F`.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Read/write access to external data files.
pub trait FileStore {
    /// Reads the whole content of the file named by `spec`.
    fn read(&self, spec: &str) -> Result<Vec<u8>>;

    /// Replaces the content of the file named by `spec`.
    fn write(&mut self, spec: &str, data: &[u8]) -> Result<()>;
}

/// In-memory file store, the default for new documents.
///
/// # Examples
///
/// ```rust
/// use pdf_cos::{FileStore, MemoryFileStore};
///
/// let mut store = MemoryFileStore::new();
/// store.write("data.bin", b"payload").unwrap();
/// assert_eq!(store.read("data.bin").unwrap(), b"payload");
/// assert!(store.read("missing.bin").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryFileStore {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryFileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a file.
    pub fn insert(&mut self, spec: &str, data: impl Into<Vec<u8>>) {
        self.files.insert(spec.to_string(), data.into());
    }

    #[must_use]
    pub fn contains(&self, spec: &str) -> bool {
        self.files.contains_key(spec)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FileStore for MemoryFileStore {
    fn read(&self, spec: &str) -> Result<Vec<u8>> {
        self.files
            .get(spec)
            .cloned()
            .ok_or_else(|| Error::Io(format!("file not found: {}", spec)))
    }

    fn write(&mut self, spec: &str, data: &[u8]) -> Result<()> {
        self.files.insert(spec.to_string(), data.to_vec());
        Ok(())
    }
}

/// File store rooted at a directory; file specifications are relative paths below it.
pub struct DirectoryFileStore {
    root: PathBuf,
}

impl DirectoryFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryFileStore { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, spec: &str) -> Result<PathBuf> {
        let relative = Path::new(spec);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(Error::Io(format!(
                "file specification escapes the store root: {}",
                spec
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl FileStore for DirectoryFileStore {
    fn read(&self, spec: &str) -> Result<Vec<u8>> {
        let path = self.path_of(spec)?;
        debug!(path = %path.display(), "reading external stream data");
        Ok(fs::read(path)?)
    }

    fn write(&mut self, spec: &str, data: &[u8]) -> Result<()> {
        let path = self.path_of(spec)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        debug!(path = %path.display(), bytes = data.len(), "writing external stream data");
        Ok(fs::write(path, data)?)
    }
}

impl fmt::Debug for DirectoryFileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryFileStore")
            .field("root", &self.root)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let mut store = MemoryFileStore::new();
        assert!(store.is_empty());
        store.insert("a", b"1".to_vec());
        store.write("b", b"2").unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.read("a").unwrap(), b"1");
        assert!(matches!(store.read("c"), Err(Error::Io(_))));
    }

    #[test]
    fn test_directory_store_roundtrip() {
        let root = std::env::temp_dir().join(format!("pdf_cos_store_{}", std::process::id()));
        let mut store = DirectoryFileStore::new(&root);
        store.write("nested/data.bin", b"bytes").unwrap();
        assert_eq!(store.read("nested/data.bin").unwrap(), b"bytes");
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_directory_store_rejects_escaping_paths() {
        let store = DirectoryFileStore::new("/tmp");
        assert!(store.read("../etc/passwd").is_err());
        assert!(store.read("/etc/passwd").is_err());
    }
}
