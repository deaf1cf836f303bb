//! Filesystem storage for uploaded files
//!
//! Uploads land under `<root>/uploads`. Writes go through a temp file and an
//! atomic rename so a crashed upload never leaves a half-written file behind.

use std::io::Write;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Filesystem store for raw uploaded documents
pub struct FileStore {
    root: PathBuf,
    uploads: PathBuf,
}

impl FileStore {
    /// Create the store, ensuring its directories exist
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let uploads = root.join("uploads");
        std::fs::create_dir_all(&uploads)?;
        Ok(Self { root, uploads })
    }

    /// Storage key for an uploaded filename, relative to the store root
    pub fn key_for(&self, filename: &str) -> String {
        format!("uploads/{}", filename)
    }

    /// Absolute path for a storage key
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Save uploaded bytes under the given filename, returning the storage key
    pub fn save(&self, filename: &str, contents: &[u8]) -> Result<String> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.uploads)?;
        tmp.write_all(contents)?;

        let final_path = self.uploads.join(filename);
        tmp.persist(&final_path)
            .map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved upload to {}", final_path.display());
        Ok(self.key_for(filename))
    }

    /// Read the bytes stored under a key
    pub fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key);
        std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(key.to_string())
            } else {
                Error::Io(e)
            }
        })
    }

    /// Remove the file stored under a key; missing files are not an error
    pub fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Walk the storage root and return the keys of all stored files,
    /// skipping dotfiles
    pub fn scan(&self) -> Vec<String> {
        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            if entry
                .file_name()
                .to_str()
                .map(|n| n.starts_with('.'))
                .unwrap_or(true)
            {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(&self.root) {
                if let Some(key) = rel.to_str() {
                    keys.push(key.to_string());
                }
            }
        }
        keys.sort();
        tracing::info!("Found {} stored files", keys.len());
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_read_remove_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        let key = store.save("doc1.txt", b"hello world").unwrap();
        assert_eq!(key, "uploads/doc1.txt");
        assert_eq!(store.read(&key).unwrap(), b"hello world");

        store.remove(&key).unwrap();
        assert!(matches!(store.read(&key), Err(Error::NotFound(_))));
        // removing again is a no-op
        store.remove(&key).unwrap();
    }

    #[test]
    fn save_overwrites_existing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        store.save("doc1.txt", b"v1").unwrap();
        let key = store.save("doc1.txt", b"v2").unwrap();
        assert_eq!(store.read(&key).unwrap(), b"v2");
    }

    #[test]
    fn scan_skips_dotfiles() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        store.save("a.txt", b"a").unwrap();
        store.save("b.md", b"b").unwrap();
        std::fs::write(dir.path().join("uploads/.hidden"), b"x").unwrap();

        let keys = store.scan();
        assert_eq!(keys, vec!["uploads/a.txt", "uploads/b.md"]);
    }
}
