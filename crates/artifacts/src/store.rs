//! Named artifact blobs under one directory.
//!
//! Writes go to a temporary sibling first and are renamed into place, so a
//! concurrent reader sees either the old artifact or the new one. Nothing
//! is ever deleted: older fallback artifacts stay where they are.

use crate::error::{ArtifactError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of a named artifact
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    pub fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path(name);
        if !path.is_file() {
            return Err(ArtifactError::NotFound {
                name: name.to_string(),
            });
        }
        fs::read(&path).map_err(|source| ArtifactError::Io {
            name: name.to_string(),
            source,
        })
    }

    pub fn write(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let io_err = |source| ArtifactError::Io {
            name: name.to_string(),
            source,
        };

        fs::create_dir_all(&self.root).map_err(io_err)?;
        let target = self.path(name);
        let tmp = self.path(&format!(".{name}.tmp"));
        fs::write(&tmp, bytes).map_err(io_err)?;
        fs::rename(&tmp, &target).map_err(io_err)?;

        debug!(artifact = name, bytes = bytes.len(), "Wrote artifact");
        Ok(())
    }

    pub fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let bytes = self.read(name)?;
        serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Json {
            name: name.to_string(),
            source,
        })
    }

    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value).map_err(|source| ArtifactError::Json {
            name: name.to_string(),
            source,
        })?;
        self.write(name, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("nested"));

        assert!(!store.exists("a.bin"));
        store.write("a.bin", b"hello").unwrap();
        assert!(store.exists("a.bin"));
        assert_eq!(store.read("a.bin").unwrap(), b"hello");
        // No temporary file is left behind
        assert!(!store.exists(".a.bin.tmp"));
    }

    #[test]
    fn test_overwrite_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.write_json("m.json", &vec![1, 2, 3]).unwrap();
        store.write_json("m.json", &vec![4]).unwrap();
        assert_eq!(store.read_json::<Vec<i32>>("m.json").unwrap(), vec![4]);
    }

    #[test]
    fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let err = store.read("nope.json").unwrap_err();
        assert!(err.is_not_found());
    }
}
