//! File-backed key-value store
//!
//! One file per key under `<root>/<origin>/`. Writes go through a temp file
//! in the same directory and are renamed into place.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use super::KeyValueStore;

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Store scoped to `origin` under `root`. The directory is created lazily.
    pub fn new(root: impl AsRef<Path>, origin: &str) -> Self {
        Self {
            dir: root.as_ref().join(sanitize(origin)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(sanitize(key))
    }
}

/// Map a key or origin to a safe file name
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.trim_start_matches('.') {
        "" => "_".to_string(),
        rest => rest.to_string(),
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;

        let path = self.path_for(key);
        let mut temp = NamedTempFile::new_in(&self.dir)?;
        temp.write_all(value.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(&path)
            .with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_get_remove() {
        let root = TempDir::new().unwrap();
        let store = FileStore::new(root.path(), "localhost:5173");

        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v1").unwrap();
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));

        store.remove("k").unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_origins_are_isolated() {
        let root = TempDir::new().unwrap();
        let a = FileStore::new(root.path(), "https://a.example");
        let b = FileStore::new(root.path(), "https://b.example");

        a.set("k", "a").unwrap();
        assert_eq!(b.get("k").unwrap(), None);
        assert_ne!(a.dir(), b.dir());
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("text-editor-doc-v1"), "text-editor-doc-v1");
        assert_eq!(sanitize("http://x:80"), "http___x_80");
        assert_eq!(sanitize("../etc"), "_etc");
        assert_eq!(sanitize(""), "_");
    }
}
