//! Download sinks
//!
//! Bytes are staged in a transient resource before being handed over. The
//! resource is released whether or not the handover succeeds.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tempfile::NamedTempFile;

use crate::error::HostError;

/// Give up on finding a free name after this many numbered variants
const MAX_NAME_ATTEMPTS: usize = 100;

/// A named, typed byte stream ready for download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub filename: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(filename: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Bytes as UTF-8 text, lossily
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Receives finished artifacts
pub trait DownloadSink: Send + Sync {
    /// Deliver `artifact`; returns where it ended up
    fn deliver(&self, artifact: &Artifact) -> Result<String, HostError>;
}

/// Writes downloads into a directory, numbering names that are taken
/// (`document.html`, `document (1).html`, ...).
#[derive(Debug, Clone)]
pub struct FileDownloads {
    dir: PathBuf,
}

impl FileDownloads {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// `document.html` -> `document (n).html`
fn numbered(filename: &str, n: usize) -> String {
    if n == 0 {
        return filename.to_string();
    }
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{} ({}).{}", stem, n, ext),
        _ => format!("{} ({})", filename, n),
    }
}

impl DownloadSink for FileDownloads {
    fn deliver(&self, artifact: &Artifact) -> Result<String, HostError> {
        fs::create_dir_all(&self.dir)?;

        // Dropping the staged file on any early return removes it
        let mut staged = NamedTempFile::new_in(&self.dir)?;
        staged.write_all(&artifact.bytes)?;
        staged.flush()?;

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let target = self.dir.join(numbered(&artifact.filename, attempt));
            match staged.persist_noclobber(&target) {
                Ok(_) => {
                    log::info!("Downloaded {} to {}", artifact.filename, target.display());
                    return Ok(target.display().to_string());
                }
                Err(e) if e.error.kind() == ErrorKind::AlreadyExists => staged = e.file,
                Err(e) => return Err(e.error.into()),
            }
        }
        Err(HostError::Download(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free name for {}", artifact.filename),
        )))
    }
}

/// Keeps downloads in memory; can simulate a host that refuses them
#[derive(Debug, Default)]
pub struct MemoryDownloads {
    delivered: Mutex<Vec<Artifact>>,
    live: AtomicUsize,
    denied: bool,
}

/// A staged blob, counted as live until dropped
struct Staged<'a> {
    live: &'a AtomicUsize,
}

impl<'a> Staged<'a> {
    fn new(live: &'a AtomicUsize) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self { live }
    }
}

impl Drop for Staged<'_> {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryDownloads {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose host denies every download
    pub fn denied() -> Self {
        Self {
            denied: true,
            ..Self::default()
        }
    }

    pub fn delivered(&self) -> Vec<Artifact> {
        self.delivered.lock().clone()
    }

    pub fn last(&self) -> Option<Artifact> {
        self.delivered.lock().last().cloned()
    }

    /// Staged resources not yet released
    pub fn live_resources(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl DownloadSink for MemoryDownloads {
    fn deliver(&self, artifact: &Artifact) -> Result<String, HostError> {
        let _staged = Staged::new(&self.live);
        if self.denied {
            return Err(HostError::PermissionDenied {
                surface: "download",
            });
        }
        self.delivered.lock().push(artifact.clone());
        Ok(format!("memory:{}", artifact.filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn artifact(body: &str) -> Artifact {
        Artifact::new("document.html", "text/html", body.as_bytes().to_vec())
    }

    #[test]
    fn test_numbered_names() {
        assert_eq!(numbered("document.md", 0), "document.md");
        assert_eq!(numbered("document.md", 2), "document (2).md");
        assert_eq!(numbered("README", 1), "README (1)");
        assert_eq!(numbered(".hidden", 1), ".hidden (1)");
    }

    #[test]
    fn test_file_downloads_never_overwrite() {
        let dir = TempDir::new().unwrap();
        let sink = FileDownloads::new(dir.path());

        let first = sink.deliver(&artifact("one")).unwrap();
        let second = sink.deliver(&artifact("two")).unwrap();

        assert!(first.ends_with("document.html"));
        assert!(second.ends_with("document (1).html"));
        assert_eq!(fs::read_to_string(dir.path().join("document.html")).unwrap(), "one");
        assert_eq!(
            fs::read_to_string(dir.path().join("document (1).html")).unwrap(),
            "two"
        );
        // No staged temp files left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_memory_downloads_release_on_denial() {
        let sink = MemoryDownloads::denied();
        let err = sink.deliver(&artifact("x")).unwrap_err();

        assert!(err.is_permission_denied());
        assert_eq!(sink.live_resources(), 0);
        assert!(sink.delivered().is_empty());
    }

    #[test]
    fn test_memory_downloads_keep_artifacts() {
        let sink = MemoryDownloads::new();
        sink.deliver(&artifact("x")).unwrap();

        assert_eq!(sink.last().unwrap().text(), "x");
        assert_eq!(sink.live_resources(), 0);
    }
}
