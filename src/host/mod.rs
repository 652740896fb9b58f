//! Host Surfaces
//!
//! What the environment around the editor provides: file downloads, the
//! system clipboard and a way to tell the user about non-fatal failures.

pub mod clipboard;
pub mod download;
pub mod notice;

pub use clipboard::{Clipboard, MemoryClipboard, SystemClipboard};
pub use download::{Artifact, DownloadSink, FileDownloads, MemoryDownloads};
pub use notice::{LogNotifier, Notice, NoticeLevel, Notifier, RecordingNotifier};
