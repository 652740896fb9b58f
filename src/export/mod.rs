//! Export Pipeline
//!
//! Reads the engine's content once per call and hands it to a host surface:
//! a file download (HTML, Markdown) or the clipboard (HTML, pretty JSON).
//! Host failures become notices; the document is never touched.

pub mod markdown;

use std::sync::Arc;

use crate::engine::SharedEngine;
use crate::error::HostError;
use crate::host::{Clipboard, DownloadSink, Notice, Notifier};

pub use crate::host::Artifact;
pub use markdown::html_to_markdown;

pub const HTML_FILENAME: &str = "document.html";
pub const HTML_MIME: &str = "text/html";
pub const MARKDOWN_FILENAME: &str = "document.md";
pub const MARKDOWN_MIME: &str = "text/markdown";

/// The current document as an HTML download
pub fn html_artifact(html: &str) -> Artifact {
    Artifact::new(HTML_FILENAME, HTML_MIME, html.as_bytes().to_vec())
}

/// The current document as a Markdown download
pub fn markdown_artifact(html: &str) -> Artifact {
    Artifact::new(
        MARKDOWN_FILENAME,
        MARKDOWN_MIME,
        html_to_markdown(html).into_bytes(),
    )
}

pub struct Exporter {
    engine: SharedEngine,
    downloads: Arc<dyn DownloadSink>,
    clipboard: Arc<dyn Clipboard>,
    notifier: Arc<dyn Notifier>,
}

impl Exporter {
    pub fn new(
        engine: SharedEngine,
        downloads: Arc<dyn DownloadSink>,
        clipboard: Arc<dyn Clipboard>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            engine,
            downloads,
            clipboard,
            notifier,
        }
    }

    fn current_html(&self) -> String {
        self.engine.lock().get_html()
    }

    /// Download `document.html`; returns whether it was delivered
    pub fn export_html(&self) -> bool {
        let artifact = html_artifact(&self.current_html());
        self.download(&artifact)
    }

    /// Download `document.md`; returns whether it was delivered
    pub fn export_markdown(&self) -> bool {
        let artifact = markdown_artifact(&self.current_html());
        self.download(&artifact)
    }

    /// Copy the raw HTML to the clipboard
    pub fn copy_html(&self) -> bool {
        let html = self.current_html();
        self.report("Copied HTML to clipboard", "copy HTML", self.clipboard.write_text(&html))
    }

    /// Copy the pretty-printed JSON tree to the clipboard
    pub fn copy_json(&self) -> bool {
        let json = self.engine.lock().get_json();
        let result = serde_json::to_string_pretty(&json)
            .map_err(HostError::from)
            .and_then(|text| self.clipboard.write_text(&text));
        self.report("Copied JSON to clipboard", "copy JSON", result)
    }

    fn download(&self, artifact: &Artifact) -> bool {
        match self.downloads.deliver(artifact) {
            Ok(location) => {
                self.notifier
                    .notify(Notice::info(format!("Saved {} to {}", artifact.filename, location)));
                true
            }
            Err(e) => {
                log::warn!("Export of {} failed: {}", artifact.filename, e);
                self.notifier.notify(Notice::warning(format!(
                    "Could not export {}: {}",
                    artifact.filename, e
                )));
                false
            }
        }
    }

    fn report(&self, success: &str, action: &str, result: Result<(), HostError>) -> bool {
        match result {
            Ok(()) => {
                log::info!("{}", success);
                self.notifier.notify(Notice::info(success));
                true
            }
            Err(e) => {
                log::warn!("Failed to {}: {}", action, e);
                self.notifier
                    .notify(Notice::warning(format!("Could not {}: {}", action, e)));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{share, MemoryEngine};
    use crate::host::{MemoryClipboard, MemoryDownloads, NoticeLevel, RecordingNotifier};

    struct Fixture {
        exporter: Exporter,
        downloads: Arc<MemoryDownloads>,
        clipboard: Arc<MemoryClipboard>,
        notices: Arc<RecordingNotifier>,
    }

    fn fixture(html: &str, downloads: MemoryDownloads, clipboard: MemoryClipboard) -> Fixture {
        let downloads = Arc::new(downloads);
        let clipboard = Arc::new(clipboard);
        let notices = Arc::new(RecordingNotifier::new());
        Fixture {
            exporter: Exporter::new(
                share(MemoryEngine::new(html)),
                downloads.clone(),
                clipboard.clone(),
                notices.clone(),
            ),
            downloads,
            clipboard,
            notices,
        }
    }

    #[test]
    fn test_export_html_is_passthrough() {
        let f = fixture("<p>Hi <em>there</em></p>", MemoryDownloads::new(), MemoryClipboard::new());

        assert!(f.exporter.export_html());
        let artifact = f.downloads.last().unwrap();
        assert_eq!(artifact.filename, "document.html");
        assert_eq!(artifact.mime, "text/html");
        assert_eq!(artifact.text(), "<p>Hi <em>there</em></p>");
    }

    #[test]
    fn test_export_markdown() {
        let f = fixture(
            "<h1>Title</h1><p><strong>bold</strong> text</p>",
            MemoryDownloads::new(),
            MemoryClipboard::new(),
        );

        assert!(f.exporter.export_markdown());
        let artifact = f.downloads.last().unwrap();
        assert_eq!(artifact.filename, "document.md");
        assert_eq!(artifact.mime, "text/markdown");
        assert_eq!(artifact.text(), "# Title\n\n**bold** text");
    }

    #[test]
    fn test_denied_download_is_a_notice() {
        let f = fixture("<p>x</p>", MemoryDownloads::denied(), MemoryClipboard::new());

        assert!(!f.exporter.export_html());
        assert_eq!(f.downloads.live_resources(), 0);
        let notices = f.notices.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Warning);
        assert!(notices[0].message.contains("denied"));
    }

    #[test]
    fn test_copy_json_is_pretty() {
        let f = fixture("<p>x</p>", MemoryDownloads::new(), MemoryClipboard::new());

        assert!(f.exporter.copy_json());
        let text = f.clipboard.contents().unwrap();
        assert!(text.contains("\n  \"type\": \"doc\""));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["content"][0]["content"][0]["text"], "x");
        assert!(f.downloads.delivered().is_empty());
    }

    #[test]
    fn test_copy_html() {
        let f = fixture("<p>x</p>", MemoryDownloads::new(), MemoryClipboard::new());

        assert!(f.exporter.copy_html());
        assert_eq!(f.clipboard.contents().as_deref(), Some("<p>x</p>"));
    }

    #[test]
    fn test_denied_clipboard_is_a_notice() {
        let f = fixture("<p>x</p>", MemoryDownloads::new(), MemoryClipboard::denied());

        assert!(!f.exporter.copy_html());
        assert!(!f.exporter.copy_json());
        let notices = f.notices.take();
        assert_eq!(notices.len(), 2);
        assert!(notices.iter().all(|n| n.level == NoticeLevel::Warning));
    }
}
