//! Clipboard access

use parking_lot::Mutex;

use crate::error::HostError;

pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: &str) -> Result<(), HostError>;
}

/// The desktop clipboard. The handle is opened on first use and kept open,
/// since some platforms drop the contents when it closes.
#[derive(Default)]
pub struct SystemClipboard {
    handle: Mutex<Option<arboard::Clipboard>>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

fn clipboard_error(err: arboard::Error) -> HostError {
    match err {
        arboard::Error::ClipboardNotSupported => HostError::PermissionDenied {
            surface: "clipboard",
        },
        other => HostError::Clipboard(other.to_string()),
    }
}

impl Clipboard for SystemClipboard {
    fn write_text(&self, text: &str) -> Result<(), HostError> {
        let mut handle = self.handle.lock();
        if handle.is_none() {
            *handle = Some(arboard::Clipboard::new().map_err(clipboard_error)?);
        }
        match handle.as_mut() {
            Some(clipboard) => clipboard.set_text(text).map_err(clipboard_error),
            None => Err(HostError::Clipboard("no clipboard handle".to_string())),
        }
    }
}

/// In-process clipboard; can simulate a host that denies access
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    contents: Mutex<Option<String>>,
    denied: bool,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn denied() -> Self {
        Self {
            denied: true,
            ..Self::default()
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.lock().clone()
    }
}

impl Clipboard for MemoryClipboard {
    fn write_text(&self, text: &str) -> Result<(), HostError> {
        if self.denied {
            return Err(HostError::PermissionDenied {
                surface: "clipboard",
            });
        }
        *self.contents.lock() = Some(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_clipboard_overwrites() {
        let clipboard = MemoryClipboard::new();
        clipboard.write_text("a").unwrap();
        clipboard.write_text("b").unwrap();

        assert_eq!(clipboard.contents().as_deref(), Some("b"));
    }

    #[test]
    fn test_denied_clipboard_keeps_nothing() {
        let clipboard = MemoryClipboard::denied();

        assert!(clipboard.write_text("a").unwrap_err().is_permission_denied());
        assert_eq!(clipboard.contents(), None);
    }
}
