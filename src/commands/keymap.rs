//! Keyboard bindings
//!
//! Chords are an alternate trigger for toolbar intents. Every handled chord
//! has its default action prevented; anything else passes through.

use anyhow::{bail, Result};

use super::Intent;

/// Bindings in `Mod-key` notation, where `Mod` is Ctrl or Cmd
pub const BINDINGS: &[(&str, Intent)] = &[
    ("Mod-b", Intent::ToggleBold),
    ("Mod-i", Intent::ToggleItalic),
    ("Mod-u", Intent::ToggleUnderline),
    ("Mod-s", Intent::SaveNow),
    ("Mod-e", Intent::ExportHtml),
    ("Mod-z", Intent::Undo),
    ("Mod-Shift-z", Intent::Redo),
];

/// A key press as delivered by the host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: String,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
    default_prevented: bool,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    /// Parse a chord such as `ctrl+b`, `cmd+shift+z` or `s`
    pub fn parse(chord: &str) -> Result<Self> {
        let mut parts: Vec<&str> = chord.split('+').map(str::trim).collect();
        let key = match parts.pop() {
            Some(key) if !key.is_empty() => key,
            _ => bail!("missing key in chord '{}'", chord),
        };
        let mut event = KeyEvent::new(key);
        for modifier in parts {
            match modifier.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => event.ctrl = true,
                "cmd" | "meta" | "super" => event.meta = true,
                "shift" => event.shift = true,
                "alt" | "option" => event.alt = true,
                other => bail!("unknown modifier '{}' in chord '{}'", other, chord),
            }
        }
        Ok(event)
    }

    /// Suppress the host's native handling of this key
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

/// The intent bound to a key event, if any
pub fn binding(event: &KeyEvent) -> Option<Intent> {
    if !(event.ctrl || event.meta) || event.alt {
        return None;
    }
    let key = event.key.to_ascii_lowercase();
    match (key.as_str(), event.shift) {
        ("b", false) => Some(Intent::ToggleBold),
        ("i", false) => Some(Intent::ToggleItalic),
        ("u", false) => Some(Intent::ToggleUnderline),
        ("s", false) => Some(Intent::SaveNow),
        ("e", false) => Some(Intent::ExportHtml),
        ("z", false) => Some(Intent::Undo),
        ("z", true) => Some(Intent::Redo),
        _ => None,
    }
}
