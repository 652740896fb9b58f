//! Command Dispatch
//!
//! User intents (toolbar clicks, key chords) and their translation into
//! engine command chains.

pub mod dispatcher;
pub mod keymap;
pub mod prompt;

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde_json::{json, Value};

pub use dispatcher::{CommandDispatcher, ToolbarItem};
pub use keymap::KeyEvent;
pub use prompt::{LinkPrompt, PromptResponse, ScriptedPrompt, LINK_PROMPT_MESSAGE};

/// Heading levels reachable from the toolbar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeadingLevel {
    One,
    Two,
}

impl HeadingLevel {
    pub fn level(self) -> u8 {
        match self {
            HeadingLevel::One => 1,
            HeadingLevel::Two => 2,
        }
    }
}

/// A discrete user action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    ToggleBold,
    ToggleItalic,
    ToggleUnderline,
    ToggleStrike,
    ToggleHeading(HeadingLevel),
    ToggleBulletList,
    ToggleBlockquote,
    ToggleCodeBlock,
    Undo,
    Redo,
    SetLink,
    ClearDocument,
    SaveNow,
    ExportHtml,
    ExportMarkdown,
    CopyHtml,
    CopyJson,
    ToggleTheme,
}

impl Intent {
    /// Toolbar order
    pub const TOOLBAR: [Intent; 18] = [
        Intent::ToggleBold,
        Intent::ToggleItalic,
        Intent::ToggleUnderline,
        Intent::ToggleStrike,
        Intent::ToggleHeading(HeadingLevel::One),
        Intent::ToggleHeading(HeadingLevel::Two),
        Intent::ToggleBulletList,
        Intent::ToggleBlockquote,
        Intent::ToggleCodeBlock,
        Intent::SetLink,
        Intent::Undo,
        Intent::Redo,
        Intent::ClearDocument,
        Intent::SaveNow,
        Intent::ExportHtml,
        Intent::ExportMarkdown,
        Intent::CopyHtml,
        Intent::CopyJson,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Intent::ToggleBold => "bold",
            Intent::ToggleItalic => "italic",
            Intent::ToggleUnderline => "underline",
            Intent::ToggleStrike => "strike",
            Intent::ToggleHeading(HeadingLevel::One) => "h1",
            Intent::ToggleHeading(HeadingLevel::Two) => "h2",
            Intent::ToggleBulletList => "list",
            Intent::ToggleBlockquote => "quote",
            Intent::ToggleCodeBlock => "code",
            Intent::Undo => "undo",
            Intent::Redo => "redo",
            Intent::SetLink => "link",
            Intent::ClearDocument => "clear",
            Intent::SaveNow => "save",
            Intent::ExportHtml => "export-html",
            Intent::ExportMarkdown => "export-md",
            Intent::CopyHtml => "copy-html",
            Intent::CopyJson => "copy-json",
            Intent::ToggleTheme => "theme",
        }
    }

    /// The `is_active` query that highlights this intent's button
    pub fn active_query(self) -> Option<(&'static str, Option<Value>)> {
        match self {
            Intent::ToggleBold => Some(("bold", None)),
            Intent::ToggleItalic => Some(("italic", None)),
            Intent::ToggleUnderline => Some(("underline", None)),
            Intent::ToggleStrike => Some(("strike", None)),
            Intent::ToggleHeading(level) => {
                Some(("heading", Some(json!({ "level": level.level() }))))
            }
            Intent::ToggleBulletList => Some(("bulletList", None)),
            Intent::ToggleBlockquote => Some(("blockquote", None)),
            Intent::ToggleCodeBlock => Some(("codeBlock", None)),
            Intent::SetLink => Some(("link", None)),
            _ => None,
        }
    }

    /// Whether running this intent needs a prompt round trip
    pub fn needs_prompt(self) -> bool {
        self == Intent::SetLink
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Intent {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Intent::TOOLBAR
            .into_iter()
            .chain([Intent::ToggleTheme])
            .find(|intent| intent.name() == s)
            .ok_or_else(|| anyhow!("unknown command '{}'", s))
    }
}
