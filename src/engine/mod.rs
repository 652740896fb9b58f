//! Rich-Text Engine Boundary
//!
//! The editor core only talks to the document through this trait: serialised
//! snapshots, command chains, state queries and change notification.

pub mod memory;

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::document::MarkKind;

pub use memory::MemoryEngine;

/// Callback fired after every transaction that changed the document
pub type UpdateListener = Box<dyn Fn() + Send + Sync>;

/// Attributes of a mark or node, keyed by attribute name
pub type Attributes = Map<String, Value>;

/// Handle returned by `on_update`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// An engine shared between the dispatcher, autosave and the host
pub type SharedEngine = Arc<Mutex<dyn RichTextEngine>>;

/// Wrap an engine for sharing. The result coerces to `SharedEngine`
/// while the caller keeps concrete access.
pub fn share<E: RichTextEngine + 'static>(engine: E) -> Arc<Mutex<E>> {
    Arc::new(Mutex::new(engine))
}

/// A single step of a command chain
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    /// Restore editing focus
    Focus,
    /// Toggle an attribute-free mark on the selection
    ToggleMark(MarkKind),
    ToggleHeading { level: u8 },
    ToggleBulletList,
    ToggleBlockquote,
    ToggleCodeBlock,
    Undo,
    Redo,
    /// Grow the selection to the full span carrying the mark
    ExtendMarkRange(MarkKind),
    SetLink { href: String },
    UnsetLink,
    /// Reset to an empty document
    ClearContent { emit_update: bool },
}

/// The external rich-text engine
pub trait RichTextEngine: Send {
    /// Canonical HTML of the current document
    fn get_html(&self) -> String;

    /// Structural JSON of the current document
    fn get_json(&self) -> Value;

    /// Run a chain of commands as one transaction.
    ///
    /// Returns false, leaving the document untouched, if any step fails.
    fn run(&mut self, commands: &[EngineCommand]) -> bool;

    /// Start building a command chain
    fn chain(&mut self) -> Chain<'_>;

    /// Whether a mark or node is active at the selection
    fn is_active(&self, name: &str, attrs: Option<&Value>) -> bool;

    /// Attributes of the named mark or node at the selection (empty if absent)
    fn get_attributes(&self, name: &str) -> Attributes;

    /// Subscribe to document changes
    fn on_update(&mut self, listener: UpdateListener) -> ListenerId;

    /// Unsubscribe; returns whether the listener was registered
    fn off_update(&mut self, id: ListenerId) -> bool;
}

/// Fluent builder for an atomic command chain
pub struct Chain<'a> {
    engine: &'a mut dyn RichTextEngine,
    commands: Vec<EngineCommand>,
}

impl<'a> Chain<'a> {
    pub fn new(engine: &'a mut dyn RichTextEngine) -> Self {
        Self {
            engine,
            commands: Vec::new(),
        }
    }

    fn push(mut self, command: EngineCommand) -> Self {
        self.commands.push(command);
        self
    }

    pub fn focus(self) -> Self {
        self.push(EngineCommand::Focus)
    }

    pub fn toggle_mark(self, kind: MarkKind) -> Self {
        self.push(EngineCommand::ToggleMark(kind))
    }

    pub fn toggle_bold(self) -> Self {
        self.toggle_mark(MarkKind::Bold)
    }

    pub fn toggle_italic(self) -> Self {
        self.toggle_mark(MarkKind::Italic)
    }

    pub fn toggle_underline(self) -> Self {
        self.toggle_mark(MarkKind::Underline)
    }

    pub fn toggle_strike(self) -> Self {
        self.toggle_mark(MarkKind::Strike)
    }

    pub fn toggle_heading(self, level: u8) -> Self {
        self.push(EngineCommand::ToggleHeading { level })
    }

    pub fn toggle_bullet_list(self) -> Self {
        self.push(EngineCommand::ToggleBulletList)
    }

    pub fn toggle_blockquote(self) -> Self {
        self.push(EngineCommand::ToggleBlockquote)
    }

    pub fn toggle_code_block(self) -> Self {
        self.push(EngineCommand::ToggleCodeBlock)
    }

    pub fn undo(self) -> Self {
        self.push(EngineCommand::Undo)
    }

    pub fn redo(self) -> Self {
        self.push(EngineCommand::Redo)
    }

    pub fn extend_mark_range(self, kind: MarkKind) -> Self {
        self.push(EngineCommand::ExtendMarkRange(kind))
    }

    pub fn set_link(self, href: impl Into<String>) -> Self {
        self.push(EngineCommand::SetLink { href: href.into() })
    }

    pub fn unset_link(self) -> Self {
        self.push(EngineCommand::UnsetLink)
    }

    pub fn clear_content(self, emit_update: bool) -> Self {
        self.push(EngineCommand::ClearContent { emit_update })
    }

    /// The queued commands, in order
    pub fn commands(&self) -> &[EngineCommand] {
        &self.commands
    }

    /// Execute the chain
    pub fn run(self) -> bool {
        self.engine.run(&self.commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_collects_commands_in_order() {
        let mut engine = MemoryEngine::new("<p>x</p>");
        let chain = engine.chain().focus().extend_mark_range(MarkKind::Link).set_link("a");

        assert_eq!(
            chain.commands(),
            &[
                EngineCommand::Focus,
                EngineCommand::ExtendMarkRange(MarkKind::Link),
                EngineCommand::SetLink { href: "a".into() },
            ]
        );
    }

    #[test]
    fn test_shared_engine_is_usable_as_trait_object() {
        let shared: SharedEngine = share(MemoryEngine::new("<p>x</p>"));
        assert_eq!(shared.lock().get_html(), "<p>x</p>");
    }
}
