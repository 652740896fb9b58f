//! Rich-text Editor Core
//!
//! A document editing session with debounced autosave and export.
//!
//! This library provides:
//! - A rich-text engine over a paragraph/heading/list/quote/code document
//! - Key-value persistence of the document and theme
//! - Command dispatch for toolbar and keyboard intents
//! - HTML, Markdown and JSON export

pub mod autosave;
pub mod commands;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod export;
pub mod host;
pub mod html;
pub mod session;
pub mod shell;
pub mod storage;
pub mod theme;

// Re-exports for clean public API
pub use autosave::{AutosaveController, AutosaveState, AUTOSAVE_DELAY};
pub use commands::{CommandDispatcher, Intent, KeyEvent, LinkPrompt, PromptResponse};
pub use config::Config;
pub use document::Document;
pub use engine::{MemoryEngine, RichTextEngine, SharedEngine};
pub use error::HostError;
pub use export::{html_to_markdown, Exporter};
pub use session::{EditorSession, Services, PLACEHOLDER_HTML};
pub use storage::{DocumentRecord, KeyValueStore, MemoryStore, Persistence};
pub use theme::{Theme, ThemeState};
