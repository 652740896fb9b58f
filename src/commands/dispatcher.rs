//! Command Dispatcher
//!
//! Every intent becomes one engine chain that starts by restoring focus.
//! Document-level intents (save, clear, export, theme) reach the autosave
//! controller, exporter and theme state it was built with.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::autosave::AutosaveController;
use crate::document::MarkKind;
use crate::engine::SharedEngine;
use crate::export::Exporter;
use crate::theme::{Presentation, Theme, ThemeState};

use super::keymap::{binding, KeyEvent};
use super::prompt::{LinkPrompt, PromptResponse, LINK_PROMPT_MESSAGE};
use super::Intent;

/// One toolbar button and whether it is highlighted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolbarItem {
    pub intent: Intent,
    pub active: bool,
}

pub struct CommandDispatcher {
    engine: SharedEngine,
    autosave: Arc<AutosaveController>,
    exporter: Exporter,
    theme: Mutex<ThemeState>,
    presentation: Arc<dyn Presentation>,
}

impl CommandDispatcher {
    pub fn new(
        engine: SharedEngine,
        autosave: Arc<AutosaveController>,
        exporter: Exporter,
        theme: ThemeState,
        presentation: Arc<dyn Presentation>,
    ) -> Self {
        Self {
            engine,
            autosave,
            exporter,
            theme: Mutex::new(theme),
            presentation,
        }
    }

    pub fn autosave(&self) -> &AutosaveController {
        &self.autosave
    }

    pub fn exporter(&self) -> &Exporter {
        &self.exporter
    }

    pub fn theme(&self) -> Theme {
        self.theme.lock().current()
    }

    /// Run any intent, asking `prompt` when the intent needs input
    pub async fn dispatch<P: LinkPrompt>(&self, intent: Intent, prompt: &P) -> bool {
        match intent {
            Intent::SetLink => self.set_link(prompt).await,
            other => self.run(other),
        }
    }

    /// Run an intent that needs no user input
    pub fn run(&self, intent: Intent) -> bool {
        log::debug!("Dispatching {}", intent);
        match intent {
            Intent::ToggleBold => self.engine.lock().chain().focus().toggle_bold().run(),
            Intent::ToggleItalic => self.engine.lock().chain().focus().toggle_italic().run(),
            Intent::ToggleUnderline => self.engine.lock().chain().focus().toggle_underline().run(),
            Intent::ToggleStrike => self.engine.lock().chain().focus().toggle_strike().run(),
            Intent::ToggleHeading(level) => self
                .engine
                .lock()
                .chain()
                .focus()
                .toggle_heading(level.level())
                .run(),
            Intent::ToggleBulletList => {
                self.engine.lock().chain().focus().toggle_bullet_list().run()
            }
            Intent::ToggleBlockquote => self.engine.lock().chain().focus().toggle_blockquote().run(),
            Intent::ToggleCodeBlock => self.engine.lock().chain().focus().toggle_code_block().run(),
            Intent::Undo => self.engine.lock().chain().focus().undo().run(),
            Intent::Redo => self.engine.lock().chain().focus().redo().run(),
            Intent::ClearDocument => self.clear_document(),
            Intent::SaveNow => {
                self.save_now();
                true
            }
            Intent::ExportHtml => self.exporter.export_html(),
            Intent::ExportMarkdown => self.exporter.export_markdown(),
            Intent::CopyHtml => self.exporter.copy_html(),
            Intent::CopyJson => self.exporter.copy_json(),
            Intent::ToggleTheme => {
                self.toggle_theme();
                true
            }
            Intent::SetLink => {
                log::debug!("Link intent needs a prompt; ignoring");
                false
            }
        }
    }

    /// Ask for a URL and apply it over the whole link under the selection.
    ///
    /// Cancelling changes nothing. An empty or blank answer removes the link.
    pub async fn set_link<P: LinkPrompt>(&self, prompt: &P) -> bool {
        let previous = self
            .engine
            .lock()
            .get_attributes(MarkKind::Link.name())
            .get("href")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let answer = prompt.request(LINK_PROMPT_MESSAGE, &previous).await;
        let PromptResponse::Submitted(value) = answer else {
            log::debug!("Link prompt cancelled");
            return false;
        };

        let url = value.trim();
        let mut engine = self.engine.lock();
        let chain = engine.chain().focus().extend_mark_range(MarkKind::Link);
        if url.is_empty() {
            chain.unset_link().run()
        } else {
            chain.set_link(url).run()
        }
    }

    /// Reset the document and forget the stored record. A debounced write
    /// scheduled or running before the clear cannot bring it back.
    pub fn clear_document(&self) -> bool {
        let cleared = self
            .engine
            .lock()
            .chain()
            .focus()
            .clear_content(false)
            .run();
        self.autosave.discard_saved();
        log::info!("Document cleared");
        cleared
    }

    /// Persist the current content now, replacing any pending autosave
    pub fn save_now(&self) {
        self.autosave.save_now();
        log::info!("Document saved");
    }

    pub fn toggle_theme(&self) -> Theme {
        self.theme.lock().toggle(self.presentation.as_ref())
    }

    /// Run the intent bound to `event`, preventing its default action.
    /// Returns the intent, or `None` when the key is not bound.
    pub fn handle_key(&self, event: &mut KeyEvent) -> Option<Intent> {
        let intent = binding(event)?;
        event.prevent_default();
        self.run(intent);
        Some(intent)
    }

    /// Highlight state of every toolbar button
    pub fn toolbar_state(&self) -> Vec<ToolbarItem> {
        let engine = self.engine.lock();
        let mut items: Vec<ToolbarItem> = Intent::TOOLBAR
            .into_iter()
            .map(|intent| ToolbarItem {
                intent,
                active: intent
                    .active_query()
                    .is_some_and(|(name, attrs)| engine.is_active(name, attrs.as_ref())),
            })
            .collect();
        items.push(ToolbarItem {
            intent: Intent::ToggleTheme,
            active: self.theme() == Theme::Dark,
        });
        items
    }
}
