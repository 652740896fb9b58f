//! Editor Session
//!
//! Boot sequence: load the stored record (or the placeholder), seed the
//! engine with it, attach autosave, initialise the theme and build the
//! dispatcher over all of it.

use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;

use crate::autosave::AutosaveController;
use crate::commands::CommandDispatcher;
use crate::config::Config;
use crate::engine::{share, MemoryEngine, SharedEngine};
use crate::export::Exporter;
use crate::host::{
    Clipboard, DownloadSink, FileDownloads, LogNotifier, MemoryClipboard, MemoryDownloads,
    Notifier, SystemClipboard,
};
use crate::storage::{FileStore, KeyValueStore, MemoryStore, Persistence};
use crate::theme::{Presentation, RootClasses, ThemeState};

/// Content of an empty editor: one empty paragraph
pub const PLACEHOLDER_HTML: &str = "<p></p>";

/// Hint shown over the empty document; never part of the content
pub const PLACEHOLDER_HINT: &str = "Start writing...";

/// Host collaborators of a session
pub struct Services {
    pub store: Arc<dyn KeyValueStore>,
    pub downloads: Arc<dyn DownloadSink>,
    pub clipboard: Arc<dyn Clipboard>,
    pub notifier: Arc<dyn Notifier>,
    pub presentation: Arc<dyn Presentation>,
}

impl Services {
    /// Everything in memory; nothing touches the machine
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            downloads: Arc::new(MemoryDownloads::new()),
            clipboard: Arc::new(MemoryClipboard::new()),
            notifier: Arc::new(LogNotifier),
            presentation: Arc::new(RootClasses::new()),
        }
    }

    /// Durable services rooted at the configured directories
    pub fn from_config(config: &Config) -> Self {
        let store: Arc<dyn KeyValueStore> = if config.ephemeral {
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(FileStore::new(&config.data_dir, &config.origin))
        };
        Self {
            store,
            downloads: Arc::new(FileDownloads::new(&config.download_dir)),
            clipboard: Arc::new(SystemClipboard::new()),
            notifier: Arc::new(LogNotifier),
            presentation: Arc::new(RootClasses::new()),
        }
    }
}

pub struct EditorSession {
    engine: Arc<Mutex<MemoryEngine>>,
    persistence: Persistence,
    dispatcher: CommandDispatcher,
    restored: bool,
}

impl EditorSession {
    /// Start a session. Must be called from within a tokio runtime.
    pub fn boot(config: &Config, services: Services) -> Result<Self> {
        let persistence = Persistence::new(services.store);
        let record = persistence.load();
        let restored = record.is_some();
        let initial = record
            .as_ref()
            .map_or(PLACEHOLDER_HTML, |record| record.content.as_str());
        if restored {
            log::info!("Restored document saved at {}", record.as_ref().map_or(0, |r| r.saved_at));
        } else {
            log::info!("No stored document, starting empty");
        }

        let engine = share(MemoryEngine::new(initial));
        let shared: SharedEngine = engine.clone();
        let autosave = AutosaveController::with_delay(
            shared.clone(),
            persistence.clone(),
            config.autosave_delay,
        )?;
        let theme = ThemeState::init(persistence.clone(), services.presentation.as_ref());
        let exporter = Exporter::new(
            shared.clone(),
            services.downloads,
            services.clipboard,
            services.notifier,
        );
        let dispatcher = CommandDispatcher::new(
            shared,
            Arc::new(autosave),
            exporter,
            theme,
            services.presentation,
        );

        Ok(Self {
            engine,
            persistence,
            dispatcher,
            restored,
        })
    }

    /// Concrete engine handle for host-side editing
    pub fn engine(&self) -> &Arc<Mutex<MemoryEngine>> {
        &self.engine
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn persistence(&self) -> &Persistence {
        &self.persistence
    }

    /// Whether the session started from a stored record
    pub fn restored(&self) -> bool {
        self.restored
    }

    /// Whether the editor shows the placeholder hint
    pub fn shows_placeholder(&self) -> bool {
        let engine = self.engine.lock();
        let doc = engine.document();
        doc.textblock_count() == 1 && doc.textblocks().iter().all(|tb| tb.is_empty())
    }

    /// Tear down autosave without flushing
    pub fn shutdown(self) {
        self.dispatcher.autosave().teardown();
        log::debug!("Session closed");
    }
}
