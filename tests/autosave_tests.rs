//! Debounced autosave against a live engine
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use parking_lot::Mutex;
use richtext_editor::engine::share;
use richtext_editor::host::{LogNotifier, MemoryClipboard, MemoryDownloads};
use richtext_editor::storage::{DOCUMENT_KEY, KeyValueStore};
use richtext_editor::theme::RootClasses;
use richtext_editor::{
    AutosaveController, AutosaveState, Config, DocumentRecord, EditorSession, Intent,
    MemoryEngine, MemoryStore, Persistence, RichTextEngine, Services,
};
use tokio::time::{sleep, Instant};

struct Harness {
    engine: Arc<Mutex<MemoryEngine>>,
    store: Arc<MemoryStore>,
    persistence: Persistence,
    autosave: AutosaveController,
}

fn harness(html: &str) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let persistence = Persistence::new(store.clone());
    let engine = share(MemoryEngine::new(html));
    let autosave = AutosaveController::attach(engine.clone(), persistence.clone())
        .expect("attach autosave");
    Harness {
        engine,
        store,
        persistence,
        autosave,
    }
}

fn stored_html(h: &Harness) -> Option<String> {
    h.persistence.load().map(|record| record.content)
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_edits_produces_one_write_with_last_state() {
    let h = harness("<p></p>");

    for word in ["a", "b", "c", "d", "e"] {
        h.engine.lock().insert_text(word);
        sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(h.store.write_count(), 0);
    assert_eq!(h.autosave.state(), AutosaveState::Pending);

    sleep(Duration::from_millis(350)).await;
    assert_eq!(h.store.write_count(), 1);
    assert_eq!(stored_html(&h).as_deref(), Some("<p>abcde</p>"));
    assert_eq!(h.autosave.state(), AutosaveState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_nothing_is_written_before_the_quiet_period() {
    let h = harness("<p></p>");
    h.engine.lock().insert_text("x");

    sleep(Duration::from_millis(399)).await;
    assert_eq!(h.store.write_count(), 0);

    sleep(Duration::from_millis(2)).await;
    assert_eq!(h.store.write_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_manual_save_cancels_pending_write() {
    let h = harness("<p></p>");
    h.engine.lock().insert_text("draft");
    assert!(h.autosave.is_pending());

    h.autosave.save_now();
    assert_eq!(h.store.write_count(), 1);
    assert_eq!(h.autosave.state(), AutosaveState::Idle);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(h.store.write_count(), 1);
    assert_eq!(stored_html(&h).as_deref(), Some("<p>draft</p>"));
}

#[tokio::test(start_paused = true)]
async fn test_teardown_drops_pending_write() {
    let h = harness("<p></p>");
    h.engine.lock().insert_text("lost");

    h.autosave.teardown();
    h.autosave.teardown();
    assert_eq!(h.autosave.state(), AutosaveState::TornDown);

    sleep(Duration::from_secs(1)).await;
    assert_eq!(h.store.write_count(), 0);

    // No longer subscribed either
    h.engine.lock().insert_text("more");
    sleep(Duration::from_secs(1)).await;
    assert_eq!(h.store.write_count(), 0);
    assert!(h.store.get(DOCUMENT_KEY).unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_the_controller_tears_it_down() {
    let Harness {
        engine,
        store,
        autosave,
        ..
    } = harness("<p></p>");
    engine.lock().insert_text("x");
    drop(autosave);

    sleep(Duration::from_secs(1)).await;
    assert_eq!(store.write_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_selection_only_changes_do_not_schedule() {
    let h = harness("<p>text</p>");
    {
        let mut engine = h.engine.lock();
        engine.select_range(0, 0, 4);
        engine.chain().focus().run();
    }
    assert_eq!(h.autosave.state(), AutosaveState::Idle);

    sleep(Duration::from_secs(1)).await;
    assert_eq!(h.store.write_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_storage_failure_is_not_fatal() {
    let store = Arc::new(MemoryStore::read_only());
    let persistence = Persistence::new(store.clone());
    let engine = share(MemoryEngine::new("<p></p>"));
    let autosave = AutosaveController::attach(engine.clone(), persistence).unwrap();

    engine.lock().insert_text("x");
    sleep(Duration::from_secs(1)).await;

    assert_eq!(store.write_count(), 0);
    assert_eq!(autosave.state(), AutosaveState::Idle);
    assert_eq!(engine.lock().get_html(), "<p>x</p>");
}

/// Store whose first document write blocks, recording when writes start and end
struct StallingStore {
    inner: MemoryStore,
    stall: Duration,
    stalled: AtomicBool,
    log: Mutex<Vec<String>>,
}

impl StallingStore {
    fn new(stall: Duration) -> Self {
        Self {
            inner: MemoryStore::new(),
            stall,
            stalled: AtomicBool::new(false),
            log: Mutex::new(Vec::new()),
        }
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    fn stored_html(&self) -> Option<String> {
        let raw = self.inner.get(DOCUMENT_KEY).unwrap()?;
        Some(serde_json::from_str::<DocumentRecord>(&raw).unwrap().content)
    }

    /// Poll until `entry` shows up in the write log
    async fn wait_for(&self, entry: &str) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !self.log().iter().any(|seen| seen == entry) {
            assert!(Instant::now() < deadline, "never saw '{}' in {:?}", entry, self.log());
            sleep(Duration::from_millis(5)).await;
        }
    }
}

impl KeyValueStore for StallingStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if key != DOCUMENT_KEY {
            return self.inner.set(key, value);
        }
        let content = serde_json::from_str::<DocumentRecord>(value)?.content;
        self.log.lock().push(format!("start {}", content));
        if !self.stalled.swap(true, Ordering::SeqCst) {
            std::thread::sleep(self.stall);
        }
        self.inner.set(key, value)?;
        self.log.lock().push(format!("done {}", content));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.log.lock().push("remove".to_string());
        self.inner.remove(key)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_manual_save_lands_after_slow_timer_write() {
    let store = Arc::new(StallingStore::new(Duration::from_millis(300)));
    let engine = share(MemoryEngine::new("<p></p>"));
    let autosave = AutosaveController::with_delay(
        engine.clone(),
        Persistence::new(store.clone()),
        Duration::from_millis(20),
    )
    .unwrap();

    engine.lock().insert_text("old");
    store.wait_for("start <p>old</p>").await;

    engine.lock().insert_text(" new");
    autosave.save_now();
    assert_eq!(store.stored_html().as_deref(), Some("<p>old new</p>"));

    sleep(Duration::from_millis(100)).await;
    let log = store.log();
    assert_eq!(log[..2], ["start <p>old</p>", "done <p>old</p>"]);
    assert_eq!(log.last().map(String::as_str), Some("done <p>old new</p>"));
    assert_eq!(store.stored_html().as_deref(), Some("<p>old new</p>"));
    assert!(!autosave.is_pending());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_clear_waits_out_slow_timer_write() {
    let store = Arc::new(StallingStore::new(Duration::from_millis(300)));
    let services = || Services {
        store: store.clone(),
        downloads: Arc::new(MemoryDownloads::new()),
        clipboard: Arc::new(MemoryClipboard::new()),
        notifier: Arc::new(LogNotifier),
        presentation: Arc::new(RootClasses::new()),
    };
    let config = Config {
        autosave_delay: Duration::from_millis(20),
        ..Config::default()
    };

    let session = EditorSession::boot(&config, services()).unwrap();
    session.engine().lock().insert_text("old");
    store.wait_for("start <p>old</p>").await;

    assert!(session.dispatcher().run(Intent::ClearDocument));
    assert_eq!(store.stored_html(), None);

    sleep(Duration::from_millis(100)).await;
    assert_eq!(store.stored_html(), None);
    assert_eq!(store.log().last().map(String::as_str), Some("remove"));
    session.shutdown();

    let reloaded = EditorSession::boot(&config, services()).unwrap();
    assert!(!reloaded.restored());
    assert!(reloaded.shows_placeholder());
}
