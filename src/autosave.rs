//! Debounced Autosave
//!
//! Coalesces bursts of engine change events into a single persistence write
//! after a quiet period.
//!
//! States: `Idle`, `Pending(timer)` and, once torn down, `TornDown`.
//! A change cancels any pending timer and schedules a new one, so at most
//! one timer exists at any instant. The snapshot is read when the timer
//! fires, not when it is scheduled.
//!
//! Every storage touch (timer write, manual save, clear) runs under one save
//! gate, and a fired timer re-checks that it is still current once it holds
//! the gate. A write that lost the race to a manual save or a clear is
//! dropped instead of landing after it.
//!
//! The save gate is always taken first, never while the timer or engine
//! lock is held.

use std::sync::{Arc, Weak};
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::engine::{ListenerId, SharedEngine};
use crate::storage::{DocumentRecord, Persistence};

/// Quiet period before a burst of edits is written
pub const AUTOSAVE_DELAY: Duration = Duration::from_millis(400);

/// Observable controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutosaveState {
    Idle,
    Pending,
    TornDown,
}

enum TimerState {
    Idle,
    Pending { handle: JoinHandle<()>, generation: u64 },
    TornDown,
}

struct Timer {
    state: TimerState,
    /// Bumped on every schedule; a firing timer only saves if it is current
    generation: u64,
}

struct Inner {
    engine: SharedEngine,
    persistence: Persistence,
    delay: Duration,
    runtime: Handle,
    timer: Mutex<Timer>,
    /// Serializes snapshot-and-write against manual saves and clears
    save_gate: Mutex<()>,
    listener: Mutex<Option<ListenerId>>,
}

impl Inner {
    fn schedule(self: &Arc<Self>) {
        let mut timer = self.timer.lock();
        match std::mem::replace(&mut timer.state, TimerState::Idle) {
            TimerState::TornDown => {
                timer.state = TimerState::TornDown;
                return;
            }
            TimerState::Pending { handle, .. } => handle.abort(),
            TimerState::Idle => {}
        }

        timer.generation += 1;
        let generation = timer.generation;
        let weak: Weak<Inner> = Arc::downgrade(self);
        let delay = self.delay;
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.fire(generation);
            }
        });
        timer.state = TimerState::Pending { handle, generation };
    }

    fn fire(&self, generation: u64) {
        let _gate = self.save_gate.lock();
        {
            let mut timer = self.timer.lock();
            let current = matches!(
                timer.state,
                TimerState::Pending { generation: pending, .. } if pending == generation
            );
            if !current {
                log::debug!("Dropping superseded autosave");
                return;
            }
            timer.state = TimerState::Idle;
        }
        log::debug!("Autosave timer fired");
        self.write_snapshot();
    }

    /// Abort a pending timer; returns whether one was pending
    fn cancel(&self) -> bool {
        let mut timer = self.timer.lock();
        match std::mem::replace(&mut timer.state, TimerState::Idle) {
            TimerState::Pending { handle, .. } => {
                handle.abort();
                true
            }
            TimerState::TornDown => {
                timer.state = TimerState::TornDown;
                false
            }
            TimerState::Idle => false,
        }
    }

    /// Caller holds the save gate
    fn write_snapshot(&self) {
        // Engine lock is released before touching storage
        let html = self.engine.lock().get_html();
        self.persistence.save(&DocumentRecord::snapshot(html));
    }
}

/// Owns the single pending-save timer of one document session
pub struct AutosaveController {
    inner: Arc<Inner>,
}

impl AutosaveController {
    /// Subscribe to `engine` changes with the default delay.
    /// Must be called from within a tokio runtime.
    pub fn attach(engine: SharedEngine, persistence: Persistence) -> Result<Self> {
        Self::with_delay(engine, persistence, AUTOSAVE_DELAY)
    }

    pub fn with_delay(
        engine: SharedEngine,
        persistence: Persistence,
        delay: Duration,
    ) -> Result<Self> {
        let runtime = Handle::try_current().context("autosave requires a tokio runtime")?;
        let inner = Arc::new(Inner {
            engine: engine.clone(),
            persistence,
            delay,
            runtime,
            timer: Mutex::new(Timer {
                state: TimerState::Idle,
                generation: 0,
            }),
            save_gate: Mutex::new(()),
            listener: Mutex::new(None),
        });

        let weak = Arc::downgrade(&inner);
        let id = engine.lock().on_update(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.schedule();
            }
        }));
        *inner.listener.lock() = Some(id);

        Ok(Self { inner })
    }

    /// Record a change: restart the quiet period
    pub fn notify_change(&self) {
        self.inner.schedule();
    }

    /// Write the current content immediately, dropping any pending timer.
    /// Waits for a timer write already in progress, so this write lands last.
    /// Must not be called while holding the engine lock.
    pub fn save_now(&self) {
        let _gate = self.inner.save_gate.lock();
        if self.state() == AutosaveState::TornDown {
            log::debug!("Ignoring save after teardown");
            return;
        }
        if self.inner.cancel() {
            log::debug!("Manual save replaced a pending autosave");
        }
        self.inner.write_snapshot();
    }

    /// Drop any pending timer and remove the stored record. A timer write
    /// already in progress finishes first and cannot bring the record back.
    /// Must not be called while holding the engine lock.
    pub fn discard_saved(&self) {
        let _gate = self.inner.save_gate.lock();
        if self.inner.cancel() {
            log::debug!("Clear dropped a pending autosave");
        }
        self.inner.persistence.clear();
    }

    /// Drop any pending timer without saving
    pub fn cancel(&self) -> bool {
        self.inner.cancel()
    }

    pub fn state(&self) -> AutosaveState {
        match self.inner.timer.lock().state {
            TimerState::Idle => AutosaveState::Idle,
            TimerState::Pending { .. } => AutosaveState::Pending,
            TimerState::TornDown => AutosaveState::TornDown,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state() == AutosaveState::Pending
    }

    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// Cancel the pending timer without firing and stop listening.
    /// Idempotent. Must not be called while holding the engine lock.
    pub fn teardown(&self) {
        {
            let mut timer = self.inner.timer.lock();
            if let TimerState::Pending { handle, .. } =
                std::mem::replace(&mut timer.state, TimerState::TornDown)
            {
                handle.abort();
            }
        }
        if let Some(id) = self.inner.listener.lock().take() {
            self.inner.engine.lock().off_update(id);
        }
    }
}

impl Drop for AutosaveController {
    fn drop(&mut self) {
        self.teardown();
    }
}
