//! Save coordination
//!
//! Serializes every save request against the single external document file.
//! `request_save` is always non-blocking: while a write is in flight, at
//! most one pending request is remembered and replayed once, so bursts of
//! requests coalesce instead of queueing. Edits go through a debounced
//! trigger; a fixed-interval backstop catches the case where the debounce
//! timer never fires.
//!
//! The durable write runs on a spawned task against an immutable byte
//! snapshot taken under the store's exclusive lock, so it never touches
//! live mutable state.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::persist::storage::write_atomic;

/// Observable save state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Saving,
    /// Shown briefly after a successful write, then reverts to `Idle`.
    Saved,
    /// The write failed; the dirty flag was restored and nothing retries
    /// automatically.
    Failed(String),
}

/// Provider of document snapshots for the durable writer
///
/// `snapshot` runs under the caller's exclusive context: it serializes the
/// current document and clears the dirty flag in one step. `restore_dirty`
/// undoes that clear after a failed write so no edits are ever lost.
pub trait SnapshotSource: Send + Sync + 'static {
    fn snapshot(&self) -> Result<Vec<u8>>;
    fn restore_dirty(&self);
    fn is_dirty(&self) -> bool;
}

#[derive(Default)]
struct Flight {
    saving: bool,
    pending: bool,
}

struct Inner {
    source: Arc<dyn SnapshotSource>,
    path: Mutex<PathBuf>,
    config: EngineConfig,
    flight: Mutex<Flight>,
    status: watch::Sender<SaveStatus>,
    debounce: Mutex<Option<JoinHandle<()>>>,
    reset: Mutex<Option<JoinHandle<()>>>,
}

/// Coordinator for debounced, coalesced, concurrency-guarded saves
///
/// Cheap to clone; all clones share one state. Must be used from within a
/// Tokio runtime.
#[derive(Clone)]
pub struct SaveCoordinator {
    inner: Arc<Inner>,
}

impl SaveCoordinator {
    pub fn new(source: Arc<dyn SnapshotSource>, path: PathBuf, config: EngineConfig) -> Self {
        let (status, _) = watch::channel(SaveStatus::Idle);
        Self {
            inner: Arc::new(Inner {
                source,
                path: Mutex::new(path),
                config,
                flight: Mutex::new(Flight::default()),
                status,
                debounce: Mutex::new(None),
                reset: Mutex::new(None),
            }),
        }
    }

    /// Subscribe to save status changes.
    pub fn status(&self) -> watch::Receiver<SaveStatus> {
        self.inner.status.subscribe()
    }

    /// Current save status.
    pub fn current_status(&self) -> SaveStatus {
        self.inner.status.borrow().clone()
    }

    /// Point future saves at a different file. Used when a new document is
    /// loaded into an existing engine.
    pub fn set_target(&self, path: PathBuf) {
        *self.inner.path.lock().expect("target path lock") = path;
    }

    /// Request a save. Non-blocking: if a write is already in flight, a
    /// single pending flag absorbs this (and any further) request and one
    /// follow-up save runs after the in-flight write finishes.
    pub fn request_save(&self) {
        {
            let mut flight = self.inner.flight.lock().expect("flight lock");
            if flight.saving {
                flight.pending = true;
                return;
            }
            flight.saving = true;
        }

        if let Some(handle) = self.inner.reset.lock().expect("reset timer lock").take() {
            handle.abort();
        }
        self.inner.status.send_replace(SaveStatus::Saving);

        let this = self.clone();
        tokio::spawn(async move {
            this.perform_save().await;
        });
    }

    /// Debounced edit trigger: restarts the quiet-period timer. The previous
    /// timer is replaced wholesale, so its flush is subsumed by this one; no
    /// edit content is lost since the store keeps accumulating state.
    pub fn note_edited(&self) {
        let this = self.clone();
        let delay = self.inner.config.debounce;

        let mut slot = self.inner.debounce.lock().expect("debounce timer lock");
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.request_save();
        }));
    }

    /// Backstop: periodically save if still dirty, in case a debounce timer
    /// never fired (app suspended, dropped timer, ...). The caller owns the
    /// returned handle and aborts it on shutdown.
    pub fn spawn_autosave(&self) -> JoinHandle<()> {
        let this = self.clone();
        let period = self.inner.config.autosave_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // first tick completes immediately
            loop {
                ticker.tick().await;
                if this.inner.source.is_dirty() {
                    this.request_save();
                }
            }
        })
    }

    async fn perform_save(&self) {
        let path = self.inner.path.lock().expect("target path lock").clone();
        let result = match self.inner.source.snapshot() {
            Ok(bytes) => write_atomic(&path, &bytes).await,
            Err(err) => Err(err),
        };

        let pending = {
            let mut flight = self.inner.flight.lock().expect("flight lock");
            flight.saving = false;
            std::mem::take(&mut flight.pending)
        };

        match result {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "document saved");
                self.inner.status.send_replace(SaveStatus::Saved);
                self.schedule_status_reset();
            }
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "document save failed"
                );
                self.inner.source.restore_dirty();
                self.inner.status.send_replace(SaveStatus::Failed(err.to_string()));
            }
        }

        // Exactly one coalesced follow-up for the requests absorbed while
        // the write was in flight. The brief delay prevents a tight loop.
        if pending {
            let this = self.clone();
            let delay = self.inner.config.followup_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                this.request_save();
            });
        }
    }

    fn schedule_status_reset(&self) {
        let this = self.clone();
        let delay = self.inner.config.status_reset;

        let mut slot = self.inner.reset.lock().expect("reset timer lock");
        if let Some(previous) = slot.take() {
            previous.abort();
        }
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Superseded by a newer save: leave the newer status alone.
            if this.current_status() == SaveStatus::Saved {
                this.inner.status.send_replace(SaveStatus::Idle);
            }
        }));
    }
}
