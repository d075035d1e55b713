//! Annotation engine facade
//!
//! The surface the editor/UI layer talks to: load a document, create
//! highlights, edit notes, look records up, and fire-and-forget save
//! requests. All store mutation happens under one mutex (the underlying
//! document object is single-writer); only the durable byte write runs
//! outside it, coordinated by [`SaveCoordinator`].

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::document::{AnnotationHandle, DocumentAdapter, LoadableDocument};
use crate::error::{EngineError, Result};
use crate::notes::{EditState, NoteRecord, NoteStore, Rect};
use crate::persist::{SaveCoordinator, SaveStatus, SnapshotSource};

/// Snapshot provider backed by the engine's note store.
///
/// `snapshot` serializes and clears dirty in one step under the store lock,
/// so the bytes handed to the writer always correspond to the dirty state
/// that was just cleared.
struct StoreSnapshot<D: DocumentAdapter + 'static>(Arc<Mutex<NoteStore<D>>>);

impl<D: DocumentAdapter + 'static> SnapshotSource for StoreSnapshot<D> {
    fn snapshot(&self) -> Result<Vec<u8>> {
        let mut store = self.0.lock().expect("note store lock");
        let bytes = store.document_bytes()?;
        store.clear_dirty();
        Ok(bytes)
    }

    fn restore_dirty(&self) {
        self.0.lock().expect("note store lock").mark_dirty();
    }

    fn is_dirty(&self) -> bool {
        self.0.lock().expect("note store lock").dirty()
    }
}

/// Facade over the note store and persistence coordinator
///
/// Must be created and used within a Tokio runtime.
pub struct AnnotationEngine<D: DocumentAdapter + 'static> {
    store: Arc<Mutex<NoteStore<D>>>,
    coordinator: SaveCoordinator,
    autosave: JoinHandle<()>,
}

impl<D: DocumentAdapter + 'static> AnnotationEngine<D> {
    /// Wrap an already-loaded document. `path` is the save target.
    pub fn new(doc: D, path: PathBuf, config: EngineConfig) -> Self {
        let store = Arc::new(Mutex::new(NoteStore::load(doc)));
        let coordinator =
            SaveCoordinator::new(Arc::new(StoreSnapshot(store.clone())), path, config);
        let autosave = coordinator.spawn_autosave();
        Self {
            store,
            coordinator,
            autosave,
        }
    }

    /// All current note records, ordered by page.
    pub fn notes(&self) -> Vec<NoteRecord> {
        self.store.lock().expect("note store lock").notes().to_vec()
    }

    pub fn note(&self, id: Uuid) -> Option<NoteRecord> {
        self.store.lock().expect("note store lock").note(id).cloned()
    }

    pub fn edit_state(&self) -> EditState {
        self.store.lock().expect("note store lock").edit_state()
    }

    /// Create a single-segment highlight and schedule a debounced persist.
    pub fn create_highlight(
        &self,
        page: usize,
        bounds: Rect,
        text: &str,
        color: &str,
    ) -> Result<NoteRecord> {
        let record = self
            .store
            .lock()
            .expect("note store lock")
            .add_highlight(page, bounds, text, color)?;
        self.coordinator.note_edited();
        Ok(record)
    }

    /// Create a multi-segment highlight and schedule a debounced persist.
    pub fn create_grouped_highlight(
        &self,
        segments: &[(usize, Rect)],
        text: &str,
        color: &str,
    ) -> Result<NoteRecord> {
        let record = self
            .store
            .lock()
            .expect("note store lock")
            .add_grouped_highlight(segments, text, color)?;
        self.coordinator.note_edited();
        Ok(record)
    }

    /// Attach a note to an existing highlight and enter editing state.
    /// Idempotent per location; nothing is persisted until the note is saved.
    pub fn add_note_to_existing_highlight(
        &self,
        page: usize,
        bounds: Rect,
        text: &str,
        color: &str,
    ) -> Result<NoteRecord> {
        self.store
            .lock()
            .expect("note store lock")
            .add_note_to_existing_highlight(page, bounds, text, color)
    }

    pub fn select_note(&self, id: Uuid) {
        self.store.lock().expect("note store lock").select_note(id);
    }

    pub fn start_edit(&self, id: Uuid) {
        self.store.lock().expect("note store lock").start_editing(id);
    }

    /// Cancel the current edit; a still-empty record is discarded.
    pub fn cancel_edit(&self) {
        self.store.lock().expect("note store lock").cancel_editing();
    }

    /// Save note text and schedule a debounced persist. Explicitly saving
    /// empty text clears the note but keeps the record.
    pub fn save_note(&self, id: Uuid, text: &str) -> Result<()> {
        self.store
            .lock()
            .expect("note store lock")
            .save_note_text(id, text)?;
        self.coordinator.note_edited();
        Ok(())
    }

    /// Clear a note's text, keeping the highlight.
    pub fn clear_note_text(&self, id: Uuid) -> Result<()> {
        self.store
            .lock()
            .expect("note store lock")
            .delete_note_text_only(id)?;
        self.coordinator.note_edited();
        Ok(())
    }

    /// Delete a note's whole highlight group.
    pub fn delete_highlight(&self, id: Uuid) -> Result<()> {
        self.store
            .lock()
            .expect("note store lock")
            .delete_highlight_and_note(id)?;
        self.coordinator.note_edited();
        Ok(())
    }

    /// Remove exactly one low-level annotation object.
    pub fn delete_single(&self, handle: AnnotationHandle) -> Result<()> {
        self.store
            .lock()
            .expect("note store lock")
            .remove_single(handle)?;
        self.coordinator.note_edited();
        Ok(())
    }

    pub fn find_by_location(&self, page: usize, bounds: &Rect) -> Option<NoteRecord> {
        self.store
            .lock()
            .expect("note store lock")
            .find_by_location(page, bounds)
            .cloned()
    }

    pub fn find_by_group(&self, group_id: Uuid) -> Option<NoteRecord> {
        self.store
            .lock()
            .expect("note store lock")
            .find_by_group(group_id)
            .cloned()
    }

    /// Fire-and-forget save request.
    pub fn request_save(&self) {
        self.coordinator.request_save();
    }

    /// Observable save status.
    pub fn save_status(&self) -> watch::Receiver<SaveStatus> {
        self.coordinator.status()
    }

    pub fn current_save_status(&self) -> SaveStatus {
        self.coordinator.current_status()
    }

    pub fn is_dirty(&self) -> bool {
        self.store.lock().expect("note store lock").dirty()
    }
}

impl<D: LoadableDocument + 'static> AnnotationEngine<D> {
    /// Open a document file and build an engine around it.
    pub fn open(path: impl AsRef<Path>, config: EngineConfig) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(EngineError::from_load_io)?;
        let doc = D::from_bytes(&bytes)?;
        Ok(Self::new(doc, path.to_path_buf(), config))
    }

    /// Load a different document into this engine, replacing all state.
    ///
    /// On any failure the previously loaded document and its notes remain
    /// live and untouched.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Vec<NoteRecord>> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(EngineError::from_load_io)?;
        let doc = D::from_bytes(&bytes)?;

        let mut store = self.store.lock().expect("note store lock");
        *store = NoteStore::load(doc);
        let notes = store.notes().to_vec();
        drop(store);

        self.coordinator.set_target(path.to_path_buf());
        Ok(notes)
    }
}

impl<D: DocumentAdapter + 'static> Drop for AnnotationEngine<D> {
    fn drop(&mut self) {
        self.autosave.abort();
    }
}
