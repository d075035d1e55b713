//! Note store
//!
//! Owns the authoritative in-memory list of note records for the loaded
//! document, the secondary lookup index, the dirty flag, and the editing
//! state machine. Every mutation flows through here so the index stays
//! consistent and persistence can be scheduled off the dirty flag.
//!
//! The store is not internally synchronized: callers wrap it in one
//! exclusive context (the engine uses a mutex) because the underlying
//! document object is single-writer.

use uuid::Uuid;

use crate::document::{AnnotationHandle, AnnotationKind, DocumentAdapter};
use crate::error::{EngineError, Result};
use crate::notes::extract::extract;
use crate::notes::index::NoteIndex;
use crate::notes::types::{EditState, NoteRecord, Rect};
use crate::notes::writer::NoteWriter;

/// Authoritative in-memory note state for one loaded document
pub struct NoteStore<D: DocumentAdapter> {
    doc: D,
    records: Vec<NoteRecord>,
    index: NoteIndex,
    dirty: bool,
    edit_state: EditState,
}

impl<D: DocumentAdapter> NoteStore<D> {
    /// Load a document: extract all records, rebuild the index, start clean.
    pub fn load(doc: D) -> Self {
        let records = extract(&doc);
        let index = NoteIndex::rebuild(&records);
        tracing::debug!(notes = records.len(), "loaded document annotations");
        Self {
            doc,
            records,
            index,
            dirty: false,
            edit_state: EditState::Viewing,
        }
    }

    pub fn notes(&self) -> &[NoteRecord] {
        &self.records
    }

    pub fn note(&self, id: Uuid) -> Option<&NoteRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn note_count(&self) -> usize {
        self.records.len()
    }

    /// Records on one page, in extraction order.
    pub fn notes_on_page(&self, page: usize) -> Vec<&NoteRecord> {
        self.records.iter().filter(|r| r.page_index == page).collect()
    }

    pub fn find_by_location(&self, page: usize, bounds: &Rect) -> Option<&NoteRecord> {
        self.index
            .find_by_location(page, bounds)
            .and_then(|id| self.note(id))
    }

    pub fn find_by_group(&self, group_id: Uuid) -> Option<&NoteRecord> {
        self.index.find_by_group(group_id).and_then(|id| self.note(id))
    }

    pub fn dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn edit_state(&self) -> EditState {
        self.edit_state
    }

    /// Serialize the document for a durable write. Produced under the
    /// exclusive context so the writer thread never sees live state.
    pub fn document_bytes(&self) -> Result<Vec<u8>> {
        self.doc.to_bytes()
    }

    /// Create a single-segment highlight.
    pub fn add_highlight(
        &mut self,
        page: usize,
        bounds: Rect,
        text: &str,
        color: &str,
    ) -> Result<NoteRecord> {
        let record = NoteWriter::new(&mut self.doc).create_highlight(page, bounds, text, color)?;
        self.index.put(&record);
        self.records.push(record.clone());
        self.dirty = true;
        Ok(record)
    }

    /// Create a multi-segment highlight sharing one freshly minted group id.
    pub fn add_grouped_highlight(
        &mut self,
        segments: &[(usize, Rect)],
        text: &str,
        color: &str,
    ) -> Result<NoteRecord> {
        let record = NoteWriter::new(&mut self.doc).create_grouped(segments, text, color)?;
        self.index.put(&record);
        self.records.push(record.clone());
        self.dirty = true;
        Ok(record)
    }

    /// Attach a note to a highlight that already exists in the document.
    ///
    /// Idempotent: if a record already exists at this exact location it is
    /// returned unchanged, so clicking the same highlight twice never
    /// duplicates a note entry. Otherwise only an in-memory record and index
    /// entry are created (the highlight object is already in the document)
    /// and the session enters editing state for the new record.
    pub fn add_note_to_existing_highlight(
        &mut self,
        page: usize,
        bounds: Rect,
        text: &str,
        color: &str,
    ) -> Result<NoteRecord> {
        if let Some(existing) = self.find_by_location(page, &bounds) {
            return Ok(existing.clone());
        }
        if page >= self.doc.page_count() {
            return Err(EngineError::PageOutOfRange {
                page,
                pages: self.doc.page_count(),
            });
        }

        let mut record = NoteRecord::new(page, bounds, text.to_string(), color.to_string());
        record.anchor = self
            .doc
            .annotations(page)
            .iter()
            .find(|a| a.kind == AnnotationKind::Highlight && a.bounds.tolerance_eq(&bounds))
            .map(|a| a.handle);

        self.index.put(&record);
        self.records.push(record.clone());
        self.edit_state = EditState::Editing(record.id);
        Ok(record)
    }

    /// Select a note. No-op if it was concurrently deleted.
    pub fn select_note(&mut self, id: Uuid) {
        if self.note(id).is_some() {
            self.edit_state = EditState::Selected(id);
        }
    }

    /// Begin editing a note. No-op if it was concurrently deleted.
    pub fn start_editing(&mut self, id: Uuid) {
        if self.note(id).is_some() {
            self.edit_state = EditState::Editing(id);
        }
    }

    /// Cancel the current edit session.
    ///
    /// A record whose note text is still empty was never actually saved: it
    /// is dropped from the collection and index. This is the only path that
    /// silently discards a record; the underlying highlight (if any) is
    /// untouched.
    pub fn cancel_editing(&mut self) {
        if let EditState::Editing(id) = self.edit_state {
            if let Some(pos) = self.records.iter().position(|r| r.id == id) {
                if self.records[pos].note_text.is_empty() {
                    let ghost = self.records.remove(pos);
                    self.index.remove(&ghost);
                }
            }
        }
        self.edit_state = EditState::Viewing;
    }

    /// Persist note text onto the underlying highlight and update the record.
    ///
    /// Saving empty text is allowed and distinct from cancel: it explicitly
    /// clears an existing note while keeping the record and highlight.
    pub fn save_note_text(&mut self, id: Uuid, text: &str) -> Result<()> {
        let Some(pos) = self.records.iter().position(|r| r.id == id) else {
            // Concurrently deleted: nothing to save.
            return Ok(());
        };

        let handle = {
            let record = &self.records[pos];
            let mut writer = NoteWriter::new(&mut self.doc);
            if text.is_empty() {
                writer.clear_note_text(record)?
            } else {
                writer.update_note_text(record, text)?
            }
        };

        let record = &mut self.records[pos];
        record.note_text = text.to_string();
        record.anchor = Some(handle);
        record.touch();
        self.dirty = true;
        self.edit_state = EditState::Viewing;
        Ok(())
    }

    /// Clear a note's text, keeping both the highlight and the record.
    pub fn delete_note_text_only(&mut self, id: Uuid) -> Result<()> {
        let Some(pos) = self.records.iter().position(|r| r.id == id) else {
            return Ok(());
        };

        let handle = {
            let record = &self.records[pos];
            NoteWriter::new(&mut self.doc).clear_note_text(record)?
        };

        let record = &mut self.records[pos];
        record.note_text.clear();
        record.anchor = Some(handle);
        record.touch();
        self.dirty = true;
        Ok(())
    }

    /// Delete a note's whole highlight group from the document, along with
    /// every record sharing the group id.
    pub fn delete_highlight_and_note(&mut self, id: Uuid) -> Result<()> {
        let Some(record) = self.note(id) else {
            return Ok(());
        };
        let group_id = record.group_id;

        NoteWriter::new(&mut self.doc).delete_group(group_id, &self.records)?;

        let mut kept = Vec::with_capacity(self.records.len());
        let mut removed = Vec::new();
        for record in self.records.drain(..) {
            if record.group_id == group_id {
                self.index.remove(&record);
                removed.push(record.id);
            } else {
                kept.push(record);
            }
        }
        self.records = kept;
        for id in removed {
            self.clear_edit_state_for(id);
        }
        self.dirty = true;
        Ok(())
    }

    /// Remove exactly one low-level annotation object and every record that
    /// back-references or tolerance-matches it.
    pub fn remove_single(&mut self, handle: AnnotationHandle) -> Result<()> {
        // Capture location before the object disappears.
        let location = (0..self.doc.page_count()).find_map(|page| {
            self.doc
                .annotations(page)
                .into_iter()
                .find(|a| a.handle == handle)
                .map(|a| (page, a.bounds))
        });

        NoteWriter::new(&mut self.doc).delete_single(handle)?;

        let mut kept = Vec::with_capacity(self.records.len());
        let mut removed = Vec::new();
        for record in self.records.drain(..) {
            let hit = record.anchor == Some(handle)
                || location.is_some_and(|(page, bounds)| {
                    record.page_index == page && record.bounds.tolerance_eq(&bounds)
                });
            if hit {
                self.index.remove(&record);
                removed.push(record.id);
            } else {
                kept.push(record);
            }
        }
        self.records = kept;
        for id in removed {
            self.clear_edit_state_for(id);
        }
        self.dirty = true;
        Ok(())
    }

    fn clear_edit_state_for(&mut self, id: Uuid) {
        match self.edit_state {
            EditState::Selected(current) | EditState::Editing(current) if current == id => {
                self.edit_state = EditState::Viewing;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryDocument;
    use crate::notes::types::DEFAULT_HIGHLIGHT_COLOR;

    fn store_with_pages(pages: usize) -> NoteStore<MemoryDocument> {
        NoteStore::load(MemoryDocument::new(pages))
    }

    fn assert_index_consistent(store: &NoteStore<MemoryDocument>) {
        for record in store.notes() {
            let found = store
                .find_by_location(record.page_index, &record.bounds)
                .unwrap_or_else(|| panic!("index lost record {}", record.id));
            assert_eq!(found.id, record.id);
        }
    }

    #[test]
    fn test_load_clears_dirty() {
        let mut doc = MemoryDocument::new(1);
        NoteWriter::new(&mut doc)
            .create_highlight(0, Rect::new(10.0, 700.0, 200.0, 20.0), "q", "#ffff00")
            .unwrap();

        let store = NoteStore::load(doc);
        assert_eq!(store.note_count(), 1);
        assert!(!store.dirty());
        assert_index_consistent(&store);
    }

    #[test]
    fn test_add_highlight_sets_dirty_and_indexes() {
        let mut store = store_with_pages(3);
        let record = store
            .add_highlight(2, Rect::new(10.0, 700.0, 200.0, 20.0), "quoted", DEFAULT_HIGHLIGHT_COLOR)
            .unwrap();

        assert!(store.dirty());
        assert_eq!(
            store
                .find_by_location(2, &Rect::new(10.0, 700.0, 200.0, 20.0))
                .map(|r| r.id),
            Some(record.id)
        );
        assert_index_consistent(&store);
    }

    #[test]
    fn test_idempotent_attach() {
        let mut store = store_with_pages(1);
        let bounds = Rect::new(10.0, 700.0, 200.0, 20.0);
        let first = store
            .add_note_to_existing_highlight(0, bounds, "quoted", DEFAULT_HIGHLIGHT_COLOR)
            .unwrap();
        let second = store
            .add_note_to_existing_highlight(0, bounds, "quoted", DEFAULT_HIGHLIGHT_COLOR)
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.note_count(), 1);
    }

    #[test]
    fn test_attach_enters_editing() {
        let mut store = store_with_pages(1);
        let record = store
            .add_note_to_existing_highlight(
                0,
                Rect::new(10.0, 700.0, 200.0, 20.0),
                "quoted",
                DEFAULT_HIGHLIGHT_COLOR,
            )
            .unwrap();
        assert_eq!(store.edit_state(), EditState::Editing(record.id));
    }

    #[test]
    fn test_cancel_discards_empty_record() {
        let mut store = store_with_pages(1);
        let bounds = Rect::new(10.0, 700.0, 200.0, 20.0);
        let record = store
            .add_note_to_existing_highlight(0, bounds, "quoted", DEFAULT_HIGHLIGHT_COLOR)
            .unwrap();

        store.cancel_editing();

        assert_eq!(store.note_count(), 0);
        assert!(store.find_by_location(0, &bounds).is_none());
        assert!(store.note(record.id).is_none());
        assert_eq!(store.edit_state(), EditState::Viewing);
        // Nothing was written, so nothing to persist.
        assert!(!store.dirty());
    }

    #[test]
    fn test_cancel_keeps_record_with_text() {
        let mut store = store_with_pages(1);
        let record = store
            .add_highlight(0, Rect::new(10.0, 700.0, 200.0, 20.0), "q", DEFAULT_HIGHLIGHT_COLOR)
            .unwrap();
        store.save_note_text(record.id, "some note").unwrap();

        store.start_editing(record.id);
        store.cancel_editing();

        assert_eq!(store.note_count(), 1);
        assert_eq!(store.note(record.id).unwrap().note_text, "some note");
    }

    #[test]
    fn test_save_empty_text_is_clear_not_discard() {
        let mut store = store_with_pages(1);
        let record = store
            .add_highlight(0, Rect::new(10.0, 700.0, 200.0, 20.0), "q", DEFAULT_HIGHLIGHT_COLOR)
            .unwrap();
        store.save_note_text(record.id, "to be cleared").unwrap();

        store.start_editing(record.id);
        store.save_note_text(record.id, "").unwrap();

        // Record survives with empty text, unlike cancel.
        assert_eq!(store.note_count(), 1);
        assert!(store.note(record.id).unwrap().note_text.is_empty());
        assert_eq!(store.edit_state(), EditState::Viewing);
    }

    #[test]
    fn test_save_on_deleted_record_is_noop() {
        let mut store = store_with_pages(1);
        let record = store
            .add_highlight(0, Rect::new(10.0, 700.0, 200.0, 20.0), "q", DEFAULT_HIGHLIGHT_COLOR)
            .unwrap();
        store.delete_highlight_and_note(record.id).unwrap();

        store.save_note_text(record.id, "too late").unwrap();
        assert_eq!(store.note_count(), 0);
    }

    #[test]
    fn test_edit_deleted_record_is_noop() {
        let mut store = store_with_pages(1);
        let record = store
            .add_highlight(0, Rect::new(10.0, 700.0, 200.0, 20.0), "q", DEFAULT_HIGHLIGHT_COLOR)
            .unwrap();
        store.delete_highlight_and_note(record.id).unwrap();

        store.start_editing(record.id);
        assert_eq!(store.edit_state(), EditState::Viewing);
    }

    #[test]
    fn test_delete_note_text_only_keeps_highlight() {
        let mut store = store_with_pages(1);
        let record = store
            .add_highlight(0, Rect::new(10.0, 700.0, 200.0, 20.0), "q", DEFAULT_HIGHLIGHT_COLOR)
            .unwrap();
        store.save_note_text(record.id, "note").unwrap();

        store.delete_note_text_only(record.id).unwrap();

        assert_eq!(store.note_count(), 1);
        assert!(store.note(record.id).unwrap().note_text.is_empty());
        assert!(store.dirty());
    }

    #[test]
    fn test_delete_group_removes_all_group_records() {
        let mut store = store_with_pages(1);
        let grouped = store
            .add_grouped_highlight(
                &[
                    (0, Rect::new(10.0, 300.0, 200.0, 20.0)),
                    (0, Rect::new(10.0, 280.0, 200.0, 20.0)),
                ],
                "grouped",
                DEFAULT_HIGHLIGHT_COLOR,
            )
            .unwrap();
        let other = store
            .add_highlight(0, Rect::new(10.0, 100.0, 50.0, 20.0), "other", DEFAULT_HIGHLIGHT_COLOR)
            .unwrap();

        store.delete_highlight_and_note(grouped.id).unwrap();

        assert_eq!(store.note_count(), 1);
        assert!(store.note(other.id).is_some());
        assert!(store.find_by_group(grouped.group_id).is_none());
        assert_index_consistent(&store);
    }

    #[test]
    fn test_remove_single_drops_matching_record() {
        let mut store = store_with_pages(1);
        let record = store
            .add_highlight(0, Rect::new(10.0, 700.0, 200.0, 20.0), "q", DEFAULT_HIGHLIGHT_COLOR)
            .unwrap();
        let handle = record.anchor.unwrap();

        store.remove_single(handle).unwrap();

        assert_eq!(store.note_count(), 0);
        assert!(store.dirty());
        assert_index_consistent(&store);
    }

    #[test]
    fn test_index_consistency_across_mutation_sequence() {
        let mut store = store_with_pages(4);

        let a = store
            .add_highlight(0, Rect::new(10.0, 700.0, 200.0, 20.0), "a", DEFAULT_HIGHLIGHT_COLOR)
            .unwrap();
        assert_index_consistent(&store);

        let b = store
            .add_grouped_highlight(
                &[
                    (1, Rect::new(10.0, 500.0, 200.0, 20.0)),
                    (1, Rect::new(10.0, 480.0, 200.0, 20.0)),
                ],
                "b",
                DEFAULT_HIGHLIGHT_COLOR,
            )
            .unwrap();
        assert_index_consistent(&store);

        store.save_note_text(a.id, "note a").unwrap();
        assert_index_consistent(&store);

        store.delete_note_text_only(a.id).unwrap();
        assert_index_consistent(&store);

        store.delete_highlight_and_note(b.id).unwrap();
        assert_index_consistent(&store);

        store
            .add_note_to_existing_highlight(3, Rect::new(5.0, 5.0, 5.0, 5.0), "c", DEFAULT_HIGHLIGHT_COLOR)
            .unwrap();
        assert_index_consistent(&store);

        store.cancel_editing();
        assert_index_consistent(&store);
    }

    #[test]
    fn test_find_by_group_for_single_segment() {
        let mut store = store_with_pages(1);
        let record = store
            .add_highlight(0, Rect::new(10.0, 700.0, 200.0, 20.0), "q", DEFAULT_HIGHLIGHT_COLOR)
            .unwrap();
        // Single-segment highlights use their own id as group id.
        assert_eq!(store.find_by_group(record.id).map(|r| r.id), Some(record.id));
    }
}
