//! Note writer
//!
//! Materializes store mutations as low-level annotation objects through the
//! document adapter: creating highlight segments, rewriting note content,
//! and deleting whole highlight groups.
//!
//! Lookups never rely on the record's back-reference alone. The priority is
//! stored anchor (if still live), then note-id metadata, then a bounds
//! tolerance match — the anchor is owned by the document layer and may not
//! survive a reload.

use uuid::Uuid;

use crate::document::{
    read_meta_id, AnnotationHandle, AnnotationKind, DocumentAdapter, META_GROUP_ID, META_NOTE_ID,
};
use crate::error::{EngineError, Result};
use crate::notes::types::{NoteRecord, Rect};

/// Writer over a mutably borrowed document
pub struct NoteWriter<'a, D: DocumentAdapter> {
    doc: &'a mut D,
}

impl<'a, D: DocumentAdapter> NoteWriter<'a, D> {
    pub fn new(doc: &'a mut D) -> Self {
        Self { doc }
    }

    /// Create one highlight object and its note record. Note content starts
    /// empty; a fresh note-id is stamped into the document.
    pub fn create_highlight(
        &mut self,
        page: usize,
        bounds: Rect,
        text: &str,
        color: &str,
    ) -> Result<NoteRecord> {
        let handle = self.doc.create_highlight(page, bounds, color, text)?;
        let mut record = NoteRecord::new(page, bounds, text.to_string(), color.to_string());
        self.doc
            .set_metadata(handle, META_NOTE_ID, &record.id.to_string())?;
        record.anchor = Some(handle);
        Ok(record)
    }

    /// Create one highlight object per segment, all sharing a freshly minted
    /// group id. The record is anchored at the first segment (the segments of
    /// a selection arrive sorted top-to-bottom), and the selection text is
    /// stored as that segment's covered text.
    ///
    /// Grouping is resolved per page, so all segments must lie on one page; a
    /// mixed-page list is rejected before anything is written.
    pub fn create_grouped(
        &mut self,
        segments: &[(usize, Rect)],
        text: &str,
        color: &str,
    ) -> Result<NoteRecord> {
        // A selection always carries at least one segment.
        let &(page, bounds) = segments.first().ok_or(EngineError::AnnotationMissing)?;
        if segments.iter().any(|&(seg_page, _)| seg_page != page) {
            return Err(EngineError::GroupSpansPages);
        }
        let group_id = Uuid::new_v4();

        let mut record = NoteRecord::new(page, bounds, text.to_string(), color.to_string());
        record.group_id = group_id;

        for (i, &(_, seg_bounds)) in segments.iter().enumerate() {
            let covered = if i == 0 { text } else { "" };
            let handle = self
                .doc
                .create_highlight(page, seg_bounds, color, covered)?;
            let note_id = if i == 0 { record.id } else { Uuid::new_v4() };
            self.doc
                .set_metadata(handle, META_NOTE_ID, &note_id.to_string())?;
            self.doc
                .set_metadata(handle, META_GROUP_ID, &group_id.to_string())?;
            if i == 0 {
                record.anchor = Some(handle);
            }
        }

        Ok(record)
    }

    /// Overwrite the note content field of the record's underlying highlight.
    /// Returns the handle that was written, so the caller can refresh the
    /// record's anchor.
    pub fn update_note_text(&mut self, record: &NoteRecord, text: &str) -> Result<AnnotationHandle> {
        let handle = self
            .locate(record)
            .ok_or(EngineError::AnnotationMissing)?;
        self.doc.set_contents(handle, text)?;
        // Non-anchor matches may have lost their id metadata; re-stamp so the
        // record keeps its identity across the next reload.
        self.doc
            .set_metadata(handle, META_NOTE_ID, &record.id.to_string())?;
        Ok(handle)
    }

    /// Empty the note content field. The highlight itself is retained.
    pub fn clear_note_text(&mut self, record: &NoteRecord) -> Result<AnnotationHandle> {
        self.update_note_text(record, "")
    }

    /// Remove every highlight object belonging to a group: any segment whose
    /// group metadata matches, plus metadata-less segments that
    /// tolerance-match an ungrouped record of this group.
    pub fn delete_group(&mut self, group_id: Uuid, records: &[NoteRecord]) -> Result<()> {
        let mut doomed = Vec::new();

        for page in 0..self.doc.page_count() {
            for annotation in self.doc.annotations(page) {
                if annotation.kind != AnnotationKind::Highlight {
                    continue;
                }
                match read_meta_id(&annotation.metadata, META_GROUP_ID) {
                    Some(id) if id == group_id => doomed.push(annotation.handle),
                    Some(_) => {}
                    None => {
                        let matches = records.iter().any(|r| {
                            r.group_id == group_id
                                && r.page_index == page
                                && r.bounds.tolerance_eq(&annotation.bounds)
                        });
                        if matches {
                            doomed.push(annotation.handle);
                        }
                    }
                }
            }
        }

        for handle in doomed {
            self.doc.remove(handle)?;
        }
        Ok(())
    }

    /// Remove exactly one low-level annotation object.
    pub fn delete_single(&mut self, handle: AnnotationHandle) -> Result<()> {
        self.doc.remove(handle)
    }

    /// Resolve a record to its live annotation handle.
    ///
    /// Priority: back-reference if still valid, then note-id metadata, then
    /// bounds tolerance match on the record's page.
    pub fn locate(&self, record: &NoteRecord) -> Option<AnnotationHandle> {
        if let Some(anchor) = record.anchor {
            if self.doc.contains(anchor) {
                return Some(anchor);
            }
        }

        let annotations = self.doc.annotations(record.page_index);

        if let Some(by_id) = annotations.iter().find(|a| {
            a.kind == AnnotationKind::Highlight
                && read_meta_id(&a.metadata, META_NOTE_ID) == Some(record.id)
        }) {
            return Some(by_id.handle);
        }

        annotations
            .iter()
            .find(|a| {
                a.kind == AnnotationKind::Highlight && a.bounds.tolerance_eq(&record.bounds)
            })
            .map(|a| a.handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryDocument;
    use crate::notes::extract::extract;
    use std::collections::HashMap;

    #[test]
    fn test_create_highlight_stamps_id() {
        let mut doc = MemoryDocument::new(1);
        let bounds = Rect::new(10.0, 700.0, 200.0, 20.0);
        let record = NoteWriter::new(&mut doc)
            .create_highlight(0, bounds, "quoted", "#ffff00")
            .unwrap();

        let annotations = doc.annotations(0);
        assert_eq!(annotations.len(), 1);
        assert_eq!(
            read_meta_id(&annotations[0].metadata, META_NOTE_ID),
            Some(record.id)
        );
        assert!(annotations[0].contents.is_empty());
        assert_eq!(record.anchor, Some(annotations[0].handle));
    }

    #[test]
    fn test_create_grouped_shares_group_id() {
        let mut doc = MemoryDocument::new(1);
        let segments = vec![
            (0, Rect::new(10.0, 300.0, 200.0, 20.0)),
            (0, Rect::new(10.0, 280.0, 200.0, 20.0)),
            (0, Rect::new(10.0, 260.0, 120.0, 20.0)),
        ];
        let record = NoteWriter::new(&mut doc)
            .create_grouped(&segments, "three lines of text", "#ffff00")
            .unwrap();

        assert_ne!(record.group_id, record.id);
        let annotations = doc.annotations(0);
        assert_eq!(annotations.len(), 3);
        for annotation in &annotations {
            assert_eq!(
                read_meta_id(&annotation.metadata, META_GROUP_ID),
                Some(record.group_id)
            );
        }
        // Anchored at the first (topmost) segment.
        assert_eq!(record.bounds.y, 300.0);
    }

    #[test]
    fn test_create_grouped_rejects_cross_page_segments() {
        let mut doc = MemoryDocument::new(2);
        let err = NoteWriter::new(&mut doc)
            .create_grouped(
                &[
                    (0, Rect::new(10.0, 300.0, 200.0, 20.0)),
                    (1, Rect::new(10.0, 700.0, 200.0, 20.0)),
                ],
                "spans pages",
                "#ffff00",
            )
            .unwrap_err();

        assert!(matches!(err, EngineError::GroupSpansPages));
        // Rejected before any object was created.
        assert!(doc.annotations(0).is_empty());
        assert!(doc.annotations(1).is_empty());
    }

    #[test]
    fn test_grouped_round_trips_through_extract() {
        let mut doc = MemoryDocument::new(1);
        let segments = vec![
            (0, Rect::new(10.0, 300.0, 200.0, 20.0)),
            (0, Rect::new(10.0, 280.0, 200.0, 20.0)),
        ];
        let record = NoteWriter::new(&mut doc)
            .create_grouped(&segments, "the full selection", "#ffff00")
            .unwrap();

        let extracted = extract(&doc);
        assert_eq!(extracted.len(), 1);
        assert_eq!(extracted[0].id, record.id);
        assert_eq!(extracted[0].group_id, record.group_id);
        assert_eq!(extracted[0].highlighted_text, "the full selection");
    }

    #[test]
    fn test_update_locates_by_anchor() {
        let mut doc = MemoryDocument::new(1);
        let mut writer = NoteWriter::new(&mut doc);
        let record = writer
            .create_highlight(0, Rect::new(10.0, 700.0, 200.0, 20.0), "q", "#ffff00")
            .unwrap();
        writer.update_note_text(&record, "a note").unwrap();

        assert_eq!(doc.annotations(0)[0].contents, "a note");
    }

    #[test]
    fn test_update_falls_back_to_id_metadata() {
        let mut doc = MemoryDocument::new(1);
        let mut record = NoteWriter::new(&mut doc)
            .create_highlight(0, Rect::new(10.0, 700.0, 200.0, 20.0), "q", "#ffff00")
            .unwrap();
        // Stale back-reference, as after a reload.
        record.anchor = Some(AnnotationHandle(9999));
        record.bounds = Rect::new(500.0, 500.0, 5.0, 5.0); // bounds match impossible

        NoteWriter::new(&mut doc)
            .update_note_text(&record, "found by id")
            .unwrap();
        assert_eq!(doc.annotations(0)[0].contents, "found by id");
    }

    #[test]
    fn test_update_falls_back_to_bounds_tolerance() {
        let mut doc = MemoryDocument::new(1);
        // Highlight written by another tool: no id metadata at all.
        doc.insert_raw(
            0,
            AnnotationKind::Highlight,
            Rect::new(10.0, 700.0, 200.0, 20.0),
            "#ffff00",
            "",
            "q",
            HashMap::new(),
        )
        .unwrap();

        let mut record = NoteRecord::new(
            0,
            Rect::new(11.2, 699.1, 200.8, 19.5), // within drift tolerance
            "q".to_string(),
            "#ffff00".to_string(),
        );
        record.anchor = None;

        NoteWriter::new(&mut doc)
            .update_note_text(&record, "found by bounds")
            .unwrap();

        let annotation = &doc.annotations(0)[0];
        assert_eq!(annotation.contents, "found by bounds");
        // The id was re-stamped so the record survives the next reload.
        assert_eq!(read_meta_id(&annotation.metadata, META_NOTE_ID), Some(record.id));
    }

    #[test]
    fn test_update_missing_highlight_errors() {
        let mut doc = MemoryDocument::new(1);
        let record = NoteRecord::new(
            0,
            Rect::new(0.0, 0.0, 1.0, 1.0),
            String::new(),
            "#ffff00".to_string(),
        );
        let err = NoteWriter::new(&mut doc)
            .update_note_text(&record, "text")
            .unwrap_err();
        assert!(matches!(err, EngineError::AnnotationMissing));
    }

    #[test]
    fn test_clear_retains_highlight() {
        let mut doc = MemoryDocument::new(1);
        let mut writer = NoteWriter::new(&mut doc);
        let record = writer
            .create_highlight(0, Rect::new(10.0, 700.0, 200.0, 20.0), "q", "#ffff00")
            .unwrap();
        writer.update_note_text(&record, "note").unwrap();
        writer.clear_note_text(&record).unwrap();

        let annotations = doc.annotations(0);
        assert_eq!(annotations.len(), 1);
        assert!(annotations[0].contents.is_empty());
    }

    #[test]
    fn test_delete_group_removes_all_segments() {
        let mut doc = MemoryDocument::new(2);
        let mut writer = NoteWriter::new(&mut doc);
        let grouped = writer
            .create_grouped(
                &[
                    (0, Rect::new(10.0, 300.0, 200.0, 20.0)),
                    (0, Rect::new(10.0, 280.0, 200.0, 20.0)),
                ],
                "grouped",
                "#ffff00",
            )
            .unwrap();
        let other = writer
            .create_highlight(1, Rect::new(50.0, 100.0, 80.0, 20.0), "other", "#ff0000")
            .unwrap();

        writer
            .delete_group(grouped.group_id, &[grouped.clone(), other.clone()])
            .unwrap();

        assert!(doc.annotations(0).is_empty());
        // Unrelated highlight survives.
        assert_eq!(doc.annotations(1).len(), 1);
    }

    #[test]
    fn test_delete_group_matches_metadata_less_segment_by_bounds() {
        let mut doc = MemoryDocument::new(1);
        // Ungrouped highlight with no metadata at all.
        doc.insert_raw(
            0,
            AnnotationKind::Highlight,
            Rect::new(10.0, 700.0, 200.0, 20.0),
            "#ffff00",
            "",
            "q",
            HashMap::new(),
        )
        .unwrap();

        let record = NoteRecord::new(
            0,
            Rect::new(10.5, 700.4, 199.2, 20.0),
            "q".to_string(),
            "#ffff00".to_string(),
        );

        NoteWriter::new(&mut doc)
            .delete_group(record.group_id, &[record])
            .unwrap();
        assert!(doc.annotations(0).is_empty());
    }

    #[test]
    fn test_delete_single() {
        let mut doc = MemoryDocument::new(1);
        let mut writer = NoteWriter::new(&mut doc);
        let a = writer
            .create_highlight(0, Rect::new(0.0, 0.0, 10.0, 10.0), "a", "#ffff00")
            .unwrap();
        writer
            .create_highlight(0, Rect::new(0.0, 50.0, 10.0, 10.0), "b", "#ffff00")
            .unwrap();

        writer.delete_single(a.anchor.unwrap()).unwrap();
        assert_eq!(doc.annotations(0).len(), 1);
    }
}
