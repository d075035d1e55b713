//! Note extraction
//!
//! Walks a whole document's annotation objects and reconstructs the ordered
//! list of note records: multi-line highlight groups are collapsed into one
//! logical record, note text is resolved from the highlight's own content
//! field or a linked text-note object, and every piece of identifier
//! metadata passes the validation gate before it is trusted.
//!
//! Extraction never fails for malformed per-annotation metadata — bad fields
//! degrade to "absent". A wholly unreadable document is reported at the
//! document-load boundary, not here.

use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

use crate::document::{
    read_meta_id, AnnotationKind, DocumentAdapter, RawAnnotation, META_GROUP_ID,
    META_LINKED_HIGHLIGHT, META_NOTE_ID,
};
use crate::notes::types::{truncate_chars, NoteRecord};

/// Maximum note/highlight text length retained in memory.
const MAX_TEXT_CHARS: usize = 10_000;

/// Reconstruct note records from every page of the document, ordered by page.
pub fn extract(doc: &dyn DocumentAdapter) -> Vec<NoteRecord> {
    let mut records = Vec::new();
    let mut seen_ids = HashSet::new();
    for page in 0..doc.page_count() {
        extract_page(doc, page, &mut records, &mut seen_ids);
    }
    records
}

fn extract_page(
    doc: &dyn DocumentAdapter,
    page: usize,
    records: &mut Vec<NoteRecord>,
    seen_ids: &mut HashSet<Uuid>,
) {
    let annotations = doc.annotations(page);
    let text_notes: Vec<&RawAnnotation> = annotations
        .iter()
        .filter(|a| a.kind == AnnotationKind::TextNote)
        .collect();

    // Partition highlights into groups (valid group-id metadata) and
    // ungrouped, preserving document order of first appearance.
    let mut groups: Vec<(Uuid, Vec<&RawAnnotation>)> = Vec::new();
    let mut ungrouped: Vec<&RawAnnotation> = Vec::new();

    for annotation in annotations.iter().filter(|a| a.kind == AnnotationKind::Highlight) {
        match read_meta_id(&annotation.metadata, META_GROUP_ID) {
            Some(group_id) => match groups.iter_mut().find(|(id, _)| *id == group_id) {
                Some((_, segments)) => segments.push(annotation),
                None => groups.push((group_id, vec![annotation])),
            },
            None => ungrouped.push(annotation),
        }
    }

    for (group_id, mut segments) in groups {
        // Topmost first: y increases upward, so descending y is reading order.
        segments.sort_by(|a, b| {
            b.bounds
                .y
                .partial_cmp(&a.bounds.y)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        records.push(build_record(page, &segments, Some(group_id), &text_notes, seen_ids));
    }

    for segment in ungrouped {
        records.push(build_record(page, &[segment], None, &text_notes, seen_ids));
    }
}

fn build_record(
    page: usize,
    segments: &[&RawAnnotation],
    group_id: Option<Uuid>,
    text_notes: &[&RawAnnotation],
    seen_ids: &mut HashSet<Uuid>,
) -> NoteRecord {
    let representative = segments[0];
    // A stored id already claimed by an earlier record is a forgery or a
    // copy-paste duplicate; treat it as absent so record ids stay unique.
    let stored_id = read_meta_id(&representative.metadata, META_NOTE_ID)
        .filter(|id| !seen_ids.contains(id));
    let id = stored_id.unwrap_or_else(Uuid::new_v4);
    seen_ids.insert(id);

    let highlighted_text = segments
        .iter()
        .map(|s| s.covered_text.as_str())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let note_text = resolve_note_text(segments, stored_id, text_notes);

    let now = Utc::now();
    NoteRecord {
        id,
        highlighted_text,
        note_text,
        page_index: page,
        bounds: representative.bounds,
        color: representative.color.clone(),
        group_id: group_id.unwrap_or(id),
        anchor: Some(representative.handle),
        created_at: now,
        updated_at: now,
    }
}

/// Resolve note text: the highlights' own content field wins (topmost
/// segment first), otherwise a sibling text-note linked to this highlight's
/// stored id. Either source is truncated to bound memory.
fn resolve_note_text(
    segments: &[&RawAnnotation],
    stored_id: Option<Uuid>,
    text_notes: &[&RawAnnotation],
) -> String {
    for segment in segments {
        if !segment.contents.is_empty() {
            return truncate_chars(&segment.contents, MAX_TEXT_CHARS);
        }
    }

    // Fallback link target only works against the id actually stored in the
    // document; a minted replacement id cannot have been linked to.
    if let Some(id) = stored_id {
        for note in text_notes {
            if read_meta_id(&note.metadata, META_LINKED_HIGHLIGHT) == Some(id)
                && !note.contents.is_empty()
            {
                return truncate_chars(&note.contents, MAX_TEXT_CHARS);
            }
        }
    }

    String::new()
}
