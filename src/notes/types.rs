//! Note record and page geometry types
//!
//! A `NoteRecord` is the logical user-visible entity: one highlight (or a
//! group of highlight segments spanning several lines) plus optional
//! free-text note content. Records are reconstructed from the document's own
//! annotation objects at load time and mutated only through the note store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::AnnotationHandle;

/// Per-component tolerance for rectangle equality, in page coordinate units.
///
/// Covers floating-point drift introduced by the document library's
/// render/storage round-trip.
pub const BOUNDS_TOLERANCE: f64 = 2.0;

/// Default highlight color (CSS color value)
pub const DEFAULT_HIGHLIGHT_COLOR: &str = "#ffff00";

/// Axis-aligned rectangle in page coordinate space
///
/// Origin is at the bottom-left of the page; y increases upward, so a larger
/// `y` is visually closer to the top of the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Tolerance comparison: equal if every component differs by less than
    /// [`BOUNDS_TOLERANCE`].
    pub fn tolerance_eq(&self, other: &Rect) -> bool {
        (self.x - other.x).abs() < BOUNDS_TOLERANCE
            && (self.y - other.y).abs() < BOUNDS_TOLERANCE
            && (self.width - other.width).abs() < BOUNDS_TOLERANCE
            && (self.height - other.height).abs() < BOUNDS_TOLERANCE
    }

    /// Quantize each component to the nearest integer.
    ///
    /// Coarser than [`tolerance_eq`](Rect::tolerance_eq) but exact after
    /// rounding, which is what the location index needs for O(1) lookup.
    pub fn quantized(&self) -> [i64; 4] {
        [
            self.x.round() as i64,
            self.y.round() as i64,
            self.width.round() as i64,
            self.height.round() as i64,
        ]
    }
}

/// One logical annotation: a highlight (or highlight group) with optional
/// user-authored note text
#[derive(Debug, Clone)]
pub struct NoteRecord {
    /// Unique identifier; assigned at creation or recovered from trusted
    /// document metadata.
    pub id: Uuid,
    /// Source-document text the highlight covers. Immutable; re-derived only
    /// by re-extraction.
    pub highlighted_text: String,
    /// Free-form user text. Empty is valid only transiently while the
    /// highlight is being annotated.
    pub note_text: String,
    /// Zero-based page number. Immutable; there is no cross-page move.
    pub page_index: usize,
    /// Bounds of the representative (topmost) highlight segment.
    pub bounds: Rect,
    /// Highlight display color (CSS color value).
    pub color: String,
    /// Shared by every segment of a multi-line selection; equals `id` for a
    /// single-segment highlight.
    pub group_id: Uuid,
    /// Non-owning back-reference to the representative low-level annotation.
    /// Advisory only: it may not survive a reload, so lookups always fall
    /// back to id metadata and then bounds tolerance.
    pub anchor: Option<AnnotationHandle>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl NoteRecord {
    /// Create a record for a fresh single-segment highlight.
    pub fn new(page_index: usize, bounds: Rect, highlighted_text: String, color: String) -> Self {
        let id = Uuid::new_v4();
        let now = Utc::now();
        Self {
            id,
            highlighted_text,
            note_text: String::new(),
            page_index,
            bounds,
            color,
            group_id: id,
            anchor: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Touch the modification timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Editing state of the note UI session
///
/// Valid transitions: `Viewing -> Selected` on click, `Selected -> Editing`
/// on edit request, `Editing -> Viewing` on save or cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditState {
    #[default]
    Viewing,
    Selected(Uuid),
    Editing(Uuid),
}

/// Truncate to at most `max_chars` characters, respecting char boundaries.
///
/// Bounds memory against maliciously oversized note content smuggled in
/// through the document.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
