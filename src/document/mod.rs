//! Document adapter boundary
//!
//! Abstracts the host document library behind a small trait: pages, typed
//! annotation accessors, and an opaque string-keyed metadata bag. All trust
//! decisions about document-supplied metadata happen here, in one place —
//! the rest of the engine only ever sees validated identifiers.

mod memory;

pub use memory::MemoryDocument;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::notes::Rect;

/// Metadata key carrying a note's identifier.
pub const META_NOTE_ID: &str = "net.marginalia.note-id";
/// Metadata key on text-note objects pointing at the highlight they annotate.
pub const META_LINKED_HIGHLIGHT: &str = "net.marginalia.linked-highlight";
/// Metadata key shared by every segment of a multi-line highlight.
pub const META_GROUP_ID: &str = "net.marginalia.group-id";

/// Opaque handle to a low-level annotation object
///
/// Valid only for the lifetime of the loaded document; handles are not
/// guaranteed to survive a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnnotationHandle(pub u64);

/// Kind tag of a low-level annotation object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    /// Rectangular text highlight (bounds + color + optional text content)
    Highlight,
    /// Standalone text note (content only, used as a fallback link target)
    TextNote,
}

/// Read-only snapshot of one low-level annotation object
///
/// `metadata` is untrusted: values come from an attacker-influenceable file
/// and must pass [`read_meta_id`] before being treated as identifiers.
#[derive(Debug, Clone)]
pub struct RawAnnotation {
    pub handle: AnnotationHandle,
    pub kind: AnnotationKind,
    pub bounds: Rect,
    pub color: String,
    /// Free-text note content field of the annotation.
    pub contents: String,
    /// Source-document text covered by the highlight.
    pub covered_text: String,
    pub metadata: HashMap<String, String>,
}

/// Thin interface over the host document's page/annotation container
///
/// Mutation is single-writer: implementations are driven from one exclusive
/// context and need not be internally synchronized.
pub trait DocumentAdapter: Send {
    fn page_count(&self) -> usize;

    /// All annotation objects on a page, in document order.
    fn annotations(&self, page: usize) -> Vec<RawAnnotation>;

    /// Create a highlight object. Contents start empty.
    fn create_highlight(
        &mut self,
        page: usize,
        bounds: Rect,
        color: &str,
        covered_text: &str,
    ) -> Result<AnnotationHandle>;

    /// Create a text-note object.
    fn create_text_note(&mut self, page: usize, contents: &str) -> Result<AnnotationHandle>;

    /// Overwrite an annotation's free-text content field.
    fn set_contents(&mut self, handle: AnnotationHandle, contents: &str) -> Result<()>;

    /// Write one metadata key on an annotation.
    fn set_metadata(&mut self, handle: AnnotationHandle, key: &str, value: &str) -> Result<()>;

    /// Remove exactly one annotation object.
    fn remove(&mut self, handle: AnnotationHandle) -> Result<()>;

    /// Whether a handle still refers to a live annotation.
    fn contains(&self, handle: AnnotationHandle) -> bool;

    /// Serialize the whole document to its binary representation.
    ///
    /// Called while the exclusive context is held; the returned snapshot is
    /// what the durable writer persists, so the writer thread never touches
    /// live state.
    fn to_bytes(&self) -> Result<Vec<u8>>;
}

/// Loadable document backends (construction from stored bytes)
pub trait LoadableDocument: DocumentAdapter + Sized {
    fn from_bytes(bytes: &[u8]) -> Result<Self>;
}

/// Whitelist-and-validate gate for identifier metadata.
///
/// Accepts only values matching `[A-Za-z0-9-]{1,100}` that parse as UUIDs;
/// anything else behaves as if the key were absent. A record whose stored id
/// fails validation gets a freshly minted id on this load, so the same note
/// may carry a different id across reloads — an accepted limitation.
pub fn read_meta_id(metadata: &HashMap<String, String>, key: &str) -> Option<Uuid> {
    let raw = metadata.get(key)?;
    if raw.is_empty() || raw.len() > 100 {
        tracing::debug!(key, len = raw.len(), "rejected metadata value: bad length");
        return None;
    }
    if !raw
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        tracing::debug!(key, "rejected metadata value: illegal characters");
        return None;
    }
    match Uuid::parse_str(raw) {
        Ok(id) => Some(id),
        Err(_) => {
            tracing::debug!(key, "rejected metadata value: not an identifier");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bag(key: &str, value: &str) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(key.to_string(), value.to_string());
        map
    }

    #[test]
    fn test_accepts_well_formed_uuid() {
        let id = Uuid::new_v4();
        let metadata = bag(META_NOTE_ID, &id.to_string());
        assert_eq!(read_meta_id(&metadata, META_NOTE_ID), Some(id));
    }

    #[test]
    fn test_rejects_oversized_value() {
        let forged = "a".repeat(150);
        let metadata = bag(META_NOTE_ID, &forged);
        assert_eq!(read_meta_id(&metadata, META_NOTE_ID), None);
    }

    #[test]
    fn test_rejects_injection_characters() {
        let metadata = bag(META_NOTE_ID, "\"; DROP");
        assert_eq!(read_meta_id(&metadata, META_NOTE_ID), None);
    }

    #[test]
    fn test_rejects_non_identifier() {
        // Passes the character class but is not a parseable identifier.
        let metadata = bag(META_GROUP_ID, "not-a-uuid-at-all");
        assert_eq!(read_meta_id(&metadata, META_GROUP_ID), None);
    }

    #[test]
    fn test_absent_key() {
        let metadata = HashMap::new();
        assert_eq!(read_meta_id(&metadata, META_LINKED_HIGHLIGHT), None);
    }
}
