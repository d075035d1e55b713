//! Secondary note lookup index
//!
//! Location lookups key on `(page, quantized bounds)`: exact match after
//! rounding, robust to the same sub-unit drift the writer tolerates, but
//! O(1). Group lookups key on the group identifier. Rebuilt fully at load,
//! then maintained incrementally on every store mutation.

use std::collections::HashMap;

use uuid::Uuid;

use crate::notes::types::{NoteRecord, Rect};

type LocationKey = (usize, [i64; 4]);

/// Index over the note store's records
#[derive(Debug, Default)]
pub struct NoteIndex {
    by_location: HashMap<LocationKey, Uuid>,
    by_group: HashMap<Uuid, Vec<Uuid>>,
}

impl NoteIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from scratch. Only used at document load.
    pub fn rebuild<'a>(records: impl IntoIterator<Item = &'a NoteRecord>) -> Self {
        let mut index = Self::new();
        for record in records {
            index.put(record);
        }
        index
    }

    pub fn put(&mut self, record: &NoteRecord) {
        self.by_location
            .insert(Self::location_key(record.page_index, &record.bounds), record.id);
        self.by_group
            .entry(record.group_id)
            .or_default()
            .push(record.id);
    }

    pub fn remove(&mut self, record: &NoteRecord) {
        self.by_location
            .remove(&Self::location_key(record.page_index, &record.bounds));
        if let Some(members) = self.by_group.get_mut(&record.group_id) {
            members.retain(|id| *id != record.id);
            if members.is_empty() {
                self.by_group.remove(&record.group_id);
            }
        }
    }

    /// Record id at this exact (post-quantization) location, if any.
    pub fn find_by_location(&self, page: usize, bounds: &Rect) -> Option<Uuid> {
        self.by_location
            .get(&Self::location_key(page, bounds))
            .copied()
    }

    /// A record id belonging to this group, if any.
    pub fn find_by_group(&self, group_id: Uuid) -> Option<Uuid> {
        self.by_group
            .get(&group_id)
            .and_then(|members| members.first())
            .copied()
    }

    pub fn len(&self) -> usize {
        self.by_location.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_location.is_empty()
    }

    fn location_key(page: usize, bounds: &Rect) -> LocationKey {
        (page, bounds.quantized())
    }
}
