//! In-memory document backend
//!
//! Reference implementation of [`DocumentAdapter`] backed by plain structs
//! and serialized with JSON. Stands in for the host document library in
//! tests and round-trip checks; production adapters wrap the real library
//! behind the same trait.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{AnnotationHandle, AnnotationKind, DocumentAdapter, LoadableDocument, RawAnnotation};
use crate::error::{EngineError, Result};
use crate::notes::Rect;

/// Page-oriented in-memory document with one annotation list per page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryDocument {
    pages: Vec<Page>,
    next_handle: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Page {
    annotations: Vec<StoredAnnotation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredAnnotation {
    handle: AnnotationHandle,
    kind: AnnotationKind,
    bounds: Rect,
    color: String,
    contents: String,
    covered_text: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

impl MemoryDocument {
    /// Create an empty document with a fixed page count.
    pub fn new(page_count: usize) -> Self {
        Self {
            pages: vec![Page::default(); page_count],
            next_handle: 1,
        }
    }

    fn page(&self, page: usize) -> Result<&Page> {
        self.pages.get(page).ok_or(EngineError::PageOutOfRange {
            page,
            pages: self.pages.len(),
        })
    }

    fn page_mut(&mut self, page: usize) -> Result<&mut Page> {
        let pages = self.pages.len();
        self.pages
            .get_mut(page)
            .ok_or(EngineError::PageOutOfRange { page, pages })
    }

    fn find_mut(&mut self, handle: AnnotationHandle) -> Option<&mut StoredAnnotation> {
        self.pages
            .iter_mut()
            .flat_map(|p| p.annotations.iter_mut())
            .find(|a| a.handle == handle)
    }

    fn mint_handle(&mut self) -> AnnotationHandle {
        let handle = AnnotationHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    /// Inject a raw annotation with arbitrary metadata. Test-and-tooling
    /// entry point for simulating documents written by other programs.
    pub fn insert_raw(
        &mut self,
        page: usize,
        kind: AnnotationKind,
        bounds: Rect,
        color: &str,
        contents: &str,
        covered_text: &str,
        metadata: HashMap<String, String>,
    ) -> Result<AnnotationHandle> {
        let handle = self.mint_handle();
        self.page_mut(page)?.annotations.push(StoredAnnotation {
            handle,
            kind,
            bounds,
            color: color.to_string(),
            contents: contents.to_string(),
            covered_text: covered_text.to_string(),
            metadata,
        });
        Ok(handle)
    }
}

impl DocumentAdapter for MemoryDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn annotations(&self, page: usize) -> Vec<RawAnnotation> {
        match self.page(page) {
            Ok(p) => p
                .annotations
                .iter()
                .map(|a| RawAnnotation {
                    handle: a.handle,
                    kind: a.kind,
                    bounds: a.bounds,
                    color: a.color.clone(),
                    contents: a.contents.clone(),
                    covered_text: a.covered_text.clone(),
                    metadata: a.metadata.clone(),
                })
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    fn create_highlight(
        &mut self,
        page: usize,
        bounds: Rect,
        color: &str,
        covered_text: &str,
    ) -> Result<AnnotationHandle> {
        self.insert_raw(
            page,
            AnnotationKind::Highlight,
            bounds,
            color,
            "",
            covered_text,
            HashMap::new(),
        )
    }

    fn create_text_note(&mut self, page: usize, contents: &str) -> Result<AnnotationHandle> {
        self.insert_raw(
            page,
            AnnotationKind::TextNote,
            Rect::new(0.0, 0.0, 0.0, 0.0),
            "",
            contents,
            "",
            HashMap::new(),
        )
    }

    fn set_contents(&mut self, handle: AnnotationHandle, contents: &str) -> Result<()> {
        let annotation = self.find_mut(handle).ok_or(EngineError::AnnotationMissing)?;
        annotation.contents = contents.to_string();
        Ok(())
    }

    fn set_metadata(&mut self, handle: AnnotationHandle, key: &str, value: &str) -> Result<()> {
        let annotation = self.find_mut(handle).ok_or(EngineError::AnnotationMissing)?;
        annotation.metadata.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, handle: AnnotationHandle) -> Result<()> {
        for page in &mut self.pages {
            if let Some(pos) = page.annotations.iter().position(|a| a.handle == handle) {
                page.annotations.remove(pos);
                return Ok(());
            }
        }
        Err(EngineError::AnnotationMissing)
    }

    fn contains(&self, handle: AnnotationHandle) -> bool {
        self.pages
            .iter()
            .any(|p| p.annotations.iter().any(|a| a.handle == handle))
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| EngineError::WriteFailed(e.to_string()))
    }
}

impl LoadableDocument for MemoryDocument {
    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| EngineError::DocumentUnreadable(e.to_string()))
    }
}
