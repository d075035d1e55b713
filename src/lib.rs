//! marginalia: annotation sync and persistence for page-oriented documents
//!
//! Attaches free-text notes to highlighted spans of a document and persists
//! them inside the document's own container, so the file stays portable and
//! self-contained. The document format is abstracted behind
//! [`document::DocumentAdapter`]; [`document::MemoryDocument`] is the
//! serde-backed reference implementation.
//!
//! [`engine::AnnotationEngine`] is the top-level entry point: it owns the
//! loaded document, the note store, and the save coordinator.

pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod notes;
pub mod persist;

pub use config::EngineConfig;
pub use document::{AnnotationHandle, DocumentAdapter, LoadableDocument, MemoryDocument};
pub use engine::AnnotationEngine;
pub use error::{EngineError, Result};
pub use notes::{EditState, NoteRecord, NoteStore, Rect, DEFAULT_HIGHLIGHT_COLOR};
pub use persist::{SaveCoordinator, SaveStatus};
