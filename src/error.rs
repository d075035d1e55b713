//! Error types for the annotation engine

use thiserror::Error;

/// Engine-wide result type
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine error type
///
/// Untrusted per-annotation metadata never produces an error: invalid values
/// are treated as absent at the adapter boundary. Only filesystem and
/// document-library failures surface here, once per operation.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The document could not be read or parsed at load time.
    #[error("Document unreadable: {0}")]
    DocumentUnreadable(String),

    /// The document exists but access was denied at load time.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The durable write failed. In-memory state and the dirty flag are
    /// preserved; the caller may retry.
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// A page index outside `[0, page_count)` was supplied.
    #[error("Page {page} out of range (document has {pages} pages)")]
    PageOutOfRange { page: usize, pages: usize },

    /// A multi-segment selection listed segments on more than one page.
    #[error("Highlight group segments must share one page")]
    GroupSpansPages,

    /// A low-level annotation object could not be located in the document.
    #[error("Annotation not found in document")]
    AnnotationMissing,
}

impl EngineError {
    /// Map a filesystem error encountered at document-load time.
    pub(crate) fn from_load_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(err.to_string()),
            _ => Self::DocumentUnreadable(err.to_string()),
        }
    }
}
