//! Note domain module
//!
//! The in-memory side of the annotation engine:
//!
//! - record and geometry types
//! - extraction of records from a loaded document
//! - writing record mutations back through the document adapter
//! - the location/group lookup index
//! - the store that owns it all and tracks the dirty flag
//!
//! Multi-line selections are grouped: several low-level highlight segments
//! linked by one group identifier collapse into a single logical note.

pub mod extract;
pub mod index;
pub mod store;
pub mod types;
pub mod writer;

pub use extract::extract;
pub use index::NoteIndex;
pub use store::NoteStore;
pub use types::{EditState, NoteRecord, Rect, BOUNDS_TOLERANCE, DEFAULT_HIGHLIGHT_COLOR};
pub use writer::NoteWriter;
