//! Persistence module
//!
//! Save coordination (debounce, coalescing, concurrency guarding) and the
//! atomic durable write to the document's storage location.

pub mod coordinator;
pub mod storage;

pub use coordinator::{SaveCoordinator, SaveStatus, SnapshotSource};
pub use storage::write_atomic;
