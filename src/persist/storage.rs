//! Durable document storage
//!
//! Writes the serialized document atomically: bytes go to a temporary
//! sibling file first and are renamed into place, so any other process
//! reading the same location sees either the old or the new document,
//! never an interleaved partial write.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{EngineError, Result};

/// Atomically replace `path` with `bytes`.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = temp_sibling(path);

    if let Err(err) = tokio::fs::write(&tmp, bytes).await {
        return Err(EngineError::WriteFailed(format!(
            "{}: {}",
            tmp.display(),
            err
        )));
    }

    if let Err(err) = tokio::fs::rename(&tmp, path).await {
        // Best effort: don't leave the temporary behind.
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(EngineError::WriteFailed(format!(
            "{}: {}",
            path.display(),
            err
        )));
    }

    Ok(())
}

/// Temporary file next to the target, so the rename stays on one filesystem.
fn temp_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    path.with_file_name(format!(".{}.tmp-{}", file_name, Uuid::new_v4().simple()))
}
