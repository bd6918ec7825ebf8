// SPDX-License-Identifier: MIT

//! `writeJsonAtomic`: temp file + rename on the same filesystem, with an
//! fsync of both the file and its parent directory so a crash mid-write
//! never leaves a partial file where a reader expects a complete one.

use std::io::Write;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum AtomicWriteError {
    #[error("failed to serialize {path}: {source}")]
    Serialize { path: String, source: serde_json::Error },
    #[error("failed to write {path}: {source}")]
    Io { path: String, source: std::io::Error },
}

/// Atomically write `value` as pretty-printed JSON to `path`.
///
/// Writes to `<path>.tmp-<pid>` in the same directory, fsyncs the temp file,
/// renames it over `path` (atomic on a single filesystem), then fsyncs the
/// parent directory so the rename itself is durable.
pub fn write_json_atomic<T: serde::Serialize>(
    path: &Path,
    value: &T,
) -> Result<(), AtomicWriteError> {
    let path_str = path.display().to_string();
    let body = serde_json::to_vec_pretty(value)
        .map_err(|source| AtomicWriteError::Serialize { path: path_str.clone(), source })?;
    write_bytes_atomic(path, &body).map_err(|source| AtomicWriteError::Io { path: path_str, source })
}

/// Same durability contract as [`write_json_atomic`] but for raw bytes (used
/// for `progress.txt` appends and other non-JSON artifacts).
pub fn write_bytes_atomic(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let tmp_path = dir.join(format!(
        ".{}.tmp-{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("atomic"),
        std::process::id()
    ));

    {
        let mut file = std::fs::File::create(&tmp_path)?;
        file.write_all(body)?;
        file.sync_all()?;
    }

    std::fs::rename(&tmp_path, path)?;
    fsync_dir(dir)?;
    Ok(())
}

/// Append `text` to a file, creating it if absent. Not atomic in the
/// temp+rename sense (progress.txt is append-only and single-writer under
/// the Operation Lock), but still fsyncs so the append survives a crash.
pub fn append_text(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(text.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

#[cfg(unix)]
fn fsync_dir(dir: &Path) -> std::io::Result<()> {
    let dir_file = std::fs::File::open(dir)?;
    dir_file.sync_all()
}

#[cfg(not(unix))]
fn fsync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
#[path = "atomic_tests.rs"]
mod tests;
