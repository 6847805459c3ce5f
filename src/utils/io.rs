//! File I/O primitives with consistent error handling.

use crate::error::{Error, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Read a source file fully into memory.
///
/// Missing files, permission problems and non-UTF-8 content all surface as
/// `file.read_failed` against `label` (usually the project-relative path).
pub fn read_source(path: &Path, label: &str) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::file_read(label, e.to_string()))
}

/// Write a source file atomically (temp file in the same directory, then rename).
///
/// Readers always see either the old content or the new content. The original
/// file's permissions are carried over to the replacement.
pub fn write_source_atomic(path: &Path, content: &str, label: &str) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let permissions = fs::metadata(path).ok().map(|m| m.permissions());

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| Error::file_write(label, format!("create temp file: {}", e)))?;

    tmp.write_all(content.as_bytes())
        .map_err(|e| Error::file_write(label, format!("write temp file: {}", e)))?;

    if let Some(permissions) = permissions {
        fs::set_permissions(tmp.path(), permissions)
            .map_err(|e| Error::file_write(label, format!("copy permissions: {}", e)))?;
    }

    tmp.persist(path)
        .map_err(|e| Error::file_write(label, format!("rename temp file: {}", e.error)))?;

    Ok(())
}
