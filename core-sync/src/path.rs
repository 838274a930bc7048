//! Sync-root-relative path handling.
//!
//! Paths are `/`-separated, carry no leading or trailing separator and never
//! contain empty, `.` or `..` segments. The empty string is the sync root.

use crate::error::{Result, SyncError};

/// Normalizes `path` into canonical form.
///
/// Backslashes are accepted as separators, repeated and surrounding
/// separators are dropped and `.` segments are skipped. A `..` segment is
/// rejected since it would escape the sync root.
pub fn normalize(path: &str) -> Result<String> {
    let mut segments = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(SyncError::invalid_path(
                    path,
                    "parent segments are not allowed",
                ))
            }
            s => segments.push(s),
        }
    }
    Ok(segments.join("/"))
}

/// Splits a canonical path into its segments. The root has none.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

pub fn join(dir: &str, name: &str) -> String {
    match (dir.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => dir.to_string(),
        _ => format!("{}/{}", dir, name),
    }
}

/// Parent directory, or `""` for top-level entries and the root.
pub fn dirname(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..i]).unwrap_or("")
}

/// Final segment.
pub fn basename(path: &str) -> &str {
    path.rfind('/').map(|i| &path[i + 1..]).unwrap_or(path)
}

/// True when `path` equals `ancestor` or lies beneath it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    if ancestor.is_empty() {
        return true;
    }
    path == ancestor
        || (path.len() > ancestor.len()
            && path.starts_with(ancestor)
            && path.as_bytes()[ancestor.len()] == b'/')
}

/// Removes the `base` prefix from `path`.
///
/// Returns `None` when `path` is not inside `base`.
pub fn strip_base<'a>(path: &'a str, base: &str) -> Option<&'a str> {
    if base.is_empty() {
        return Some(path);
    }
    if path == base {
        return Some("");
    }
    path.strip_prefix(base)?.strip_prefix('/')
}
