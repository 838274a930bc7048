//! Drive search-query construction.
//!
//! See: https://developers.google.com/drive/api/guides/search-files

use core_sync::EntryKind;

use crate::types::FOLDER_MIME_TYPE;

/// Escapes a value for use inside a single-quoted query string.
pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '\\' || c == '\'' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Non-trashed child of `parent_id` named `name` of the given kind.
pub fn child(parent_id: &str, name: &str, kind: EntryKind) -> String {
    let mut q = format!(
        "'{}' in parents and name = '{}'",
        escape(parent_id),
        escape(name)
    );
    match kind {
        EntryKind::Folder => q.push_str(&format!(" and mimeType = '{}'", FOLDER_MIME_TYPE)),
        EntryKind::File => q.push_str(&format!(" and mimeType != '{}'", FOLDER_MIME_TYPE)),
        EntryKind::Any => {}
    }
    q.push_str(" and trashed = false");
    q
}

/// Every child of `parent_id`, trashed ones included.
pub fn children(parent_id: &str) -> String {
    format!("'{}' in parents", escape(parent_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain.md"), "plain.md");
        assert_eq!(escape("it's"), "it\\'s");
        assert_eq!(escape("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_child_query_by_kind() {
        assert_eq!(
            child("root", "Joplin", EntryKind::Folder),
            "'root' in parents and name = 'Joplin' and mimeType = 'application/vnd.google-apps.folder' and trashed = false"
        );
        assert_eq!(
            child("p1", "it's.md", EntryKind::File),
            "'p1' in parents and name = 'it\\'s.md' and mimeType != 'application/vnd.google-apps.folder' and trashed = false"
        );
        assert_eq!(
            child("p1", "x", EntryKind::Any),
            "'p1' in parents and name = 'x' and trashed = false"
        );
    }
}
