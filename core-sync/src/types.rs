//! Provider-agnostic file records and transfer options.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Provider-agnostic record of one remote entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    /// Sync-root-relative, `/`-separated path
    pub path: String,
    pub is_dir: bool,
    pub updated_time: DateTime<Utc>,
    /// The backend still lists the entry but it was removed (e.g. trashed)
    #[serde(default)]
    pub is_deleted: bool,
}

impl Stat {
    pub fn file(path: impl Into<String>, updated_time: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
            updated_time,
            is_deleted: false,
        }
    }

    pub fn dir(path: impl Into<String>, updated_time: DateTime<Utc>) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
            updated_time,
            is_deleted: false,
        }
    }

    pub fn deleted(mut self) -> Self {
        self.is_deleted = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Pagination context returned by the previous page
    pub context: Option<String>,
}

impl ListOptions {
    pub fn with_context(context: impl Into<String>) -> Self {
        Self {
            context: Some(context.into()),
        }
    }
}

/// One page of a directory listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListResult {
    pub items: Vec<Stat>,
    pub has_more: bool,
    /// Opaque provider token for the next page; `None` once `has_more` is false
    pub context: Option<String>,
}

impl ListResult {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferMode {
    #[default]
    Text,
    Binary,
}

/// File content moved through a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Binary(Bytes),
}

impl Content {
    pub fn len(&self) -> usize {
        match self {
            Content::Text(text) => text.len(),
            Content::Binary(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_bytes(self) -> Bytes {
        match self {
            Content::Text(text) => Bytes::from(text),
            Content::Binary(data) => data,
        }
    }

    pub fn mode(&self) -> TransferMode {
        match self {
            Content::Text(_) => TransferMode::Text,
            Content::Binary(_) => TransferMode::Binary,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Content::Text(_) => "text/plain; charset=utf-8",
            Content::Binary(_) => "application/octet-stream",
        }
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<Bytes> for Content {
    fn from(data: Bytes) -> Self {
        Content::Binary(data)
    }
}

/// Where `get` delivers content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetTarget {
    Text,
    Binary,
    /// Written to a local file through the host file system
    File(PathBuf),
}

/// Result of a `get`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    Content(Content),
    /// Content was written to this local file
    File(PathBuf),
}

/// Where `put` reads content from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutSource {
    Text(String),
    Binary(Bytes),
    /// Read from a local file through the host file system
    File(PathBuf),
}

/// Expected kind of the final path segment during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Folder,
    Any,
}

impl EntryKind {
    pub fn accepts(&self, is_dir: bool) -> bool {
        match self {
            EntryKind::File => !is_dir,
            EntryKind::Folder => is_dir,
            EntryKind::Any => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One change detected by a delta pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub path: String,
    pub kind: ChangeKind,
    pub stat: Stat,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, stat: Stat) -> Self {
        Self {
            path: stat.path.clone(),
            kind,
            stat,
        }
    }
}
