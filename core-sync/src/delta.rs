//! # Listing-based delta
//!
//! Detects changes by listing the remote tree and diffing it against the
//! caller's last-seen snapshot (`path -> updated_time`).
//!
//! ## Pass lifecycle
//!
//! ```text
//! delta(cursor: None)          list tree, diff, return page 1 + cursor
//! delta(cursor: Some(c))       return page n + cursor        (has_more)
//! delta(cursor: Some(c))       return last page + snapshot   (!has_more)
//! ```
//!
//! The caller persists the returned snapshot only after every page of the
//! pass was applied. A crash mid-pass replays the pass from the old
//! snapshot, so each change is delivered at least once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet, VecDeque};
use tracing::debug;

use crate::driver::FileApiDriver;
use crate::error::{Result, SyncError};
use crate::path;
use crate::types::{ChangeEvent, ChangeKind, ListOptions, Stat};

pub const DEFAULT_PAGE_LIMIT: usize = 50;

/// Last-seen `path -> updated_time` for files of one sync target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeltaSnapshot {
    entries: BTreeMap<String, DateTime<Utc>>,
}

impl DeltaSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<DateTime<Utc>> {
        self.entries.get(path).copied()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn insert(&mut self, path: impl Into<String>, updated_time: DateTime<Utc>) {
        self.entries.insert(path.into(), updated_time);
    }

    pub fn remove(&mut self, path: &str) -> Option<DateTime<Utc>> {
        self.entries.remove(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, DateTime<Utc>)> {
        self.entries.iter().map(|(p, t)| (p.as_str(), *t))
    }

    /// Splits into (matching, rest).
    fn partition(self, mut predicate: impl FnMut(&str) -> bool) -> (Self, Self) {
        let (matching, rest): (BTreeMap<_, _>, BTreeMap<_, _>) = self
            .entries
            .into_iter()
            .partition(|(path, _)| predicate(path));
        (Self { entries: matching }, Self { entries: rest })
    }

    fn extend(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }
}

impl FromIterator<(String, DateTime<Utc>)> for DeltaSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, DateTime<Utc>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaOptions {
    /// Maximum events per page
    pub page_limit: usize,
    /// Descend into sub-folders
    pub recursive: bool,
}

impl Default for DeltaOptions {
    fn default() -> Self {
        Self {
            page_limit: DEFAULT_PAGE_LIMIT,
            recursive: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeltaRequest {
    pub snapshot: DeltaSnapshot,
    /// Cursor from the previous page; `None` starts a new pass
    pub cursor: Option<DeltaCursor>,
    pub options: DeltaOptions,
}

impl DeltaRequest {
    pub fn start(snapshot: DeltaSnapshot) -> Self {
        Self {
            snapshot,
            ..Self::default()
        }
    }

    pub fn resume(cursor: DeltaCursor) -> Self {
        Self {
            cursor: Some(cursor),
            ..Self::default()
        }
    }

    pub fn with_options(mut self, options: DeltaOptions) -> Self {
        self.options = options;
        self
    }
}

/// Resumption state of one delta pass.
///
/// Holds the events not yet handed out and the snapshot that becomes current
/// once the pass completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaCursor {
    events: Vec<ChangeEvent>,
    offset: usize,
    snapshot: DeltaSnapshot,
}

impl DeltaCursor {
    fn new(events: Vec<ChangeEvent>, snapshot: DeltaSnapshot) -> Self {
        Self {
            events,
            offset: 0,
            snapshot,
        }
    }

    /// Events not yet returned.
    pub fn remaining(&self) -> usize {
        self.events.len().saturating_sub(self.offset)
    }

    pub fn to_token(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| SyncError::Parse {
            context: "delta cursor".to_string(),
            message: e.to_string(),
        })
    }

    pub fn from_token(token: &str) -> Result<Self> {
        let cursor: Self = serde_json::from_str(token).map_err(|e| SyncError::Parse {
            context: "delta cursor".to_string(),
            message: e.to_string(),
        })?;
        if cursor.offset > cursor.events.len() {
            return Err(SyncError::Parse {
                context: "delta cursor".to_string(),
                message: "offset beyond end of events".to_string(),
            });
        }
        Ok(cursor)
    }

    fn next_page(&mut self, limit: usize) -> Vec<ChangeEvent> {
        let end = (self.offset + limit).min(self.events.len());
        let page = self.events[self.offset..end].to_vec();
        self.offset = end;
        page
    }
}

/// One page of a delta pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaPage {
    pub items: Vec<ChangeEvent>,
    pub has_more: bool,
    /// Resume with this while `has_more`
    pub cursor: Option<DeltaCursor>,
    /// Snapshot to persist once this last page is applied
    pub snapshot: Option<DeltaSnapshot>,
}

impl DeltaPage {
    /// Cursor rendered as an opaque string context.
    pub fn context(&self) -> Result<Option<String>> {
        self.cursor.as_ref().map(DeltaCursor::to_token).transpose()
    }
}

/// Diffs a listing against `snapshot`.
///
/// Folders are not reported. A live entry shadows deleted-marked entries of
/// the same path; otherwise the first occurrence of a duplicated path wins.
/// Deleted-marked entries are reported only when the snapshot knew them.
/// Snapshot entries absent from the listing are reported deleted after all
/// listing-derived events, in path order.
///
/// Returns the events and the snapshot describing the listing.
pub fn compute_changes(listing: &[Stat], snapshot: &DeltaSnapshot) -> (Vec<ChangeEvent>, DeltaSnapshot) {
    let mut events = Vec::new();
    let mut seen = HashSet::new();
    let mut next = DeltaSnapshot::new();
    let live: HashSet<&str> = listing
        .iter()
        .filter(|stat| !stat.is_dir && !stat.is_deleted)
        .map(|stat| stat.path.as_str())
        .collect();

    for stat in listing {
        if stat.is_dir || (stat.is_deleted && live.contains(stat.path.as_str())) {
            continue;
        }
        if !seen.insert(stat.path.as_str()) {
            continue;
        }

        if stat.is_deleted {
            if snapshot.contains(&stat.path) {
                events.push(ChangeEvent::new(ChangeKind::Deleted, stat.clone()));
            }
            continue;
        }

        next.insert(stat.path.clone(), stat.updated_time);
        match snapshot.get(&stat.path) {
            None => events.push(ChangeEvent::new(ChangeKind::Created, stat.clone())),
            Some(previous) if stat.updated_time > previous => {
                events.push(ChangeEvent::new(ChangeKind::Updated, stat.clone()))
            }
            Some(_) => {}
        }
    }

    for (path, updated_time) in snapshot.iter() {
        if !seen.contains(path) {
            events.push(ChangeEvent::new(
                ChangeKind::Deleted,
                Stat::file(path, updated_time).deleted(),
            ));
        }
    }

    (events, next)
}

/// Lists `dir` and, when `recursive`, every non-deleted folder beneath it,
/// following pagination contexts in provider order.
pub async fn list_tree<D>(driver: &D, dir: &str, recursive: bool) -> Result<Vec<Stat>>
where
    D: FileApiDriver + ?Sized,
{
    let mut listing = Vec::new();
    let mut pending = VecDeque::from([dir.to_string()]);

    while let Some(current) = pending.pop_front() {
        let mut options = ListOptions::default();
        loop {
            let page = driver.list(&current, options).await?;
            for stat in &page.items {
                if recursive && stat.is_dir && !stat.is_deleted {
                    pending.push_back(stat.path.clone());
                }
            }
            listing.extend(page.items);

            match (page.has_more, page.context) {
                (true, Some(context)) => options = ListOptions::with_context(context),
                _ => break,
            }
        }
    }

    Ok(listing)
}

/// Listing-based delta for drivers without a native change feed.
pub async fn basic_delta<D>(driver: &D, dir: &str, request: DeltaRequest) -> Result<DeltaPage>
where
    D: FileApiDriver + ?Sized,
{
    let DeltaRequest {
        snapshot,
        cursor,
        options,
    } = request;

    let mut cursor = match cursor {
        Some(cursor) => cursor,
        None => {
            let listing = list_tree(driver, dir, options.recursive).await?;
            let (scoped, outside) = snapshot.partition(|p| in_scope(p, dir, options.recursive));
            let (events, mut next) = compute_changes(&listing, &scoped);
            next.extend(outside);

            debug!(
                backend = driver.backend_name(),
                dir,
                listed = listing.len(),
                changes = events.len(),
                "Computed delta"
            );
            DeltaCursor::new(events, next)
        }
    };

    let items = cursor.next_page(options.page_limit.max(1));
    if cursor.remaining() == 0 {
        Ok(DeltaPage {
            items,
            has_more: false,
            cursor: None,
            snapshot: Some(cursor.snapshot),
        })
    } else {
        Ok(DeltaPage {
            items,
            has_more: true,
            cursor: Some(cursor),
            snapshot: None,
        })
    }
}

/// Whether a snapshot entry belongs to the listed scope.
fn in_scope(entry: &str, dir: &str, recursive: bool) -> bool {
    if recursive {
        path::is_within(entry, dir) && entry != dir
    } else {
        path::dirname(entry) == dir
    }
}
