use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use core_sync::path as sync_path;
use core_sync::{
    Content, FileApiDriver, ListOptions, ListResult, Result, Stat, SyncError, TransferMode,
};
use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, instrument};

use crate::error::LocalError;

pub const BACKEND_NAME: &str = "filesystem";

const DEFAULT_PAGE_SIZE: usize = 1000;

/// Driver over a plain directory on the local disk.
///
/// List pages are cut from the name-sorted directory content; the page
/// context is the offset of the next entry.
pub struct LocalFileDriver {
    root: PathBuf,
    page_size: usize,
}

impl LocalFileDriver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> PathBuf {
        sync_path::segments(path)
            .into_iter()
            .fold(self.root.clone(), |full, segment| full.join(segment))
    }

    async fn metadata(&self, path: &str) -> std::result::Result<Option<Metadata>, LocalError> {
        match fs::metadata(self.full_path(path)).await {
            Ok(meta) => Ok(Some(meta)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LocalError::io(path, e)),
        }
    }

    async fn ensure_parent(&self, path: &str) -> std::result::Result<(), LocalError> {
        let parent = sync_path::dirname(path);
        fs::create_dir_all(self.full_path(parent))
            .await
            .map_err(|e| LocalError::io(parent, e))
    }
}

fn to_stat(path: &str, meta: &Metadata) -> Stat {
    let updated_time = meta
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| DateTime::<Utc>::from(SystemTime::UNIX_EPOCH));
    if meta.is_dir() {
        Stat::dir(path, updated_time)
    } else {
        Stat::file(path, updated_time)
    }
}

fn parse_offset(context: Option<&str>) -> std::result::Result<usize, LocalError> {
    match context {
        None => Ok(0),
        Some(raw) => raw
            .parse()
            .map_err(|_| LocalError::InvalidContext(raw.to_string())),
    }
}

#[async_trait]
impl FileApiDriver for LocalFileDriver {
    fn backend_name(&self) -> &str {
        BACKEND_NAME
    }

    #[instrument(skip(self))]
    async fn stat(&self, path: &str) -> Result<Option<Stat>> {
        Ok(self.metadata(path).await?.map(|meta| to_stat(path, &meta)))
    }

    #[instrument(skip(self, options))]
    async fn list(&self, path: &str, options: ListOptions) -> Result<ListResult> {
        let offset = parse_offset(options.context.as_deref())?;

        let mut reader = match fs::read_dir(self.full_path(path)).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ListResult::empty()),
            Err(e) => return Err(LocalError::io(path, e).into()),
        };

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| LocalError::io(path, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                // Removed between read_dir and metadata
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(LocalError::io(&name, e).into()),
            };
            entries.push((name, meta));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let end = offset.saturating_add(self.page_size).min(entries.len());
        let items: Vec<Stat> = entries
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|(name, meta)| to_stat(&sync_path::join(path, name), meta))
            .collect();
        let has_more = end < entries.len();

        debug!(path, offset, count = items.len(), has_more, "Listed local directory");

        Ok(ListResult {
            items,
            has_more,
            context: has_more.then(|| end.to_string()),
        })
    }

    #[instrument(skip(self))]
    async fn mkdir(&self, path: &str) -> Result<String> {
        let full = self.full_path(path);
        fs::create_dir_all(&full)
            .await
            .map_err(|e| LocalError::io(path, e))?;
        Ok(full.to_string_lossy().into_owned())
    }

    #[instrument(skip(self))]
    async fn get(&self, path: &str, mode: TransferMode) -> Result<Option<Content>> {
        let data = match fs::read(self.full_path(path)).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(LocalError::io(path, e).into()),
        };

        let content = match mode {
            TransferMode::Binary => Content::Binary(Bytes::from(data)),
            TransferMode::Text => Content::Text(String::from_utf8(data).map_err(|e| {
                LocalError::InvalidText {
                    path: path.to_string(),
                    message: e.to_string(),
                }
            })?),
        };
        Ok(Some(content))
    }

    #[instrument(skip(self, content), fields(size = content.len()))]
    async fn put(&self, path: &str, content: Content) -> Result<()> {
        if path.is_empty() {
            return Err(SyncError::invalid_path(path, "cannot write to the sync root"));
        }
        self.ensure_parent(path).await?;
        fs::write(self.full_path(path), content.into_bytes())
            .await
            .map_err(|e| LocalError::io(path, e))?;
        debug!(path, "Wrote local file");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, path: &str) -> Result<()> {
        if path.is_empty() {
            return Err(SyncError::invalid_path(path, "cannot delete the sync root"));
        }
        let full = self.full_path(path);
        let result = match self.metadata(path).await? {
            None => return Ok(()),
            Some(meta) if meta.is_dir() => fs::remove_dir_all(&full).await,
            Some(_) => fs::remove_file(&full).await,
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LocalError::io(path, e).into()),
        }
    }

    #[instrument(skip(self))]
    async fn move_item(&self, old_path: &str, new_path: &str) -> Result<Stat> {
        if self.metadata(old_path).await?.is_none() {
            return Err(SyncError::NotFound {
                path: old_path.to_string(),
            });
        }
        if self.metadata(new_path).await?.is_some() {
            return Err(SyncError::AlreadyExists {
                path: new_path.to_string(),
            });
        }

        self.ensure_parent(new_path).await?;
        fs::rename(self.full_path(old_path), self.full_path(new_path))
            .await
            .map_err(|e| LocalError::io(old_path, e))?;

        self.metadata(new_path)
            .await?
            .map(|meta| to_stat(new_path, &meta))
            .ok_or_else(|| SyncError::NotFound {
                path: new_path.to_string(),
            })
    }

    #[instrument(skip(self))]
    async fn set_timestamp(&self, path: &str, time: DateTime<Utc>) -> Result<()> {
        let full = self.full_path(path);
        let owned = path.to_string();
        let modified = SystemTime::from(time);

        tokio::task::spawn_blocking(move || {
            std::fs::File::options()
                .write(true)
                .open(&full)
                .and_then(|file| file.set_modified(modified))
                .map_err(|e| LocalError::io(&owned, e))
        })
        .await
        .map_err(|e| LocalError::io(path, std::io::Error::other(e)))??;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear_root(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(LocalError::io("", e).into()),
        }
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| LocalError::io("", e))?;
        debug!(root = ?self.root, "Cleared local sync root");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_path_joins_segments() {
        let driver = LocalFileDriver::new("/tmp/sync");
        assert_eq!(driver.full_path(""), PathBuf::from("/tmp/sync"));
        assert_eq!(
            driver.full_path("a/b/c.md"),
            PathBuf::from("/tmp/sync").join("a").join("b").join("c.md")
        );
    }

    #[test]
    fn test_parse_offset() {
        assert_eq!(parse_offset(None).unwrap(), 0);
        assert_eq!(parse_offset(Some("12")).unwrap(), 12);
        assert!(matches!(
            parse_offset(Some("abc")),
            Err(LocalError::InvalidContext(_))
        ));
    }

    #[test]
    fn test_page_size_is_at_least_one() {
        let driver = LocalFileDriver::new("/tmp").with_page_size(0);
        assert_eq!(driver.page_size, 1);
    }
}
