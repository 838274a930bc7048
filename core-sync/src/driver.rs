//! Backend driver contract.
//!
//! A driver maps sync-root-relative paths onto one backend's native object
//! model. Paths reaching a driver are already normalized (see
//! [`crate::path::normalize`]).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::delta::{basic_delta, DeltaPage, DeltaRequest};
use crate::error::{Result, SyncError};
use crate::types::{Content, ListOptions, ListResult, Stat, TransferMode};

#[async_trait]
pub trait FileApiDriver: Send + Sync {
    /// Short backend name used in errors and logs.
    fn backend_name(&self) -> &str;

    /// Metadata of `path`, or `None` when nothing exists there.
    async fn stat(&self, path: &str) -> Result<Option<Stat>>;

    /// One page of the direct children of `path`. A missing directory lists
    /// as empty.
    async fn list(&self, path: &str, options: ListOptions) -> Result<ListResult>;

    /// Ensures a folder exists at `path`, creating missing ancestors, and
    /// returns its backend id.
    async fn mkdir(&self, path: &str) -> Result<String>;

    /// Content of the file at `path`, or `None` when it does not exist.
    async fn get(&self, path: &str, mode: TransferMode) -> Result<Option<Content>>;

    /// Writes `content`, creating the file and missing folders as needed.
    async fn put(&self, path: &str, content: Content) -> Result<()>;

    /// Removes `path`. Deleting something that does not exist succeeds.
    async fn delete(&self, path: &str) -> Result<()>;

    async fn move_item(&self, _old_path: &str, _new_path: &str) -> Result<Stat> {
        Err(SyncError::not_implemented("move", self.backend_name()))
    }

    async fn set_timestamp(&self, _path: &str, _time: DateTime<Utc>) -> Result<()> {
        Err(SyncError::not_implemented("set_timestamp", self.backend_name()))
    }

    /// Removes everything under the sync root.
    async fn clear_root(&self) -> Result<()> {
        Err(SyncError::not_implemented("clear_root", self.backend_name()))
    }

    async fn format(&self) -> Result<()> {
        Err(SyncError::not_implemented("format", self.backend_name()))
    }

    /// Next page of changes under `path`. Backends without a change feed
    /// rely on the listing-based [`basic_delta`].
    async fn delta(&self, path: &str, request: DeltaRequest) -> Result<DeltaPage> {
        basic_delta(self, path, request).await
    }
}
