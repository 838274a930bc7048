//! # File API
//!
//! Path-addressable facade over one [`FileApiDriver`]. This is the surface
//! the synchronizer talks to.
//!
//! - Paths are normalized before they reach the driver.
//! - An optional base directory scopes every call: it is prepended on the
//!   way in and stripped from returned paths.
//! - Local-file transfers go through the host [`FileSystemAccess`].

use bridge_traits::storage::FileSystemAccess;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::delta::{DeltaOptions, DeltaPage, DeltaRequest, DeltaSnapshot};
use crate::driver::FileApiDriver;
use crate::error::{Result, SyncError};
use crate::path;
use crate::types::{
    ChangeEvent, Content, Fetched, GetTarget, ListOptions, ListResult, PutSource, Stat,
    TransferMode,
};

pub struct FileApi {
    driver: Arc<dyn FileApiDriver>,
    target_id: u32,
    base_dir: String,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    delta_options: DeltaOptions,
}

impl FileApi {
    pub fn new(driver: Arc<dyn FileApiDriver>, target_id: u32) -> Self {
        Self {
            driver,
            target_id,
            base_dir: String::new(),
            file_system: None,
            delta_options: DeltaOptions::default(),
        }
    }

    pub fn with_base_dir(mut self, base_dir: &str) -> Result<Self> {
        self.base_dir = path::normalize(base_dir)?;
        Ok(self)
    }

    pub fn with_file_system(mut self, file_system: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(file_system);
        self
    }

    pub fn with_delta_options(mut self, options: DeltaOptions) -> Self {
        self.delta_options = options;
        self
    }

    pub fn driver(&self) -> &Arc<dyn FileApiDriver> {
        &self.driver
    }

    pub fn target_id(&self) -> u32 {
        self.target_id
    }

    pub fn base_dir(&self) -> &str {
        &self.base_dir
    }

    pub fn delta_options(&self) -> DeltaOptions {
        self.delta_options
    }

    #[instrument(skip(self), fields(target_id = self.target_id))]
    pub async fn stat(&self, path: &str) -> Result<Option<Stat>> {
        let full = self.full_path(path)?;
        let stat = self.driver.stat(&full).await?;
        Ok(stat.map(|s| self.relative_stat(s)))
    }

    #[instrument(skip(self, options), fields(target_id = self.target_id))]
    pub async fn list(&self, path: &str, options: ListOptions) -> Result<ListResult> {
        let full = self.full_path(path)?;
        let mut result = self.driver.list(&full, options).await?;
        result.items = result
            .items
            .into_iter()
            .map(|s| self.relative_stat(s))
            .collect();
        debug!(items = result.items.len(), has_more = result.has_more, "Listed");
        Ok(result)
    }

    #[instrument(skip(self), fields(target_id = self.target_id))]
    pub async fn mkdir(&self, path: &str) -> Result<String> {
        let full = self.full_path(path)?;
        self.driver.mkdir(&full).await
    }

    #[instrument(skip(self), fields(target_id = self.target_id))]
    pub async fn get(&self, path: &str, target: GetTarget) -> Result<Option<Fetched>> {
        let full = self.full_path(path)?;

        match target {
            GetTarget::Text => Ok(self
                .driver
                .get(&full, TransferMode::Text)
                .await?
                .map(Fetched::Content)),
            GetTarget::Binary => Ok(self
                .driver
                .get(&full, TransferMode::Binary)
                .await?
                .map(Fetched::Content)),
            GetTarget::File(local) => {
                let file_system = self.require_file_system()?;
                let Some(content) = self.driver.get(&full, TransferMode::Binary).await? else {
                    return Ok(None);
                };

                if let Some(parent) = local.parent().filter(|p| !p.as_os_str().is_empty()) {
                    file_system.create_dir_all(parent).await?;
                }
                file_system.write_file(&local, content.into_bytes()).await?;
                Ok(Some(Fetched::File(local)))
            }
        }
    }

    #[instrument(skip(self, source), fields(target_id = self.target_id))]
    pub async fn put(&self, path: &str, source: PutSource) -> Result<()> {
        let full = self.full_path(path)?;

        let content = match source {
            PutSource::Text(text) => Content::Text(text),
            PutSource::Binary(data) => Content::Binary(data),
            PutSource::File(local) => {
                let file_system = self.require_file_system()?;
                Content::Binary(file_system.read_file(&local).await?)
            }
        };

        debug!(bytes = content.len(), "Uploading");
        self.driver.put(&full, content).await
    }

    #[instrument(skip(self), fields(target_id = self.target_id))]
    pub async fn delete(&self, path: &str) -> Result<()> {
        let full = self.full_path(path)?;
        self.driver.delete(&full).await
    }

    #[instrument(skip(self), fields(target_id = self.target_id))]
    pub async fn move_item(&self, old_path: &str, new_path: &str) -> Result<Stat> {
        let old_full = self.full_path(old_path)?;
        let new_full = self.full_path(new_path)?;
        let stat = self.driver.move_item(&old_full, &new_full).await?;
        Ok(self.relative_stat(stat))
    }

    #[instrument(skip(self), fields(target_id = self.target_id))]
    pub async fn set_timestamp(&self, path: &str, time: DateTime<Utc>) -> Result<()> {
        let full = self.full_path(path)?;
        self.driver.set_timestamp(&full, time).await
    }

    #[instrument(skip(self), fields(target_id = self.target_id))]
    pub async fn clear_root(&self) -> Result<()> {
        self.driver.clear_root().await
    }

    #[instrument(skip(self), fields(target_id = self.target_id))]
    pub async fn format(&self) -> Result<()> {
        self.driver.format().await
    }

    /// Next page of changes under `path`.
    ///
    /// Snapshot paths are relative to the base directory on both sides of
    /// the call.
    #[instrument(skip(self, request), fields(target_id = self.target_id, resume = request.cursor.is_some()))]
    pub async fn delta(&self, path: &str, request: DeltaRequest) -> Result<DeltaPage> {
        let full = self.full_path(path)?;

        let request = DeltaRequest {
            snapshot: request
                .snapshot
                .iter()
                .map(|(p, t)| (path::join(&self.base_dir, p), t))
                .collect(),
            ..request
        };

        let page = self.driver.delta(&full, request).await?;

        Ok(DeltaPage {
            items: page
                .items
                .into_iter()
                .map(|event| self.relative_event(event))
                .collect(),
            snapshot: page.snapshot.map(|snapshot| self.relative_snapshot(snapshot)),
            ..page
        })
    }

    fn full_path(&self, path: &str) -> Result<String> {
        let normalized = path::normalize(path)?;
        Ok(path::join(&self.base_dir, &normalized))
    }

    fn relative_path(&self, full: &str) -> String {
        path::strip_base(full, &self.base_dir)
            .unwrap_or(full)
            .to_string()
    }

    fn relative_stat(&self, mut stat: Stat) -> Stat {
        stat.path = self.relative_path(&stat.path);
        stat
    }

    fn relative_event(&self, event: ChangeEvent) -> ChangeEvent {
        ChangeEvent {
            path: self.relative_path(&event.path),
            kind: event.kind,
            stat: self.relative_stat(event.stat),
        }
    }

    fn relative_snapshot(&self, snapshot: DeltaSnapshot) -> DeltaSnapshot {
        snapshot
            .iter()
            .filter_map(|(p, t)| path::strip_base(p, &self.base_dir).map(|r| (r.to_string(), t)))
            .collect()
    }

    fn require_file_system(&self) -> Result<&Arc<dyn FileSystemAccess>> {
        self.file_system
            .as_ref()
            .ok_or_else(|| SyncError::CapabilityMissing {
                capability: "FileSystemAccess".to_string(),
                message: "local file transfers need a host file system".to_string(),
            })
    }
}
