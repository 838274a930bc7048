//! Google Drive file API driver
//!
//! Maps sync-root-relative paths onto Drive's id-addressed object model.
//!
//! ## Layout
//!
//! ```text
//! My Drive/
//! └── Joplin/                 app root, created on first use
//!     └── CourseA/
//!         └── notes/
//!             └── note1.md
//! ```
//!
//! Paths are resolved one segment at a time starting from the app root.
//! Every segment but the last must be a folder; the operation decides what
//! the last one must be. Drive allows siblings with the same name, so lookups
//! are ordered by `createdTime` and the oldest match wins. Creation always
//! goes through the same lookup first.
//!
//! Positive resolutions are kept in a [`PathIdCache`]; writes invalidate the
//! touched path and everything beneath it. A cached id whose object turns out
//! to be trashed or deleted is dropped and the path is resolved again.

use async_trait::async_trait;
use bytes::Bytes;
use core_auth::{ApiRequest, AuthClient};
use core_runtime::config::{DEFAULT_PAGE_SIZE, DEFAULT_ROOT_FOLDER_NAME, MAX_PAGE_SIZE};
use core_sync::path;
use core_sync::{
    Content, EntryKind, FileApiDriver, ListOptions, ListResult, PathIdCache, ResolvedId, Result,
    Stat, SyncError, TransferMode,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::error::GoogleDriveError;
use crate::query;
use crate::types::{CreateFileRequest, DriveFile, FilesListResponse, FILE_FIELDS, FOLDER_MIME_TYPE};

/// Google Drive API base URL
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Google Drive media upload base URL
pub const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Alias of the user's "My Drive" folder
const DRIVE_ROOT_ID: &str = "root";

/// Fields needed to tell whether an object is still usable
const LIVENESS_FIELDS: &str = "id,trashed";

pub struct GoogleDriveDriver {
    auth: Arc<AuthClient>,
    path_cache: Arc<PathIdCache>,
    root_folder_name: String,
    page_size: u32,
    /// Memoized id of the app root folder
    root_id: Mutex<Option<String>>,
}

impl GoogleDriveDriver {
    pub fn new(auth: Arc<AuthClient>, path_cache: Arc<PathIdCache>) -> Self {
        Self {
            auth,
            path_cache,
            root_folder_name: DEFAULT_ROOT_FOLDER_NAME.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            root_id: Mutex::new(None),
        }
    }

    pub fn with_root_folder_name(mut self, name: impl Into<String>) -> Self {
        self.root_folder_name = name.into();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn auth(&self) -> &Arc<AuthClient> {
        &self.auth
    }

    pub fn path_cache(&self) -> &Arc<PathIdCache> {
        &self.path_cache
    }

    fn file_url(id: &str) -> String {
        format!("{}/files/{}", DRIVE_API_BASE, id)
    }

    /// Id of the app root folder, looked up or created once.
    async fn root_id(&self) -> Result<String> {
        let mut root = self.root_id.lock().await;
        if let Some(id) = root.as_ref() {
            return Ok(id.clone());
        }

        let id = match self
            .find_child(DRIVE_ROOT_ID, &self.root_folder_name, EntryKind::Folder)
            .await?
        {
            Some(folder) => folder.id,
            None => {
                info!(name = %self.root_folder_name, "Creating app root folder");
                self.create(DRIVE_ROOT_ID, &self.root_folder_name, true)
                    .await?
                    .id
            }
        };

        *root = Some(id.clone());
        Ok(id)
    }

    /// Oldest non-trashed child of `parent_id` named `name`.
    async fn find_child(
        &self,
        parent_id: &str,
        name: &str,
        kind: EntryKind,
    ) -> Result<Option<DriveFile>> {
        let request = ApiRequest::get(format!("{}/files", DRIVE_API_BASE))
            .query("q", query::child(parent_id, name, kind))
            .query("spaces", "drive")
            .query("orderBy", "createdTime")
            .query("pageSize", "1")
            .query("fields", format!("files({})", FILE_FIELDS));

        let response: FilesListResponse = self.auth.request_json(&request).await?;
        Ok(response.files.into_iter().next())
    }

    async fn create(&self, parent_id: &str, name: &str, is_dir: bool) -> Result<DriveFile> {
        let body = serde_json::to_value(CreateFileRequest {
            name,
            mime_type: is_dir.then_some(FOLDER_MIME_TYPE),
            parents: [parent_id],
        })
        .map_err(|e| GoogleDriveError::ParseError(e.to_string()))?;

        let request = ApiRequest::post(format!("{}/files", DRIVE_API_BASE))
            .query("fields", FILE_FIELDS)
            .json(body);

        let file: DriveFile = self.auth.request_json(&request).await?;
        debug!(id = %file.id, name, is_dir, "Created Drive object");
        Ok(file)
    }

    /// Resolves `path` to a Drive id.
    ///
    /// Intermediate segments must be folders and the final one must match
    /// `kind`. With `create`, missing segments are created in path order.
    async fn resolve(&self, path: &str, kind: EntryKind, create: bool) -> Result<Option<ResolvedId>> {
        if path.is_empty() {
            if kind == EntryKind::File {
                return Err(SyncError::invalid_path(path, "the sync root is not a file"));
            }
            return Ok(Some(ResolvedId {
                id: self.root_id().await?,
                is_dir: true,
            }));
        }

        if let Some(hit) = self.path_cache.get(path).await {
            if kind.accepts(hit.is_dir) {
                return Ok(Some(hit));
            }
        }

        let segments = path::segments(path);
        let last = segments.len() - 1;
        let mut parent_id = self.root_id().await?;
        let mut current = String::new();
        let mut resolved = None;

        for (i, name) in segments.into_iter().enumerate() {
            current = path::join(&current, name);
            let segment_kind = if i == last { kind } else { EntryKind::Folder };

            let cached = self
                .path_cache
                .get(&current)
                .await
                .filter(|hit| segment_kind.accepts(hit.is_dir));

            let entry = match cached {
                Some(hit) => hit,
                None => {
                    let found = match self.find_child(&parent_id, name, segment_kind).await? {
                        Some(file) => file,
                        None if create => {
                            self.create(&parent_id, name, segment_kind == EntryKind::Folder)
                                .await?
                        }
                        None => return Ok(None),
                    };
                    let entry = ResolvedId {
                        is_dir: found.is_folder(),
                        id: found.id,
                    };
                    self.path_cache
                        .insert(&current, entry.id.clone(), entry.is_dir)
                        .await;
                    entry
                }
            };

            parent_id = entry.id.clone();
            resolved = Some(entry);
        }

        Ok(resolved)
    }

    /// False when the object is trashed or no longer exists.
    async fn is_live(&self, id: &str) -> Result<bool> {
        let request = ApiRequest::get(Self::file_url(id)).query("fields", LIVENESS_FIELDS);
        match self.auth.request_json::<DriveFile>(&request).await {
            Ok(file) => Ok(!file.trashed),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// [`resolve`](Self::resolve) without create, checking a cached id
    /// against Drive before trusting it.
    async fn resolve_live(&self, path: &str, kind: EntryKind) -> Result<Option<ResolvedId>> {
        if path.is_empty() || self.path_cache.get(path).await.is_none() {
            return self.resolve(path, kind, false).await;
        }

        let Some(entry) = self.resolve(path, kind, false).await? else {
            return Ok(None);
        };
        if self.is_live(&entry.id).await? {
            return Ok(Some(entry));
        }

        debug!(id = %entry.id, "Cached object is trashed or gone");
        self.path_cache.invalidate(path).await;
        self.resolve(path, kind, false).await
    }

    /// Uploads `data` as the new content of `id`. `Ok(false)` when the
    /// object is trashed or gone.
    async fn upload(&self, id: &str, data: Bytes, content_type: &str) -> Result<bool> {
        let request = ApiRequest::patch(format!("{}/files/{}", DRIVE_UPLOAD_BASE, id))
            .query("uploadType", "media")
            .query("fields", LIVENESS_FIELDS)
            .bytes(data, content_type);

        match self.auth.request_json::<DriveFile>(&request).await {
            Ok(file) => Ok(!file.trashed),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn to_stat(path: &str, file: &DriveFile) -> Result<Stat> {
        Ok(Stat {
            path: path.to_string(),
            is_dir: file.is_folder(),
            updated_time: file.updated_time()?,
            is_deleted: file.trashed,
        })
    }
}

#[async_trait]
impl FileApiDriver for GoogleDriveDriver {
    fn backend_name(&self) -> &str {
        "google"
    }

    #[instrument(skip(self))]
    async fn stat(&self, path: &str) -> Result<Option<Stat>> {
        // The second round runs after a stale cached id was dropped.
        for retry in [false, true] {
            let Some(entry) = self.resolve(path, EntryKind::Any, false).await? else {
                return Ok(None);
            };

            let request = ApiRequest::get(Self::file_url(&entry.id)).query("fields", FILE_FIELDS);
            match self.auth.request_json::<DriveFile>(&request).await {
                Ok(file) if !file.trashed || retry => return Ok(Some(Self::to_stat(path, &file)?)),
                Ok(_) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
            self.path_cache.invalidate(path).await;
        }
        Ok(None)
    }

    #[instrument(skip(self, options))]
    async fn list(&self, path: &str, options: ListOptions) -> Result<ListResult> {
        let Some(folder) = self.resolve(path, EntryKind::Folder, false).await? else {
            return Ok(ListResult::empty());
        };

        let mut request = ApiRequest::get(format!("{}/files", DRIVE_API_BASE))
            .query("q", query::children(&folder.id))
            .query("spaces", "drive")
            .query("orderBy", "createdTime")
            .query("pageSize", self.page_size.to_string())
            .query("fields", format!("nextPageToken,files({})", FILE_FIELDS));
        if let Some(token) = options.context {
            request = request.query("pageToken", token);
        }

        let response: FilesListResponse = self.auth.request_json(&request).await?;
        let items = response
            .files
            .iter()
            .map(|file| Self::to_stat(&path::join(path, &file.name), file))
            .collect::<Result<Vec<_>>>()?;

        debug!(items = items.len(), has_more = response.next_page_token.is_some(), "Listed folder");
        Ok(ListResult {
            items,
            has_more: response.next_page_token.is_some(),
            context: response.next_page_token,
        })
    }

    #[instrument(skip(self))]
    async fn mkdir(&self, path: &str) -> Result<String> {
        self.resolve(path, EntryKind::Folder, true)
            .await?
            .map(|entry| entry.id)
            .ok_or_else(|| SyncError::NotFound {
                path: path.to_string(),
            })
    }

    #[instrument(skip(self))]
    async fn get(&self, path: &str, mode: TransferMode) -> Result<Option<Content>> {
        let Some(entry) = self.resolve_live(path, EntryKind::File).await? else {
            return Ok(None);
        };

        let request = ApiRequest::get(Self::file_url(&entry.id)).query("alt", "media");
        let data = match self.auth.request_bytes(&request).await {
            Ok(data) => data,
            Err(e) if e.is_not_found() => {
                self.path_cache.invalidate(path).await;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let content = match mode {
            TransferMode::Binary => Content::Binary(data),
            TransferMode::Text => Content::Text(String::from_utf8(data.to_vec()).map_err(|e| {
                GoogleDriveError::InvalidText {
                    path: path.to_string(),
                    message: e.to_string(),
                }
            })?),
        };
        Ok(Some(content))
    }

    #[instrument(skip(self, content), fields(bytes = content.len()))]
    async fn put(&self, path: &str, content: Content) -> Result<()> {
        let content_type = content.content_type();
        let data = content.into_bytes();

        // A stale cached id gets one retry against a freshly resolved object.
        for retry in [false, true] {
            let entry = self
                .resolve(path, EntryKind::File, true)
                .await?
                .ok_or_else(|| SyncError::NotFound {
                    path: path.to_string(),
                })?;

            if self.upload(&entry.id, data.clone(), content_type).await? {
                return Ok(());
            }
            self.path_cache.invalidate(path).await;
            if !retry {
                debug!(id = %entry.id, "Upload target is trashed or gone, resolving again");
            }
        }

        Err(SyncError::NotFound {
            path: path.to_string(),
        })
    }

    #[instrument(skip(self))]
    async fn delete(&self, path: &str) -> Result<()> {
        if path.is_empty() {
            return Err(SyncError::invalid_path(
                path,
                "the sync root is removed with clear_root",
            ));
        }

        let Some(entry) = self.resolve(path, EntryKind::Any, false).await? else {
            debug!("Nothing to delete");
            return Ok(());
        };

        // Missing objects are coerced to success by the auth client.
        self.auth
            .authorized_request(&ApiRequest::delete(Self::file_url(&entry.id)))
            .await?;
        self.path_cache.invalidate(path).await;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn move_item(&self, old_path: &str, new_path: &str) -> Result<Stat> {
        if old_path.is_empty() || new_path.is_empty() {
            return Err(SyncError::invalid_path(
                if old_path.is_empty() { old_path } else { new_path },
                "the sync root cannot be moved",
            ));
        }

        let source = self
            .resolve(old_path, EntryKind::Any, false)
            .await?
            .ok_or_else(|| SyncError::NotFound {
                path: old_path.to_string(),
            })?;

        if self.resolve(new_path, EntryKind::Any, false).await?.is_some() {
            return Err(SyncError::AlreadyExists {
                path: new_path.to_string(),
            });
        }

        let old_parent = self
            .resolve(path::dirname(old_path), EntryKind::Folder, false)
            .await?
            .ok_or_else(|| SyncError::NotFound {
                path: path::dirname(old_path).to_string(),
            })?;
        let new_parent = self
            .resolve(path::dirname(new_path), EntryKind::Folder, true)
            .await?
            .ok_or_else(|| SyncError::NotFound {
                path: path::dirname(new_path).to_string(),
            })?;

        let mut request = ApiRequest::patch(Self::file_url(&source.id))
            .query("fields", FILE_FIELDS)
            .json(serde_json::json!({ "name": path::basename(new_path) }));
        if old_parent.id != new_parent.id {
            request = request
                .query("addParents", new_parent.id.as_str())
                .query("removeParents", old_parent.id.as_str());
        }

        let file: DriveFile = self.auth.request_json(&request).await?;
        self.path_cache.invalidate(old_path).await;
        self.path_cache.invalidate(new_path).await;

        info!("Moved");
        Self::to_stat(new_path, &file)
    }

    #[instrument(skip(self))]
    async fn clear_root(&self) -> Result<()> {
        let mut root = self.root_id.lock().await;

        let id = match root.take() {
            Some(id) => Some(id),
            None => self
                .find_child(DRIVE_ROOT_ID, &self.root_folder_name, EntryKind::Folder)
                .await?
                .map(|folder| folder.id),
        };

        if let Some(id) = id {
            self.auth
                .authorized_request(&ApiRequest::delete(Self::file_url(&id)))
                .await?;
            info!(name = %self.root_folder_name, "Deleted app root folder");
        }

        self.path_cache.clear().await;
        Ok(())
    }
}
