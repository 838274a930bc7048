//! # Sync Configuration
//!
//! [`SyncConfig`] carries the host bridges and tunables that every sync
//! target needs. It is assembled with [`SyncConfigBuilder`], which validates
//! eagerly so a misconfigured host fails at startup instead of mid-sync.
//!
//! ## Required capabilities
//!
//! - `HttpClient` - every remote call
//! - `SettingsStore` - OAuth tokens and delta snapshots
//!
//! With the `desktop-shims` feature, missing capabilities fall back to the
//! `bridge-desktop` adapters (`ReqwestHttpClient`, and a `SqliteSettingsStore`
//! under `data_dir`). Without it, a missing capability is a
//! [`Error::CapabilityMissing`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{GoogleDriveSettings, SyncConfig};
//! use std::sync::Arc;
//!
//! let config = SyncConfig::builder()
//!     .http_client(Arc::new(ReqwestHttpClient::new()?))
//!     .settings_store(Arc::new(settings))
//!     .google_drive(GoogleDriveSettings::new("client-id.apps.googleusercontent.com"))
//!     .delta_page_limit(100)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{Clock, FileSystemAccess, HttpClient, SettingsStore, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_PAGE_SIZE: u32 = 100;
/// Largest page size the Drive `files.list` endpoint accepts.
pub const MAX_PAGE_SIZE: u32 = 1000;
pub const DEFAULT_DELTA_PAGE_LIMIT: usize = 50;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_MAX_AUTH_ATTEMPTS: u32 = 5;
pub const DEFAULT_PATH_CACHE_CAPACITY: usize = 512;
pub const DEFAULT_PATH_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost";
pub const DEFAULT_ROOT_FOLDER_NAME: &str = "Joplin";

/// OAuth client registration and remote layout for the Google Drive target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleDriveSettings {
    pub client_id: String,
    /// Installed-app clients may omit the secret.
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    /// Name of the app folder created under the Drive root.
    pub root_folder_name: String,
}

impl GoogleDriveSettings {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            root_folder_name: DEFAULT_ROOT_FOLDER_NAME.to_string(),
        }
    }

    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = uri.into();
        self
    }

    pub fn with_root_folder_name(mut self, name: impl Into<String>) -> Self {
        self.root_folder_name = name.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::Config(
                "Google Drive client_id cannot be empty".to_string(),
            ));
        }
        if self.redirect_uri.trim().is_empty() {
            return Err(Error::Config(
                "Google Drive redirect_uri cannot be empty".to_string(),
            ));
        }
        let name = self.root_folder_name.trim();
        if name.is_empty() || name.contains('/') {
            return Err(Error::Config(format!(
                "Invalid root folder name '{}': must be a single non-empty path segment",
                self.root_folder_name
            )));
        }
        Ok(())
    }
}

/// Host bridges and tunables shared by all sync targets.
#[derive(Clone)]
pub struct SyncConfig {
    pub http_client: Arc<dyn HttpClient>,
    pub settings_store: Arc<dyn SettingsStore>,
    /// Needed only for file-backed transfers.
    pub file_system: Option<Arc<dyn FileSystemAccess>>,
    pub clock: Arc<dyn Clock>,
    /// Directory for desktop-default state (settings database).
    pub data_dir: Option<PathBuf>,
    pub google_drive: Option<GoogleDriveSettings>,
    /// Root directory of the local file-system target.
    pub local_sync_dir: Option<PathBuf>,
    /// Items per `list` page requested from the backend.
    pub page_size: u32,
    /// Change events per delta page.
    pub delta_page_limit: usize,
    pub request_timeout: Duration,
    /// Attempts per authorized request, counting expired-token retries.
    pub max_auth_attempts: u32,
    pub path_cache_capacity: usize,
    pub path_cache_ttl: Duration,
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("http_client", &"HttpClient { ... }")
            .field("settings_store", &"SettingsStore { ... }")
            .field(
                "file_system",
                &self.file_system.as_ref().map(|_| "FileSystemAccess { ... }"),
            )
            .field("data_dir", &self.data_dir)
            .field("google_drive", &self.google_drive.as_ref().map(|g| &g.client_id))
            .field("local_sync_dir", &self.local_sync_dir)
            .field("page_size", &self.page_size)
            .field("delta_page_limit", &self.delta_page_limit)
            .field("request_timeout", &self.request_timeout)
            .field("max_auth_attempts", &self.max_auth_attempts)
            .field("path_cache_capacity", &self.path_cache_capacity)
            .field("path_cache_ttl", &self.path_cache_ttl)
            .finish()
    }
}

impl SyncConfig {
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Checks numeric bounds and provider settings.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::Config(format!(
                "page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }

        if self.delta_page_limit == 0 {
            return Err(Error::Config(
                "delta_page_limit must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_auth_attempts == 0 {
            return Err(Error::Config(
                "max_auth_attempts must be at least 1".to_string(),
            ));
        }

        if self.path_cache_capacity == 0 {
            return Err(Error::Config(
                "path_cache_capacity must be greater than 0".to_string(),
            ));
        }

        if let Some(google) = &self.google_drive {
            google.validate()?;
        }

        if let Some(dir) = &self.local_sync_dir {
            if dir.as_os_str().is_empty() {
                return Err(Error::Config(
                    "local_sync_dir cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "An HttpClient is required for remote sync targets. \
                 Desktop: enable the 'desktop-shims' feature to use ReqwestHttpClient. \
                 Mobile: inject the platform HTTP stack."
            .to_string(),
    }
}

fn settings_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "A SettingsStore is required to persist tokens and delta snapshots. \
                 Desktop: enable the 'desktop-shims' feature and set data_dir to use SqliteSettingsStore. \
                 Mobile: inject platform-native settings (UserDefaults/DataStore)."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    let client = bridge_desktop::ReqwestHttpClient::new()
        .map_err(|e| Error::Internal(format!("Failed to create default HttpClient: {}", e)))?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(http_client_missing_error())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(data_dir: Option<&PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;
    use tokio::runtime::{Builder, Handle};

    let path = data_dir
        .ok_or_else(settings_store_missing_error)?
        .join("settings.db");

    let init_store = move || -> Result<SqliteSettingsStore> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                Error::Internal(format!(
                    "Failed to create Tokio runtime for default settings store: {}",
                    e
                ))
            })?;

        runtime
            .block_on(SqliteSettingsStore::new(path))
            .map_err(|e| {
                Error::Internal(format!("Failed to initialize default SettingsStore: {}", e))
            })
    };

    // A runtime cannot be blocked on from inside another one.
    let store = if Handle::try_current().is_ok() {
        std::thread::spawn(init_store).join().map_err(|_| {
            Error::Internal("Thread panicked while creating default SettingsStore".to_string())
        })??
    } else {
        init_store()?
    };

    Ok(Arc::new(store))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(_data_dir: Option<&PathBuf>) -> Result<Arc<dyn SettingsStore>> {
    Err(settings_store_missing_error())
}

/// Builder for [`SyncConfig`].
#[derive(Default)]
pub struct SyncConfigBuilder {
    http_client: Option<Arc<dyn HttpClient>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    clock: Option<Arc<dyn Clock>>,
    data_dir: Option<PathBuf>,
    google_drive: Option<GoogleDriveSettings>,
    local_sync_dir: Option<PathBuf>,
    page_size: Option<u32>,
    delta_page_limit: Option<usize>,
    request_timeout: Option<Duration>,
    max_auth_attempts: Option<u32>,
    path_cache_capacity: Option<usize>,
    path_cache_ttl: Option<Duration>,
}

impl SyncConfigBuilder {
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn data_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn google_drive(mut self, settings: GoogleDriveSettings) -> Self {
        self.google_drive = Some(settings);
        self
    }

    pub fn local_sync_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.local_sync_dir = Some(dir.into());
        self
    }

    pub fn page_size(mut self, size: u32) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn delta_page_limit(mut self, limit: usize) -> Self {
        self.delta_page_limit = Some(limit);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn max_auth_attempts(mut self, attempts: u32) -> Self {
        self.max_auth_attempts = Some(attempts);
        self
    }

    pub fn path_cache_capacity(mut self, capacity: usize) -> Self {
        self.path_cache_capacity = Some(capacity);
        self
    }

    pub fn path_cache_ttl(mut self, ttl: Duration) -> Self {
        self.path_cache_ttl = Some(ttl);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when a required bridge is absent and no
    ///   desktop default applies
    /// - [`Error::Config`] when a value is out of range
    pub fn build(self) -> Result<SyncConfig> {
        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(self.data_dir.as_ref())?,
        };

        let config = SyncConfig {
            http_client,
            settings_store,
            file_system: self.file_system,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            data_dir: self.data_dir,
            google_drive: self.google_drive,
            local_sync_dir: self.local_sync_dir,
            page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            delta_page_limit: self.delta_page_limit.unwrap_or(DEFAULT_DELTA_PAGE_LIMIT),
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            max_auth_attempts: self.max_auth_attempts.unwrap_or(DEFAULT_MAX_AUTH_ATTEMPTS),
            path_cache_capacity: self
                .path_cache_capacity
                .unwrap_or(DEFAULT_PATH_CACHE_CAPACITY),
            path_cache_ttl: self.path_cache_ttl.unwrap_or(DEFAULT_PATH_CACHE_TTL),
        };

        config.validate()?;
        Ok(config)
    }
}
