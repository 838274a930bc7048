//! Desktop (macOS, Windows, Linux) implementations of the host bridges.
//!
//! | Bridge | Type | Backing |
//! |---|---|---|
//! | `HttpClient` | [`ReqwestHttpClient`] | reqwest + rustls |
//! | `SettingsStore` | [`SqliteSettingsStore`] | `settings` table via sqlx |
//! | `FileSystemAccess` | [`TokioFileSystem`] | `tokio::fs` under the app data dir |
//!
//! ```ignore
//! let config = SyncConfig::builder()
//!     .http_client(Arc::new(ReqwestHttpClient::new()?))
//!     .settings_store(Arc::new(SqliteSettingsStore::new(dir.join("settings.db")).await?))
//!     .file_system(Arc::new(TokioFileSystem::new()))
//!     .build()?;
//! ```

mod filesystem;
mod http;
mod settings;

pub use filesystem::TokioFileSystem;
pub use http::{ReqwestHttpClient, DEFAULT_REQUEST_TIMEOUT};
pub use settings::SqliteSettingsStore;
