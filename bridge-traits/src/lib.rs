//! # Host Bridge Traits
//!
//! Capability traits that a host platform implements so the sync core can run
//! without knowing which HTTP stack, settings storage or file system sits
//! underneath.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Single-attempt async HTTP; auth and retry
//!   policy live in `core-auth`
//! - [`SettingsStore`](storage::SettingsStore) - Key-value storage for tokens and
//!   delta snapshots
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Local file I/O for
//!   file-backed transfers
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! Desktop adapters live in `bridge-desktop`.
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with a descriptive error when a required capability is
//! missing:
//!
//! ```ignore
//! let config = SyncConfig::builder()
//!     .settings_store(store)
//!     .build()?; // Err(CapabilityMissing { capability: "HttpClient", .. })
//! ```
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so one adapter can be shared across
//! async tasks behind an `Arc`.

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{Headers, HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use storage::{FileSystemAccess, SettingsStore};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, StderrLogger, SystemClock};
