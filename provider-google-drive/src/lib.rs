//! # Google Drive Provider
//!
//! Implements the `FileApiDriver` contract for Google Drive API v3.
//!
//! ## Overview
//!
//! This module provides:
//! - OAuth 2.0 registration for Google accounts (`auth`)
//! - Path → file-id resolution with create-on-demand and an id cache
//! - Text and binary transfers through the media endpoints
//! - Change detection through the listing-based delta of `core-sync`

pub mod auth;
pub mod driver;
pub mod error;
pub mod query;
pub mod types;

pub use auth::google_oauth_config;
pub use driver::{GoogleDriveDriver, DRIVE_API_BASE, DRIVE_UPLOAD_BASE};
pub use error::{GoogleDriveError, Result};
pub use types::{DriveFile, FilesListResponse, FOLDER_MIME_TYPE};
