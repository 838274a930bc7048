//! Error types for Google Drive provider

use core_sync::SyncError;
use thiserror::Error;

/// Google Drive provider errors
#[derive(Error, Debug)]
pub enum GoogleDriveError {
    /// Failed to parse API response
    #[error("Failed to parse Google Drive response: {0}")]
    ParseError(String),

    /// File resource carries no usable modification time
    #[error("Invalid timestamp on {file_id}: {message}")]
    InvalidTimestamp { file_id: String, message: String },

    /// Downloaded content is not valid UTF-8 text
    #[error("Content of {path} is not valid UTF-8: {message}")]
    InvalidText { path: String, message: String },
}

/// Result type for Google Drive operations
pub type Result<T> = std::result::Result<T, GoogleDriveError>;

impl From<GoogleDriveError> for SyncError {
    fn from(error: GoogleDriveError) -> Self {
        let context = match &error {
            GoogleDriveError::ParseError(_) => "Google Drive response",
            GoogleDriveError::InvalidTimestamp { .. } => "Google Drive timestamp",
            GoogleDriveError::InvalidText { .. } => "Google Drive text content",
        };
        SyncError::Parse {
            context: context.to_string(),
            message: error.to_string(),
        }
    }
}
