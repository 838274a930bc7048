//! Error types for the local file-system provider

use bridge_traits::BridgeError;
use core_sync::SyncError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LocalError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Content of {path} is not valid UTF-8: {message}")]
    InvalidText { path: String, message: String },

    #[error("Invalid list context {0:?}")]
    InvalidContext(String),
}

impl LocalError {
    pub fn io(path: &str, source: io::Error) -> Self {
        LocalError::Io {
            path: path.to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, LocalError>;

impl From<LocalError> for SyncError {
    fn from(error: LocalError) -> Self {
        match error {
            LocalError::Io { path, source } => SyncError::Bridge(BridgeError::Io(io::Error::new(
                source.kind(),
                format!("{}: {}", path, source),
            ))),
            LocalError::InvalidText { .. } => SyncError::Parse {
                context: "local text content".to_string(),
                message: error.to_string(),
            },
            LocalError::InvalidContext(_) => SyncError::Parse {
                context: "list context".to_string(),
                message: error.to_string(),
            },
        }
    }
}
