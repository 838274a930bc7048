use core_auth::{ApiError, AuthError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{operation} is not implemented by the {backend} backend")]
    NotImplemented {
        operation: &'static str,
        backend: String,
    },

    #[error("Not authenticated with sync target {target_id}: sign in to continue")]
    NotAuthenticated { target_id: u32 },

    #[error("Invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Not found: {path}")]
    NotFound { path: String },

    #[error("Already exists: {path}")]
    AlreadyExists { path: String },

    #[error("Cannot parse {context}: {message}")]
    Parse { context: String, message: String },

    #[error("Required capability missing: {capability} ({message})")]
    CapabilityMissing {
        capability: String,
        message: String,
    },

    #[error("Host bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },
}

impl SyncError {
    pub fn not_implemented(operation: &'static str, backend: impl Into<String>) -> Self {
        SyncError::NotImplemented {
            operation,
            backend: backend.into(),
        }
    }

    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        SyncError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// The object addressed by the failing call does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            SyncError::NotFound { .. } => true,
            SyncError::Api(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Whether signing in again is required before retrying.
    pub fn requires_authentication(&self) -> bool {
        match self {
            SyncError::NotAuthenticated { .. } => true,
            SyncError::Auth(e) => !e.is_recoverable(),
            SyncError::Api(ApiError::Auth(e)) => !e.is_recoverable(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
