use crate::request::RequestDescription;
use thiserror::Error;

/// Token lifecycle failures.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error(
        "Cannot refresh token: authentication data is missing. \
         Starting the synchronisation again may fix the problem."
    )]
    MissingRefreshToken,

    #[error("Could not retrieve auth token: HTTP {status}: {body}")]
    TokenExchangeFailed { status: u16, body: String },

    #[error("Token refresh failed: HTTP {status}: {body}")]
    RefreshFailed { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("{message}: {body}")]
    Parse { message: String, body: String },

    #[error("Token storage error: {0}")]
    Storage(String),

    #[error("Invalid OAuth configuration: {0}")]
    Config(String),
}

impl AuthError {
    /// Whether retrying later (without signing in again) may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AuthError::Network(_) | AuthError::Storage(_))
    }
}

/// Failures of an authorized API request.
///
/// Every variant that concerns a specific request renders its
/// [`RequestDescription`] so logs show what was being attempted.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{message} (HTTP {status}, code: {}): {request}", .code.as_deref().unwrap_or("none"))]
    Backend {
        status: u16,
        code: Option<String>,
        message: String,
        request: RequestDescription,
    },

    #[error("Could not execute request after {attempts} attempts: {request}")]
    RetriesExhausted {
        attempts: u32,
        request: RequestDescription,
    },

    #[error("Network error: {message}: {request}")]
    Network {
        message: String,
        request: RequestDescription,
    },

    #[error("Invalid request: {message}: {request}")]
    InvalidRequest {
        message: String,
        request: RequestDescription,
    },

    #[error("Cannot parse JSON: {message}: {body} ({request})")]
    Parse {
        message: String,
        body: String,
        request: RequestDescription,
    },
}

impl ApiError {
    /// Backend reported the addressed object as missing.
    pub fn is_not_found(&self) -> bool {
        match self {
            ApiError::Backend { status, code, .. } => {
                *status == 404
                    || code
                        .as_deref()
                        .is_some_and(|c| crate::request::is_not_found_code(c))
            }
            _ => false,
        }
    }

    /// HTTP status of a backend rejection.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Backend { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn request(&self) -> Option<&RequestDescription> {
        match self {
            ApiError::Backend { request, .. }
            | ApiError::RetriesExhausted { request, .. }
            | ApiError::Network { request, .. }
            | ApiError::InvalidRequest { request, .. }
            | ApiError::Parse { request, .. } => Some(request),
            ApiError::Auth(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;

pub type ApiResult<T> = std::result::Result<T, ApiError>;
