//! # Authentication
//!
//! OAuth 2.0 token lifecycle and authorized requests for remote sync targets.
//!
//! ## Overview
//!
//! - [`OAuthFlow`] builds the consent URL and talks to the token endpoint.
//! - [`AuthClient`] holds one target's token, signs requests, refreshes on
//!   expired-auth rejections (single-flight) and classifies backend errors.
//! - [`TokenStore`] and [`SettingsTokenObserver`] persist the token in the
//!   host settings store whenever it changes.

pub mod client;
pub mod error;
pub mod oauth;
pub mod observer;
pub mod request;
pub mod token_store;
pub mod types;

pub use client::AuthClient;
pub use error::{ApiError, ApiResult, AuthError, Result};
pub use oauth::{OAuthConfig, OAuthFlow};
pub use observer::TokenObserver;
pub use request::{ApiRequest, BackendErrorDetails, RequestBody, RequestDescription};
pub use token_store::{SettingsTokenObserver, TokenStore};
pub use types::{AuthToken, TokenResponse};
