use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AuthError, Result};

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// OAuth 2.0 token set held by an [`AuthClient`](crate::AuthClient).
///
/// Field names follow the token endpoint so the persisted JSON reads the
/// same as a raw response. A token never carries an empty access token.
///
/// # Security
///
/// The `Debug` implementation redacts both tokens.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl AuthToken {
    /// Creates a bearer token without expiry information.
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Result<Self> {
        let access_token = access_token.into();
        if access_token.is_empty() {
            return Err(AuthError::Parse {
                message: "Access token is empty".to_string(),
                body: String::new(),
            });
        }

        Ok(Self {
            access_token,
            refresh_token,
            expires_at: None,
            token_type: default_token_type(),
            scope: None,
        })
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Builds a token from a token-endpoint response.
    ///
    /// A response that omits the refresh token keeps `previous_refresh`.
    pub fn from_response(
        response: TokenResponse,
        previous_refresh: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let mut token = Self::new(
            response.access_token,
            response.refresh_token.or(previous_refresh),
        )?;
        token.expires_at = response
            .expires_in
            .map(|secs| now + Duration::seconds(secs));
        if let Some(token_type) = response.token_type {
            token.token_type = token_type;
        }
        token.scope = response.scope;
        Ok(token)
    }

    /// True once `now` has reached the expiry instant. Tokens without an
    /// expiry are only discovered to be stale by a rejected request.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Success body of the OAuth token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}
