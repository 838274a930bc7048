//! OAuth 2.0 authorization code grant
//!
//! Builds the consent URL and performs the two form POSTs against the token
//! endpoint: the authorization-code exchange and the refresh grant.
//!
//! The flow itself holds no token state. [`AuthClient`](crate::AuthClient)
//! decides what to store or clear based on the outcome.
//!
//! # Example
//!
//! ```no_run
//! use core_auth::oauth::{OAuthConfig, OAuthFlow};
//! use std::sync::Arc;
//!
//! # fn example(http_client: Arc<dyn bridge_traits::HttpClient>) -> core_auth::Result<()> {
//! let config = OAuthConfig {
//!     provider_name: "google".to_string(),
//!     client_id: "client-id.apps.googleusercontent.com".to_string(),
//!     client_secret: None,
//!     redirect_uri: "http://localhost".to_string(),
//!     scopes: vec!["https://www.googleapis.com/auth/drive".to_string()],
//!     auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
//!     token_url: "https://www.googleapis.com/oauth2/v4/token".to_string(),
//! };
//!
//! let flow = OAuthFlow::new(config, http_client);
//! let url = flow.authorization_url()?;
//! // Open `url` in a browser and capture the returned code...
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::TokenResponse;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

/// OAuth 2.0 provider configuration.
#[derive(Clone)]
pub struct OAuthConfig {
    /// Short provider name used in logs and events (e.g. `google`)
    pub provider_name: String,
    pub client_id: String,
    /// Omitted for installed-application clients
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Authorization endpoint URL
    pub auth_url: String,
    /// Token endpoint URL
    pub token_url: String,
}

impl OAuthConfig {
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(AuthError::Config("client_id cannot be empty".to_string()));
        }
        for (name, value) in [("auth_url", &self.auth_url), ("token_url", &self.token_url)] {
            Url::parse(value)
                .map_err(|e| AuthError::Config(format!("invalid {}: {}", name, e)))?;
        }
        Ok(())
    }
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("provider_name", &self.provider_name)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .finish()
    }
}

/// Authorization code grant against one provider.
pub struct OAuthFlow {
    config: OAuthConfig,
    http_client: Arc<dyn HttpClient>,
    timeout: Duration,
}

impl OAuthFlow {
    pub fn new(config: OAuthConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
            timeout: Duration::from_secs(300),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Consent URL the user visits to obtain an authorization code.
    ///
    /// `access_type=offline` makes the provider issue a refresh token.
    /// The result depends only on the configuration.
    #[instrument(skip(self), fields(provider = %self.config.provider_name))]
    pub fn authorization_url(&self) -> Result<String> {
        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|e| AuthError::Config(format!("invalid auth_url: {}", e)))?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("access_type", "offline");

        debug!("Built authorization URL");
        Ok(url.to_string())
    }

    /// Exchanges an authorization code for a token response.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Network`] when the endpoint cannot be reached
    /// - [`AuthError::TokenExchangeFailed`] on a non-2xx status
    /// - [`AuthError::Parse`] when the success body is not a token response
    #[instrument(skip(self, code), fields(provider = %self.config.provider_name))]
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        let mut params = vec![
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
        ];
        if let Some(secret) = self.config.client_secret.as_deref() {
            params.push(("client_secret", secret));
        }

        let response = self.post_form(&params).await?;
        if !response.is_success() {
            let body = response.text_lossy();
            warn!(status = response.status, "Authorization code exchange rejected");
            return Err(AuthError::TokenExchangeFailed {
                status: response.status,
                body,
            });
        }

        parse_token_response(&response)
    }

    /// Requests a new access token with a refresh token.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Network`] when the endpoint cannot be reached
    /// - [`AuthError::RefreshFailed`] on a non-2xx status
    /// - [`AuthError::Parse`] when the success body is not a token response
    #[instrument(skip(self, refresh_token), fields(provider = %self.config.provider_name))]
    pub async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenResponse> {
        let mut params = vec![
            ("client_id", self.config.client_id.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        if let Some(secret) = self.config.client_secret.as_deref() {
            params.push(("client_secret", secret));
        }

        let response = self.post_form(&params).await?;
        if !response.is_success() {
            let body = response.text_lossy();
            warn!(status = response.status, "Token refresh rejected");
            return Err(AuthError::RefreshFailed {
                status: response.status,
                body,
            });
        }

        parse_token_response(&response)
    }

    async fn post_form(&self, params: &[(&str, &str)]) -> Result<HttpResponse> {
        let encoded = serde_urlencoded::to_string(params)
            .map_err(|e| AuthError::Config(format!("cannot encode token request: {}", e)))?;

        let request = HttpRequest::new(HttpMethod::Post, self.config.token_url.clone())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(Bytes::from(encoded))
            .timeout(self.timeout);

        self.http_client
            .execute(request)
            .await
            .map_err(|e| AuthError::Network(e.to_string()))
    }
}

fn parse_token_response(response: &HttpResponse) -> Result<TokenResponse> {
    let body = response.text_lossy();
    serde_json::from_str(&body).map_err(|e| AuthError::Parse {
        message: format!("Cannot parse token response: {}", e),
        body,
    })
}
