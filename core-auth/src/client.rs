//! Authorized API client
//!
//! [`AuthClient`] owns the token of one sync target and signs backend
//! requests with it. A rejected token is refreshed once, no matter how many
//! requests observed the rejection, and the request is replayed.
//!
//! ## Single-flight refresh
//!
//! Every stored token bumps a generation counter. A request that saw its
//! token rejected under generation *g* takes the refresh gate; if the
//! generation moved past *g* while it waited, another request already
//! refreshed and the new token is reused.

use crate::error::{ApiError, ApiResult, AuthError, Result};
use crate::oauth::{OAuthConfig, OAuthFlow};
use crate::observer::TokenObserver;
use crate::request::{is_expired_auth, is_not_found, ApiRequest, BackendErrorDetails};
use crate::types::AuthToken;
use bridge_traits::http::{HttpClient, HttpMethod, HttpResponse};
use bridge_traits::time::{Clock, SystemClock};
use bytes::Bytes;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Default)]
struct TokenState {
    token: Option<AuthToken>,
    generation: u64,
}

pub struct AuthClient {
    target_id: u32,
    flow: OAuthFlow,
    http_client: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
    max_attempts: u32,
    request_timeout: Duration,
    state: RwLock<TokenState>,
    refresh_gate: Mutex<()>,
    observers: RwLock<Vec<Arc<dyn TokenObserver>>>,
}

impl AuthClient {
    pub fn new(target_id: u32, config: OAuthConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            target_id,
            flow: OAuthFlow::new(config, http_client.clone()),
            http_client,
            clock: Arc::new(SystemClock),
            event_bus: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            state: RwLock::new(TokenState::default()),
            refresh_gate: Mutex::new(()),
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Attempts per request, counting replays after a refresh. At least one.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self.flow = self.flow.with_timeout(timeout);
        self
    }

    /// Restores a previously stored token without notifying observers.
    pub fn with_token(mut self, token: Option<AuthToken>) -> Self {
        self.state.get_mut().token = token;
        self
    }

    pub fn target_id(&self) -> u32 {
        self.target_id
    }

    pub fn oauth_config(&self) -> &OAuthConfig {
        self.flow.config()
    }

    pub async fn add_observer(&self, observer: Arc<dyn TokenObserver>) {
        self.observers.write().await.push(observer);
    }

    pub fn authorization_url(&self) -> Result<String> {
        self.flow.authorization_url()
    }

    /// Exchanges an authorization code and stores the resulting token.
    ///
    /// A success response that cannot be parsed clears any stored token.
    #[instrument(skip(self, code), fields(target_id = self.target_id))]
    pub async fn exchange_code(&self, code: &str) -> Result<AuthToken> {
        let provider = self.flow.config().provider_name.clone();
        self.emit(AuthEvent::SigningIn {
            target_id: self.target_id,
            provider: provider.clone(),
        });

        let result = match self.flow.exchange_code(code).await {
            Ok(response) => AuthToken::from_response(response, None, self.clock.now()),
            Err(e) => Err(e),
        };

        match result {
            Ok(token) => {
                self.set_token(Some(token.clone())).await;
                info!(provider = %provider, "Signed in");
                self.emit(AuthEvent::SignedIn {
                    target_id: self.target_id,
                    provider,
                });
                Ok(token)
            }
            Err(e) => {
                warn!(error = %e, "Authorization code exchange failed");
                if matches!(e, AuthError::Parse { .. }) {
                    self.set_token(None).await;
                }
                self.emit_error(&e);
                Err(e)
            }
        }
    }

    /// Refreshes the access token now.
    pub async fn refresh(&self) -> Result<AuthToken> {
        let _gate = self.refresh_gate.lock().await;
        self.refresh_inner().await
    }

    pub async fn token(&self) -> Option<AuthToken> {
        self.state.read().await.token.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.token.is_some()
    }

    /// Replaces the token and notifies observers.
    pub async fn set_token(&self, token: Option<AuthToken>) {
        let cleared = token.is_none();
        {
            let mut state = self.state.write().await;
            state.token = token.clone();
            state.generation += 1;
        }

        let observers = self.observers.read().await.clone();
        for observer in observers {
            observer.on_token_changed(token.as_ref()).await;
        }

        if cleared {
            self.emit(AuthEvent::SignedOut {
                target_id: self.target_id,
            });
        }
    }

    pub async fn sign_out(&self) {
        info!(target_id = self.target_id, "Signing out");
        self.set_token(None).await;
    }

    /// Sends `request` with the current access token.
    ///
    /// Expired-auth rejections trigger a refresh and a replay, up to the
    /// configured number of attempts. A `DELETE` of a missing object
    /// succeeds with an empty 204 response.
    #[instrument(
        skip(self, request),
        fields(target_id = self.target_id, method = %request.method, url = %request.url)
    )]
    pub async fn authorized_request(&self, request: &ApiRequest) -> ApiResult<HttpResponse> {
        for attempt in 1..=self.max_attempts {
            let (access_token, generation) = self.current_access_token().await?;
            let http_request = request.to_http_request(&access_token, self.request_timeout)?;

            let response = self
                .http_client
                .execute(http_request)
                .await
                .map_err(|e| ApiError::Network {
                    message: e.to_string(),
                    request: request.describe(),
                })?;

            if response.is_success() {
                return Ok(response);
            }

            let details = match BackendErrorDetails::parse(&response.body) {
                Ok(details) => details,
                Err(message) => {
                    return Err(ApiError::Parse {
                        message,
                        body: response.text_lossy(),
                        request: request.describe(),
                    })
                }
            };

            if is_expired_auth(&response, &details) {
                info!(attempt, status = response.status, "Access token rejected, refreshing");
                self.refresh_after_expiry(generation).await?;
                continue;
            }

            if request.method == HttpMethod::Delete && is_not_found(&response, &details) {
                debug!("Object already gone, treating delete as done");
                return Ok(HttpResponse::new(204, Bytes::new()));
            }

            let message = if details.message.is_empty() {
                format!("HTTP {}", response.status)
            } else {
                details.message.clone()
            };
            return Err(ApiError::Backend {
                status: response.status,
                code: details.primary_code(),
                message,
                request: request.describe(),
            });
        }

        warn!(attempts = self.max_attempts, "Giving up on request");
        Err(ApiError::RetriesExhausted {
            attempts: self.max_attempts,
            request: request.describe(),
        })
    }

    /// Sends `request` and decodes the response body as JSON.
    pub async fn request_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> ApiResult<T> {
        let response = self.authorized_request(request).await?;
        let text = response.text_lossy();
        serde_json::from_str(&text).map_err(|e| ApiError::Parse {
            message: e.to_string(),
            body: text,
            request: request.describe(),
        })
    }

    /// Sends `request` and returns the body as UTF-8 text.
    pub async fn request_text(&self, request: &ApiRequest) -> ApiResult<String> {
        let response = self.authorized_request(request).await?;
        response.text().map_err(|e| ApiError::Parse {
            message: e.to_string(),
            body: response.text_lossy(),
            request: request.describe(),
        })
    }

    pub async fn request_bytes(&self, request: &ApiRequest) -> ApiResult<Bytes> {
        Ok(self.authorized_request(request).await?.body)
    }

    async fn snapshot(&self) -> (Option<AuthToken>, u64) {
        let state = self.state.read().await;
        (state.token.clone(), state.generation)
    }

    /// Access token to send, refreshing first when it is known to be expired.
    async fn current_access_token(&self) -> Result<(String, u64)> {
        let (token, generation) = self.snapshot().await;
        let token = token.ok_or(AuthError::NotAuthenticated)?;
        if !token.is_expired(self.clock.now()) {
            return Ok((token.access_token, generation));
        }

        debug!("Access token expired, refreshing before request");
        self.refresh_after_expiry(generation).await?;

        let (token, generation) = self.snapshot().await;
        let token = token.ok_or(AuthError::NotAuthenticated)?;
        Ok((token.access_token, generation))
    }

    async fn refresh_after_expiry(&self, seen_generation: u64) -> Result<()> {
        let _gate = self.refresh_gate.lock().await;

        {
            let state = self.state.read().await;
            if state.generation != seen_generation {
                debug!("Token replaced while waiting, reusing it");
                return match state.token {
                    Some(_) => Ok(()),
                    None => Err(AuthError::NotAuthenticated),
                };
            }
        }

        self.refresh_inner().await.map(|_| ())
    }

    /// Must be called with the refresh gate held.
    async fn refresh_inner(&self) -> Result<AuthToken> {
        let refresh_token = self
            .state
            .read()
            .await
            .token
            .as_ref()
            .and_then(|t| t.refresh_token.clone())
            .filter(|t| !t.is_empty());

        let Some(refresh_token) = refresh_token else {
            warn!(target_id = self.target_id, "No refresh token, clearing authentication");
            self.set_token(None).await;
            let error = AuthError::MissingRefreshToken;
            self.emit_error(&error);
            return Err(error);
        };

        self.emit(AuthEvent::TokenRefreshing {
            target_id: self.target_id,
        });

        let result = match self.flow.refresh_grant(&refresh_token).await {
            Ok(response) => {
                AuthToken::from_response(response, Some(refresh_token), self.clock.now())
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(token) => {
                self.set_token(Some(token.clone())).await;
                info!(target_id = self.target_id, "Access token refreshed");
                self.emit(AuthEvent::TokenRefreshed {
                    target_id: self.target_id,
                    expires_at: token.expires_at.map(|at| at.timestamp()),
                });
                Ok(token)
            }
            Err(e) => {
                warn!(target_id = self.target_id, error = %e, "Token refresh failed");
                if !e.is_recoverable() {
                    self.set_token(None).await;
                }
                self.emit_error(&e);
                Err(e)
            }
        }
    }

    fn emit(&self, event: AuthEvent) {
        if let Some(bus) = &self.event_bus {
            // No subscribers is not an error.
            let _ = bus.emit(CoreEvent::Auth(event));
        }
    }

    fn emit_error(&self, error: &AuthError) {
        self.emit(AuthEvent::AuthError {
            target_id: self.target_id,
            message: error.to_string(),
            recoverable: error.is_recoverable(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::HttpRequest;
    use chrono::{TimeZone, Utc};

    mockall::mock! {
        Client {}

        #[async_trait]
        impl HttpClient for Client {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn config() -> OAuthConfig {
        OAuthConfig {
            provider_name: "google".to_string(),
            client_id: "client".to_string(),
            client_secret: None,
            redirect_uri: "http://localhost".to_string(),
            scopes: vec!["https://www.googleapis.com/auth/drive".to_string()],
            auth_url: "https://accounts.example.com/auth".to_string(),
            token_url: "https://oauth.example.com/token".to_string(),
        }
    }

    fn token(access: &str) -> AuthToken {
        AuthToken::new(access, Some("1//refresh".to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_request_without_token_is_not_authenticated() {
        let mut http = MockClient::new();
        http.expect_execute().never();
        let client = AuthClient::new(8, config(), Arc::new(http));

        let err = client
            .authorized_request(&ApiRequest::get("https://api.example.com/files"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Auth(AuthError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn test_backend_error_carries_code_and_request() {
        let mut http = MockClient::new();
        http.expect_execute().times(1).returning(|_req: HttpRequest| {
            Ok(HttpResponse::new(
                403,
                r#"{"error":{"code":403,"message":"Rate limit","errors":[{"reason":"userRateLimitExceeded"}]}}"#,
            ))
        });
        let client = AuthClient::new(8, config(), Arc::new(http)).with_token(Some(token("a")));

        let err = client
            .authorized_request(&ApiRequest::get("https://api.example.com/files").query("q", "x"))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(403));
        let text = err.to_string();
        assert!(text.contains("Rate limit"));
        assert!(text.contains("userRateLimitExceeded"));
        assert!(text.contains("GET https://api.example.com/files"));
    }

    #[tokio::test]
    async fn test_unparsable_error_body_is_fatal() {
        let mut http = MockClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(502, "<html>Bad gateway</html>")));
        let client = AuthClient::new(8, config(), Arc::new(http)).with_token(Some(token("a")));

        let err = client
            .authorized_request(&ApiRequest::get("https://api.example.com/files"))
            .await
            .unwrap_err();
        match err {
            ApiError::Parse { body, .. } => assert_eq!(body, "<html>Bad gateway</html>"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_of_missing_object_succeeds() {
        let mut http = MockClient::new();
        http.expect_execute().times(1).returning(|_| {
            Ok(HttpResponse::new(
                404,
                r#"{"error":{"code":404,"message":"File not found","errors":[{"reason":"notFound"}]}}"#,
            ))
        });
        let client = AuthClient::new(8, config(), Arc::new(http)).with_token(Some(token("a")));

        let response = client
            .authorized_request(&ApiRequest::delete("https://api.example.com/files/x"))
            .await
            .unwrap();
        assert_eq!(response.status, 204);
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn test_get_of_missing_object_is_not_found() {
        let mut http = MockClient::new();
        http.expect_execute().times(1).returning(|_| {
            Ok(HttpResponse::new(
                404,
                r#"{"error":{"code":404,"message":"File not found","errors":[{"reason":"notFound"}]}}"#,
            ))
        });
        let client = AuthClient::new(8, config(), Arc::new(http)).with_token(Some(token("a")));

        let err = client
            .authorized_request(&ApiRequest::get("https://api.example.com/files/x"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_missing_refresh_token_clears_authentication() {
        let mut http = MockClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(401, "")));
        let client = AuthClient::new(8, config(), Arc::new(http))
            .with_token(Some(AuthToken::new("a", None).unwrap()));

        let err = client
            .authorized_request(&ApiRequest::get("https://api.example.com/files"))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Auth(AuthError::MissingRefreshToken)));
        assert!(!client.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_before_sending() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        struct FixedClock(chrono::DateTime<Utc>);
        impl Clock for FixedClock {
            fn now(&self) -> chrono::DateTime<Utc> {
                self.0
            }
        }

        let mut http = MockClient::new();
        let mut seq = mockall::Sequence::new();
        http.expect_execute()
            .withf(|req| req.url == "https://oauth.example.com/token")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(HttpResponse::new(200, r#"{"access_token":"fresh","expires_in":3600}"#)));
        http.expect_execute()
            .withf(|req| req.header_value("Authorization") == Some("Bearer fresh"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(HttpResponse::new(200, "{}")));

        let stale = token("stale").with_expires_at(now);
        let client = AuthClient::new(8, config(), Arc::new(http))
            .with_clock(Arc::new(FixedClock(now)))
            .with_token(Some(stale));

        client
            .authorized_request(&ApiRequest::get("https://api.example.com/files"))
            .await
            .unwrap();

        let refreshed = client.token().await.unwrap();
        assert_eq!(refreshed.access_token, "fresh");
        assert_eq!(refreshed.refresh_token.as_deref(), Some("1//refresh"));
    }

    #[tokio::test]
    async fn test_sign_out_emits_event() {
        let bus = EventBus::new(8);
        let mut events = bus.subscribe();
        let client = AuthClient::new(8, config(), Arc::new(MockClient::new()))
            .with_event_bus(bus)
            .with_token(Some(token("a")));

        client.sign_out().await;

        assert!(!client.is_authenticated().await);
        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Auth(AuthEvent::SignedOut { target_id: 8 })
        );
    }
}
