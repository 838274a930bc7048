//! End-to-end behaviour of `AuthClient` against a scripted backend.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::storage::SettingsStore;
use core_auth::{
    ApiError, ApiRequest, AuthClient, AuthError, AuthToken, OAuthConfig, SettingsTokenObserver,
    TokenObserver, TokenStore,
};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TOKEN_URL: &str = "https://oauth.example.com/token";
const FILES_URL: &str = "https://api.example.com/files";

/// Backend that accepts exactly one access token at a time and rotates it on
/// every refresh grant.
struct ScriptedBackend {
    valid_token: Mutex<String>,
    refreshes: AtomicUsize,
    api_calls: AtomicUsize,
    refresh_status: u16,
    refresh_delay: Duration,
    api_override: Mutex<Option<HttpResponse>>,
}

impl ScriptedBackend {
    fn new(valid_token: &str) -> Self {
        Self {
            valid_token: Mutex::new(valid_token.to_string()),
            refreshes: AtomicUsize::new(0),
            api_calls: AtomicUsize::new(0),
            refresh_status: 200,
            refresh_delay: Duration::from_millis(20),
            api_override: Mutex::new(None),
        }
    }

    fn failing_refresh(mut self, status: u16) -> Self {
        self.refresh_status = status;
        self
    }

    fn always_respond(&self, response: HttpResponse) {
        *self.api_override.lock().unwrap() = Some(response);
    }
}

#[async_trait]
impl HttpClient for ScriptedBackend {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        if request.url == TOKEN_URL {
            let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.refresh_delay).await;
            if self.refresh_status != 200 {
                return Ok(HttpResponse::new(
                    self.refresh_status,
                    r#"{"error":"invalid_grant","error_description":"Token has been expired or revoked."}"#,
                ));
            }
            let fresh = format!("fresh-{}", n);
            *self.valid_token.lock().unwrap() = fresh.clone();
            return Ok(HttpResponse::new(
                200,
                format!(r#"{{"access_token":"{}","expires_in":3599}}"#, fresh),
            ));
        }

        if !request.url.starts_with(FILES_URL) {
            return Err(BridgeError::OperationFailed(format!(
                "unexpected URL {}",
                request.url
            )));
        }

        self.api_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(response) = self.api_override.lock().unwrap().clone() {
            return Ok(response);
        }

        let expected = format!("Bearer {}", self.valid_token.lock().unwrap());
        if request.header_value("Authorization") == Some(expected.as_str()) {
            Ok(HttpResponse::new(200, r#"{"files":[]}"#))
        } else {
            Ok(HttpResponse::new(
                401,
                r#"{"error":{"code":401,"message":"Request had invalid authentication credentials.","status":"UNAUTHENTICATED"}}"#,
            ))
        }
    }
}

#[derive(Default)]
struct MemorySettings {
    values: tokio::sync::Mutex<HashMap<String, String>>,
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()> {
        self.values
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_string(&self, key: &str) -> BridgeResult<Option<String>> {
        Ok(self.values.lock().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> BridgeResult<()> {
        self.values.lock().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> BridgeResult<Vec<String>> {
        Ok(self.values.lock().await.keys().cloned().collect())
    }
}

#[derive(Default)]
struct CountingObserver {
    changes: Mutex<Vec<Option<String>>>,
}

#[async_trait]
impl TokenObserver for CountingObserver {
    async fn on_token_changed(&self, token: Option<&AuthToken>) {
        self.changes
            .lock()
            .unwrap()
            .push(token.map(|t| t.access_token.clone()));
    }
}

fn oauth_config() -> OAuthConfig {
    OAuthConfig {
        provider_name: "google".to_string(),
        client_id: "client".to_string(),
        client_secret: None,
        redirect_uri: "http://localhost".to_string(),
        scopes: vec!["https://www.googleapis.com/auth/drive".to_string()],
        auth_url: "https://accounts.example.com/auth".to_string(),
        token_url: TOKEN_URL.to_string(),
    }
}

fn stale_token() -> AuthToken {
    AuthToken::new("stale", Some("1//refresh".to_string())).unwrap()
}

#[tokio::test]
async fn test_expired_token_is_refreshed_transparently() {
    let backend = Arc::new(ScriptedBackend::new("valid"));
    let observer = Arc::new(CountingObserver::default());
    let client = AuthClient::new(8, oauth_config(), backend.clone()).with_token(Some(stale_token()));
    client.add_observer(observer.clone()).await;

    let body: serde_json::Value = client
        .request_json(&ApiRequest::get(FILES_URL))
        .await
        .unwrap();

    assert_eq!(body["files"], serde_json::json!([]));
    assert_eq!(backend.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(backend.api_calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        *observer.changes.lock().unwrap(),
        vec![Some("fresh-1".to_string())]
    );

    let token = client.token().await.unwrap();
    assert_eq!(token.refresh_token.as_deref(), Some("1//refresh"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rejections_trigger_one_refresh() {
    let backend = Arc::new(ScriptedBackend::new("valid"));
    let client = Arc::new(
        AuthClient::new(8, oauth_config(), backend.clone()).with_token(Some(stale_token())),
    );

    let mut handles = Vec::new();
    for _ in 0..8 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            client.authorized_request(&ApiRequest::get(FILES_URL)).await
        }));
    }

    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response.status, 200);
    }

    assert_eq!(backend.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(client.token().await.unwrap().access_token, "fresh-1");
}

#[tokio::test]
async fn test_refresh_failure_clears_token_and_settings() {
    let backend = Arc::new(ScriptedBackend::new("valid").failing_refresh(400));
    let settings = Arc::new(MemorySettings::default());
    let store = TokenStore::new(settings.clone(), 8);
    store.save(&stale_token()).await.unwrap();

    let bus = EventBus::new(16);
    let mut events = bus.subscribe();

    let client = AuthClient::new(8, oauth_config(), backend.clone())
        .with_event_bus(bus)
        .with_token(store.load().await.unwrap());
    client
        .add_observer(Arc::new(SettingsTokenObserver::new(store.clone())))
        .await;

    let err = client
        .authorized_request(&ApiRequest::get(FILES_URL))
        .await
        .unwrap_err();

    match err {
        ApiError::Auth(AuthError::RefreshFailed { status, body }) => {
            assert_eq!(status, 400);
            assert!(body.contains("invalid_grant"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!client.is_authenticated().await);
    assert!(store.load().await.unwrap().is_none());
    assert!(settings.values.lock().await.is_empty());

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(seen.contains(&CoreEvent::Auth(AuthEvent::TokenRefreshing { target_id: 8 })));
    assert!(seen.contains(&CoreEvent::Auth(AuthEvent::SignedOut { target_id: 8 })));
    assert!(seen.iter().any(|e| matches!(
        e,
        CoreEvent::Auth(AuthEvent::AuthError {
            recoverable: false,
            ..
        })
    )));
}

#[tokio::test]
async fn test_waiters_fail_when_refresh_cleared_the_token() {
    let backend = Arc::new(ScriptedBackend::new("valid").failing_refresh(401));
    let client = Arc::new(
        AuthClient::new(8, oauth_config(), backend.clone()).with_token(Some(stale_token())),
    );

    let a = {
        let client = client.clone();
        tokio::spawn(async move { client.authorized_request(&ApiRequest::get(FILES_URL)).await })
    };
    let b = {
        let client = client.clone();
        tokio::spawn(async move { client.authorized_request(&ApiRequest::get(FILES_URL)).await })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    assert!(results.iter().all(|r| r.is_err()));
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(ApiError::Auth(AuthError::RefreshFailed { .. })))));
    assert_eq!(backend.refreshes.load(Ordering::SeqCst), 1);
    assert!(!client.is_authenticated().await);
}

#[tokio::test]
async fn test_attempts_are_bounded() {
    let backend = Arc::new(ScriptedBackend::new("valid"));
    backend.always_respond(HttpResponse::new(
        401,
        r#"{"error":{"code":"InvalidAuthenticationToken","message":"Access token has expired."}}"#,
    ));
    let client = AuthClient::new(8, oauth_config(), backend.clone())
        .with_max_attempts(3)
        .with_token(Some(stale_token()));

    let err = client
        .authorized_request(&ApiRequest::get(FILES_URL))
        .await
        .unwrap_err();

    match &err {
        ApiError::RetriesExhausted { attempts, request } => {
            assert_eq!(*attempts, 3);
            assert_eq!(request.url, FILES_URL);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("GET https://api.example.com/files"));
    assert_eq!(backend.api_calls.load(Ordering::SeqCst), 3);
    assert_eq!(backend.refreshes.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_invalid_json_response_is_parse_error() {
    let backend = Arc::new(ScriptedBackend::new("valid"));
    backend.always_respond(HttpResponse::new(200, "not json"));
    let client = AuthClient::new(8, oauth_config(), backend)
        .with_token(Some(AuthToken::new("valid", None).unwrap()));

    let err = client
        .request_json::<serde_json::Value>(&ApiRequest::get(FILES_URL))
        .await
        .unwrap_err();
    match err {
        ApiError::Parse { body, .. } => assert_eq!(body, "not json"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_exchange_code_signs_in_and_persists() {
    let backend = Arc::new(ScriptedBackend::new("valid"));
    let settings = Arc::new(MemorySettings::default());
    let store = TokenStore::new(settings, 8);
    let client = AuthClient::new(8, oauth_config(), backend);
    client
        .add_observer(Arc::new(SettingsTokenObserver::new(store.clone())))
        .await;

    assert!(!client.is_authenticated().await);
    let token = client.exchange_code("4/code").await.unwrap();

    assert_eq!(token.access_token, "fresh-1");
    assert!(client.is_authenticated().await);
    assert_eq!(store.load().await.unwrap(), Some(token));
}
