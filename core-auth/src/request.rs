//! Request description and backend error classification for authorized calls.

use bridge_traits::http::{HttpMethod, HttpRequest, HttpResponse};
use bytes::Bytes;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::error::ApiError;

/// Error codes meaning the access token is no longer accepted.
const EXPIRED_AUTH_CODES: &[&str] = &["InvalidAuthenticationToken", "unauthenticated", "authError"];

/// Error codes meaning the addressed object does not exist.
const NOT_FOUND_CODES: &[&str] = &["itemNotFound", "notFound"];

/// Body of an authorized request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Bytes { data: Bytes, content_type: String },
}

/// A backend call that the auth client signs and retries.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    /// Overrides the client's default timeout.
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, url)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, value: Value) -> Self {
        self.body = RequestBody::Json(value);
        self
    }

    pub fn bytes(mut self, data: Bytes, content_type: impl Into<String>) -> Self {
        self.body = RequestBody::Bytes {
            data,
            content_type: content_type.into(),
        };
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn describe(&self) -> RequestDescription {
        let body = match &self.body {
            RequestBody::Empty => None,
            RequestBody::Json(value) => Some(value.to_string()),
            RequestBody::Bytes { data, content_type } => {
                Some(format!("<{} bytes of {}>", data.len(), content_type))
            }
        };

        RequestDescription {
            method: self.method,
            url: self.url.clone(),
            query: self.query.clone(),
            body,
        }
    }

    /// URL with the query string appended.
    pub fn full_url(&self) -> std::result::Result<String, url::ParseError> {
        let mut url = Url::parse(&self.url)?;
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url.to_string())
    }

    pub(crate) fn to_http_request(
        &self,
        access_token: &str,
        default_timeout: Duration,
    ) -> std::result::Result<HttpRequest, ApiError> {
        let url = self.full_url().map_err(|e| ApiError::InvalidRequest {
            message: format!("invalid URL: {}", e),
            request: self.describe(),
        })?;

        let request = HttpRequest::new(self.method, url)
            .bearer_token(access_token)
            .timeout(self.timeout.unwrap_or(default_timeout));

        let request = match &self.body {
            RequestBody::Empty => request,
            RequestBody::Json(value) => {
                request
                    .json(value)
                    .map_err(|e| ApiError::InvalidRequest {
                        message: e.to_string(),
                        request: self.describe(),
                    })?
            }
            RequestBody::Bytes { data, content_type } => request
                .header("Content-Type", content_type.clone())
                .body(data.clone()),
        };

        Ok(request)
    }
}

/// What was being attempted, rendered into every request error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescription {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<String>,
}

impl fmt::Display for RequestDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)?;
        if !self.query.is_empty() {
            let pairs: Vec<String> = self
                .query
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            write!(f, " query: {{{}}}", pairs.join(", "))?;
        }
        if let Some(body) = &self.body {
            write!(f, " body: {}", body)?;
        }
        Ok(())
    }
}

/// Details extracted from a non-2xx response body.
///
/// Understands the Google API envelope
/// `{"error": {"code", "message", "status", "errors": [{"reason"}]}}` where
/// `code` may be a number or a string, and the OAuth token endpoint form
/// `{"error": "invalid_grant", "error_description": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendErrorDetails {
    /// String error code, when the backend gives one.
    pub code: Option<String>,
    pub message: String,
    /// Canonical status such as `UNAUTHENTICATED`.
    pub status: Option<String>,
    pub reasons: Vec<String>,
}

impl BackendErrorDetails {
    /// Parses an error body. An empty body yields empty details; any other
    /// non-JSON body is an error carrying the parser message.
    pub fn parse(body: &[u8]) -> std::result::Result<Self, String> {
        if body.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Self::default());
        }

        let value: Value = serde_json::from_slice(body).map_err(|e| e.to_string())?;

        let details = match value.get("error") {
            Some(Value::Object(error)) => {
                let code = match error.get("code") {
                    Some(Value::String(code)) => Some(code.clone()),
                    _ => None,
                };
                let reasons = error
                    .get("errors")
                    .and_then(Value::as_array)
                    .map(|errors| {
                        errors
                            .iter()
                            .filter_map(|e| e.get("reason").and_then(Value::as_str))
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();

                Self {
                    code,
                    message: error
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    status: error
                        .get("status")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    reasons,
                }
            }
            Some(Value::String(code)) => Self {
                code: Some(code.clone()),
                message: value
                    .get("error_description")
                    .and_then(Value::as_str)
                    .unwrap_or(code)
                    .to_string(),
                ..Self::default()
            },
            _ => Self {
                message: value.to_string(),
                ..Self::default()
            },
        };

        Ok(details)
    }

    /// The most specific code available: explicit code, then first reason,
    /// then canonical status.
    pub fn primary_code(&self) -> Option<String> {
        self.code
            .clone()
            .or_else(|| self.reasons.first().cloned())
            .or_else(|| self.status.clone())
    }

    fn codes(&self) -> impl Iterator<Item = &str> {
        self.code
            .iter()
            .chain(self.status.iter())
            .chain(self.reasons.iter())
            .map(String::as_str)
    }

    fn matches_any(&self, known: &[&str]) -> bool {
        self.codes()
            .any(|code| known.iter().any(|k| k.eq_ignore_ascii_case(code)))
    }
}

/// The access token was rejected and a refresh may help.
pub fn is_expired_auth(response: &HttpResponse, details: &BackendErrorDetails) -> bool {
    response.status == 401 || details.matches_any(EXPIRED_AUTH_CODES)
}

/// The addressed object does not exist.
pub fn is_not_found(response: &HttpResponse, details: &BackendErrorDetails) -> bool {
    response.status == 404 || details.matches_any(NOT_FOUND_CODES)
}

pub(crate) fn is_not_found_code(code: &str) -> bool {
    NOT_FOUND_CODES.iter().any(|k| k.eq_ignore_ascii_case(code))
}
