//! In-memory Google Drive backend speaking the v3 REST surface the driver uses.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::time::SystemClock;
use bytes::Bytes;
use chrono::{Duration as ChronoDuration, SecondsFormat, TimeZone, Utc};
use core_auth::{AuthClient, AuthToken};
use core_runtime::config::GoogleDriveSettings;
use core_sync::PathIdCache;
use provider_google_drive::auth::TOKEN_URL;
use provider_google_drive::{google_oauth_config, GoogleDriveDriver, FOLDER_MIME_TYPE};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub const INITIAL_TOKEN: &str = "token-0";

#[derive(Debug, Clone)]
pub struct FakeFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub parents: Vec<String>,
    pub created: i64,
    pub modified: i64,
    pub trashed: bool,
    pub content: Bytes,
}

impl FakeFile {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }

    fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "mimeType": self.mime_type,
            "parents": self.parents,
            "createdTime": timestamp(self.created),
            "modifiedTime": timestamp(self.modified),
            "trashed": self.trashed,
        })
    }
}

fn timestamp(tick: i64) -> String {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (base + ChronoDuration::seconds(tick)).to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Default)]
struct DriveState {
    files: Vec<FakeFile>,
    next_id: u64,
    tick: i64,
    valid_token: String,
    refreshes: usize,
    creates: Vec<(String, bool)>,
    lookups: usize,
    requests: Vec<String>,
}

impl DriveState {
    fn tick(&mut self) -> i64 {
        self.tick += 1;
        self.tick
    }

    fn insert(&mut self, parent: &str, name: &str, mime_type: &str, content: Bytes) -> FakeFile {
        self.next_id += 1;
        let now = self.tick();
        let file = FakeFile {
            id: format!("id{}", self.next_id),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            parents: vec![parent.to_string()],
            created: now,
            modified: now,
            trashed: false,
            content,
        };
        self.files.push(file.clone());
        file
    }

    fn file_mut(&mut self, id: &str) -> Option<&mut FakeFile> {
        self.files.iter_mut().find(|f| f.id == id)
    }
}

/// Fake Drive: one valid bearer token at a time, rotated by refresh grants.
pub struct FakeDrive {
    state: Mutex<DriveState>,
}

impl FakeDrive {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(DriveState {
                valid_token: INITIAL_TOKEN.to_string(),
                ..DriveState::default()
            }),
        })
    }

    /// Invalidates the current access token; the next call gets a 401.
    pub fn expire_token(&self) {
        self.state.lock().unwrap().valid_token = "revoked".to_string();
    }

    /// Seeds an object directly, bypassing the API.
    pub fn insert_file(&self, parent: &str, name: &str, content: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state
            .insert(parent, name, "text/plain", Bytes::copy_from_slice(content.as_bytes()))
            .id
    }

    pub fn insert_folder(&self, parent: &str, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.insert(parent, name, FOLDER_MIME_TYPE, Bytes::new()).id
    }

    pub fn trash(&self, id: &str) {
        let mut state = self.state.lock().unwrap();
        let now = state.tick();
        if let Some(file) = state.file_mut(id) {
            file.trashed = true;
            file.modified = now;
        }
    }

    pub fn files_named(&self, name: &str) -> Vec<FakeFile> {
        let state = self.state.lock().unwrap();
        state.files.iter().filter(|f| f.name == name).cloned().collect()
    }

    pub fn file_count(&self) -> usize {
        self.state.lock().unwrap().files.len()
    }

    /// `(name, is_folder)` of every object created through the API.
    pub fn creates(&self) -> Vec<(String, bool)> {
        self.state.lock().unwrap().creates.clone()
    }

    /// Number of by-name child lookups.
    pub fn lookups(&self) -> usize {
        self.state.lock().unwrap().lookups
    }

    pub fn refreshes(&self) -> usize {
        self.state.lock().unwrap().refreshes
    }

    /// `METHOD path` of every API call, token grants excluded.
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn clear_log(&self) {
        let mut state = self.state.lock().unwrap();
        state.creates.clear();
        state.lookups = 0;
        state.requests.clear();
    }

    fn refresh(&self) -> HttpResponse {
        let mut state = self.state.lock().unwrap();
        state.refreshes += 1;
        state.valid_token = format!("token-{}", state.refreshes);
        HttpResponse::new(
            200,
            format!(
                r#"{{"access_token":"{}","expires_in":3599,"token_type":"Bearer"}}"#,
                state.valid_token
            ),
        )
    }

    fn handle(&self, request: &HttpRequest, url: &Url) -> HttpResponse {
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
        let path = url.path().to_string();
        let mut state = self.state.lock().unwrap();
        state.requests.push(format!("{} {}", request.method, path));

        let expected = format!("Bearer {}", state.valid_token);
        if request.header_value("Authorization") != Some(expected.as_str()) {
            return error(401, "UNAUTHENTICATED", "authError");
        }

        let body: Value = request
            .body
            .as_ref()
            .filter(|_| request.header_value("Content-Type") == Some("application/json"))
            .map(|b| serde_json::from_slice(b).unwrap())
            .unwrap_or(Value::Null);

        match (request.method, path.as_str()) {
            (HttpMethod::Get, "/drive/v3/files") => list(&mut state, &query),
            (HttpMethod::Post, "/drive/v3/files") => {
                let name = body["name"].as_str().unwrap().to_string();
                let parent = body["parents"][0].as_str().unwrap().to_string();
                let mime_type = body["mimeType"].as_str().unwrap_or("text/plain").to_string();
                let file = state.insert(&parent, &name, &mime_type, Bytes::new());
                state.creates.push((name, file.is_folder()));
                ok(file.to_json())
            }
            (HttpMethod::Patch, p) if p.starts_with("/upload/drive/v3/files/") => {
                let id = &p["/upload/drive/v3/files/".len()..];
                assert_eq!(query.get("uploadType").map(String::as_str), Some("media"));
                let now = state.tick();
                let content = request.body.clone().unwrap_or_default();
                match state.file_mut(id) {
                    Some(file) => {
                        file.content = content;
                        file.modified = now;
                        ok(file.to_json())
                    }
                    None => not_found(id),
                }
            }
            (method, p) if p.starts_with("/drive/v3/files/") => {
                let id = p["/drive/v3/files/".len()..].to_string();
                match method {
                    HttpMethod::Get => get(&state, &id, &query),
                    HttpMethod::Patch => update(&mut state, &id, &query, &body),
                    HttpMethod::Delete => delete(&mut state, &id),
                    _ => error(405, "METHOD_NOT_ALLOWED", "badRequest"),
                }
            }
            _ => error(400, "INVALID_ARGUMENT", "badRequest"),
        }
    }
}

#[async_trait]
impl HttpClient for FakeDrive {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        if request.url == TOKEN_URL && request.method == HttpMethod::Post {
            return Ok(self.refresh());
        }

        let url = Url::parse(&request.url)
            .map_err(|e| BridgeError::OperationFailed(format!("bad URL {}: {}", request.url, e)))?;
        if url.host_str() != Some("www.googleapis.com") {
            return Err(BridgeError::OperationFailed(format!(
                "unexpected URL {}",
                request.url
            )));
        }
        Ok(self.handle(&request, &url))
    }
}

fn ok(value: Value) -> HttpResponse {
    HttpResponse::new(200, value.to_string())
}

fn error(status: u16, code: &str, reason: &str) -> HttpResponse {
    HttpResponse::new(
        status,
        json!({
            "error": {
                "code": status,
                "message": code,
                "status": code,
                "errors": [{ "reason": reason }]
            }
        })
        .to_string(),
    )
}

fn not_found(id: &str) -> HttpResponse {
    HttpResponse::new(
        404,
        json!({
            "error": {
                "code": 404,
                "message": format!("File not found: {}.", id),
                "errors": [{ "reason": "notFound" }]
            }
        })
        .to_string(),
    )
}

fn get(state: &DriveState, id: &str, query: &HashMap<String, String>) -> HttpResponse {
    let Some(file) = state.files.iter().find(|f| f.id == id) else {
        return not_found(id);
    };
    if query.get("alt").map(String::as_str) == Some("media") {
        HttpResponse::new(200, file.content.clone())
    } else {
        ok(file.to_json())
    }
}

fn update(
    state: &mut DriveState,
    id: &str,
    query: &HashMap<String, String>,
    body: &Value,
) -> HttpResponse {
    let now = state.tick();
    let Some(file) = state.file_mut(id) else {
        return not_found(id);
    };
    if let Some(name) = body["name"].as_str() {
        file.name = name.to_string();
    }
    if let Some(remove) = query.get("removeParents") {
        file.parents.retain(|p| p != remove);
    }
    if let Some(add) = query.get("addParents") {
        file.parents.push(add.clone());
    }
    file.modified = now;
    ok(file.to_json())
}

fn delete(state: &mut DriveState, id: &str) -> HttpResponse {
    if !state.files.iter().any(|f| f.id == id) {
        return not_found(id);
    }

    let mut doomed: HashSet<String> = HashSet::from([id.to_string()]);
    loop {
        let before = doomed.len();
        for file in &state.files {
            if file.parents.iter().any(|p| doomed.contains(p)) {
                doomed.insert(file.id.clone());
            }
        }
        if doomed.len() == before {
            break;
        }
    }
    state.files.retain(|f| !doomed.contains(&f.id));
    HttpResponse::new(204, Bytes::new())
}

fn list(state: &mut DriveState, query: &HashMap<String, String>) -> HttpResponse {
    let clauses = parse_query(query.get("q").map(String::as_str).unwrap_or(""));
    if clauses.iter().any(|c| matches!(c, Clause::Name(_))) {
        state.lookups += 1;
    }

    let mut matching: Vec<&FakeFile> = state
        .files
        .iter()
        .filter(|f| clauses.iter().all(|c| c.matches(f)))
        .collect();
    if query.get("orderBy").map(String::as_str) == Some("createdTime") {
        matching.sort_by_key(|f| f.created);
    }

    let page_size: usize = query
        .get("pageSize")
        .map(|s| s.parse().unwrap())
        .unwrap_or(100);
    let offset: usize = query
        .get("pageToken")
        .map(|s| s.parse().unwrap())
        .unwrap_or(0);
    let end = (offset + page_size).min(matching.len());

    let files: Vec<Value> = matching[offset..end].iter().map(|f| f.to_json()).collect();
    let mut response = json!({ "files": files });
    if end < matching.len() {
        response["nextPageToken"] = Value::String(end.to_string());
    }
    ok(response)
}

enum Clause {
    InParents(String),
    Name(String),
    MimeType(String),
    NotMimeType(String),
    NotTrashed,
}

impl Clause {
    fn matches(&self, file: &FakeFile) -> bool {
        match self {
            Clause::InParents(parent) => file.parents.contains(parent),
            Clause::Name(name) => &file.name == name,
            Clause::MimeType(mime) => &file.mime_type == mime,
            Clause::NotMimeType(mime) => &file.mime_type != mime,
            Clause::NotTrashed => !file.trashed,
        }
    }
}

/// Parses the subset of the Drive query language the driver emits.
fn parse_query(q: &str) -> Vec<Clause> {
    let mut clauses = Vec::new();
    let mut rest = q;

    while !rest.is_empty() {
        let (clause, after) = if rest.starts_with('\'') {
            let (value, after) = read_quoted(rest);
            let after = after
                .strip_prefix(" in parents")
                .unwrap_or_else(|| panic!("unsupported query: {}", q));
            (Clause::InParents(value), after)
        } else if let Some(after) = rest.strip_prefix("name = ") {
            let (value, after) = read_quoted(after);
            (Clause::Name(value), after)
        } else if let Some(after) = rest.strip_prefix("mimeType != ") {
            let (value, after) = read_quoted(after);
            (Clause::NotMimeType(value), after)
        } else if let Some(after) = rest.strip_prefix("mimeType = ") {
            let (value, after) = read_quoted(after);
            (Clause::MimeType(value), after)
        } else if let Some(after) = rest.strip_prefix("trashed = false") {
            (Clause::NotTrashed, after)
        } else {
            panic!("unsupported query: {}", q);
        };

        clauses.push(clause);
        rest = after.strip_prefix(" and ").unwrap_or(after);
    }

    clauses
}

fn read_quoted(s: &str) -> (String, &str) {
    let mut value = String::new();
    let mut chars = s.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                let (_, escaped) = chars.next().expect("dangling escape");
                value.push(escaped);
            }
            '\'' => return (value, &s[i + 1..]),
            c => value.push(c),
        }
    }
    panic!("unterminated string in {}", s);
}

pub fn auth_client(drive: Arc<FakeDrive>) -> Arc<AuthClient> {
    let token = AuthToken::new(INITIAL_TOKEN, Some("refresh-token".to_string())).unwrap();
    Arc::new(
        AuthClient::new(
            8,
            google_oauth_config(&GoogleDriveSettings::new("client-id")),
            drive,
        )
        .with_token(Some(token)),
    )
}

pub fn driver(drive: Arc<FakeDrive>) -> GoogleDriveDriver {
    let cache = Arc::new(PathIdCache::new(
        64,
        Duration::from_secs(300),
        Arc::new(SystemClock),
    ));
    GoogleDriveDriver::new(auth_client(drive), cache)
}
