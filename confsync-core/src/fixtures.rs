//! Test fixtures.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use http::header::AUTHORIZATION;
use http::{Method, StatusCode};
use serde_json::{json, Map, Value};

use crate::models::{ConfigKind, WorkerGroupSet};
use crate::replicator::{DeploymentCredentials, Job, Replicator, ReplicatorConfig};
use crate::transport::{HttpExchange, HttpRequest, HttpResponse, RetryPolicy, Transport};

pub const SOURCE_URL: &str = "http://template.test:9000";
pub const TARGET_URL: &str = "http://uat.test";
pub const SOURCE_GROUP: &str = "default";
pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "changeme";

const COLLECTIONS: [&str; 4] = ["system/inputs", "system/outputs", "pipelines", "lib/vars"];

/// An exchange which fails at the network level a fixed number of times, then responds.
pub struct FlakyExchange {
    failures: u32,
    status: StatusCode,
    attempts: AtomicU32,
}

impl FlakyExchange {
    pub fn new(failures: u32) -> Self {
        Self::with_status(failures, StatusCode::OK)
    }

    pub fn with_status(failures: u32, status: StatusCode) -> Self {
        Self {
            failures,
            status,
            attempts: AtomicU32::new(0),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpExchange for FlakyExchange {
    async fn exchange(&self, _req: &HttpRequest) -> Result<HttpResponse> {
        let previous = self.attempts.fetch_add(1, Ordering::SeqCst);
        if previous < self.failures {
            bail!("connection refused (attempt {})", previous + 1);
        }
        Ok(HttpResponse::new(self.status, "ok"))
    }
}

/// A request observed by `FakeDeployments`.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: Method,
    pub host: String,
    /// The request path, including the query string if any.
    pub path: String,
}

/// An in-memory emulation of the REST API of one or more deployments, keyed by URL authority.
///
/// Requests to an unregistered host fail at the network level, like a DNS failure would.
#[derive(Default)]
pub struct FakeDeployments {
    state: Mutex<FakeState>,
}

type GroupKey = (String, String);
type ObjectKey = (String, String, String, String);
type FileKey = (String, String, String);

#[derive(Default)]
struct FakeState {
    groups: HashMap<String, Vec<String>>,
    objects: HashMap<ObjectKey, Map<String, Value>>,
    lookups: HashMap<FileKey, Vec<u8>>,
    staged: HashMap<FileKey, Vec<u8>>,
    failing_groups: HashMap<GroupKey, StatusCode>,
    omit_upload_filename: HashSet<GroupKey>,
    rejected_logins: HashSet<String>,
    raw_responses: HashMap<(String, String), Vec<u8>>,
    uploads: u64,
    requests: Vec<RecordedRequest>,
}

impl FakeDeployments {
    /// Create a new instance with a source & target deployment registered.
    pub fn new() -> Arc<Self> {
        let this = Arc::new(Self::default());
        this.add_group(SOURCE_URL, SOURCE_GROUP);
        this.add_group(TARGET_URL, "alpha");
        this.add_group(TARGET_URL, "beta");
        this
    }

    /// Register a worker group on the deployment at the given URL, registering the deployment if needed.
    pub fn add_group(&self, url: &str, group: &str) {
        let mut state = self.lock();
        let groups = state.groups.entry(authority(url)).or_default();
        if !groups.iter().any(|existing| existing == group) {
            groups.push(group.to_string());
        }
    }

    /// Store an object as-is, bypassing the API.
    pub fn insert_object(&self, url: &str, group: &str, kind: ConfigKind, object: Value) {
        let fields = match object {
            Value::Object(fields) => fields,
            other => panic!("fixture objects must be JSON objects, got {}", other),
        };
        let id = fields.get("id").and_then(Value::as_str).expect("fixture objects must have an id").to_string();
        let key = (authority(url), group.to_string(), kind.collection_path().to_string(), id);
        self.lock().objects.insert(key, fields);
    }

    /// Get a stored object as-is.
    pub fn object(&self, url: &str, group: &str, kind: ConfigKind, id: &str) -> Option<Map<String, Value>> {
        let key = (authority(url), group.to_string(), kind.collection_path().to_string(), id.to_string());
        self.lock().objects.get(&key).cloned()
    }

    /// Store committed lookup content, bypassing the API.
    pub fn insert_lookup(&self, url: &str, group: &str, id: &str, content: &[u8]) {
        let key = (authority(url), group.to_string(), id.to_string());
        self.lock().lookups.insert(key, content.to_vec());
    }

    /// Get committed lookup content.
    pub fn lookup(&self, url: &str, group: &str, id: &str) -> Option<Vec<u8>> {
        let key = (authority(url), group.to_string(), id.to_string());
        self.lock().lookups.get(&key).cloned()
    }

    /// Make every mutating request against the given worker group respond with the given status.
    pub fn fail_group(&self, url: &str, group: &str, status: StatusCode) {
        self.lock().failing_groups.insert((authority(url), group.to_string()), status);
    }

    /// Make lookup uploads against the given worker group respond without a `filename`.
    pub fn omit_upload_filename(&self, url: &str, group: &str) {
        self.lock().omit_upload_filename.insert((authority(url), group.to_string()));
    }

    /// Make logins against the deployment at the given URL fail.
    pub fn reject_logins(&self, url: &str) {
        self.lock().rejected_logins.insert(authority(url));
    }

    /// Answer every request to the given path of the deployment at the given URL with a `200`
    /// carrying the given body verbatim.
    pub fn respond_raw(&self, url: &str, path: &str, body: &[u8]) {
        self.lock().raw_responses.insert((authority(url), path.to_string()), body.to_vec());
    }

    /// All requests observed so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Count requests with the given method whose path ends with the given suffix.
    pub fn count_requests(&self, method: Method, path_suffix: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|req| req.method == method && req.path.ends_with(path_suffix))
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake deployment state lock poisoned")
    }

    fn handle(&self, req: &HttpRequest) -> Result<HttpResponse> {
        let url = reqwest::Url::parse(&req.url).context("fake deployments received an invalid URL")?;
        let host = authority(&req.url);
        let path = match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        };

        let mut state = self.lock();
        state.requests.push(RecordedRequest {
            method: req.method.clone(),
            host: host.clone(),
            path,
        });
        if !state.groups.contains_key(&host) {
            bail!("error trying to connect: dns error: failed to lookup address information for {}", host);
        }
        if let Some(body) = state.raw_responses.get(&(host.clone(), url.path().to_string())) {
            return Ok(HttpResponse::new(StatusCode::OK, body.clone()));
        }

        let route = match url.path().strip_prefix("/api/v1/") {
            Some(route) => route.to_string(),
            None => return Ok(not_found()),
        };
        if route == "auth/login" && req.method == Method::POST {
            return Ok(state.login(&host, req));
        }
        let expected = format!("Bearer {}", token_for(&host));
        let authorized = req.headers.get(AUTHORIZATION).and_then(|val| val.to_str().ok()) == Some(expected.as_str());
        if !authorized {
            return Ok(json_response(StatusCode::UNAUTHORIZED, json!({"message": "Unauthorized"})));
        }
        if route == "master/groups" && req.method == Method::GET {
            let items: Vec<Value> = state.groups[&host].iter().map(|id| json!({ "id": id })).collect();
            return Ok(items_response(items));
        }

        let mut segments = route.splitn(3, '/');
        let (group, rest) = match (segments.next(), segments.next(), segments.next()) {
            (Some("m"), Some(group), Some(rest)) => (group.to_string(), rest.to_string()),
            _ => return Ok(not_found()),
        };
        if !state.groups[&host].contains(&group) {
            return Ok(not_found());
        }
        if req.method != Method::GET {
            if let Some(status) = state.failing_groups.get(&(host.clone(), group.clone())) {
                return Ok(json_response(*status, json!({"message": "injected failure"})));
            }
        }
        let body = req.body.as_deref().unwrap_or_default();

        if let Some(lookup_path) = rest.strip_prefix("system/lookups") {
            let filename = url.query_pairs().find(|(key, _)| key == "filename").map(|(_, val)| val.to_string());
            return Ok(state.handle_lookup(&host, &group, lookup_path, &req.method, filename, body));
        }
        for collection in COLLECTIONS {
            let id = if rest == collection {
                None
            } else if let Some(id) = rest.strip_prefix(collection).and_then(|tail| tail.strip_prefix('/')) {
                Some(id.to_string())
            } else {
                continue;
            };
            let key = (host.clone(), group.clone(), collection.to_string());
            return Ok(state.handle_object(key, id, &req.method, body));
        }
        Ok(not_found())
    }
}

impl FakeState {
    fn login(&self, host: &str, req: &HttpRequest) -> HttpResponse {
        let creds: Value = req
            .body
            .as_deref()
            .and_then(|body| serde_json::from_slice(body).ok())
            .unwrap_or(Value::Null);
        let valid = creds["username"] == USERNAME && creds["password"] == PASSWORD;
        if self.rejected_logins.contains(host) || !valid {
            return json_response(StatusCode::UNAUTHORIZED, json!({"message": "Invalid username or password"}));
        }
        json_response(StatusCode::OK, json!({ "token": token_for(host), "forcePasswordChange": false }))
    }

    fn handle_object(&mut self, key: (String, String, String), id: Option<String>, method: &Method, body: &[u8]) -> HttpResponse {
        let (host, group, collection) = key;
        match (method, id) {
            (&Method::GET, Some(id)) => match self.objects.get(&(host, group, collection, id)) {
                Some(stored) => {
                    // Server computed fields are always reported on reads.
                    let mut object = stored.clone();
                    object.entry("status").or_insert_with(|| json!({"health": "Green", "timestamp": 1700000000000u64}));
                    items_response(vec![Value::Object(object)])
                }
                None => items_response(vec![]),
            },
            (&Method::PATCH, Some(id)) => {
                let object_key = (host, group, collection, id);
                if !self.objects.contains_key(&object_key) {
                    return not_found();
                }
                match serde_json::from_slice::<Map<String, Value>>(body) {
                    Ok(fields) => {
                        self.objects.insert(object_key, fields.clone());
                        items_response(vec![Value::Object(fields)])
                    }
                    Err(_) => bad_request(),
                }
            }
            (&Method::POST, None) => {
                let fields = match serde_json::from_slice::<Map<String, Value>>(body) {
                    Ok(fields) => fields,
                    Err(_) => return bad_request(),
                };
                let id = match fields.get("id").and_then(Value::as_str) {
                    Some(id) => id.to_string(),
                    None => return bad_request(),
                };
                let object_key = (host, group, collection, id);
                if self.objects.contains_key(&object_key) {
                    return json_response(StatusCode::CONFLICT, json!({"message": "object already exists"}));
                }
                self.objects.insert(object_key, fields.clone());
                items_response(vec![Value::Object(fields)])
            }
            _ => not_found(),
        }
    }

    fn handle_lookup(&mut self, host: &str, group: &str, path: &str, method: &Method, filename: Option<String>, body: &[u8]) -> HttpResponse {
        let group_key = (host.to_string(), group.to_string());
        match (method, path) {
            (&Method::PUT, "/") => {
                let filename = match filename {
                    Some(filename) => filename,
                    None => return bad_request(),
                };
                self.uploads += 1;
                let staged_name = format!("{}.{}.tmp", filename.trim_end_matches(".csv"), self.uploads);
                self.staged.insert((host.to_string(), group.to_string(), staged_name.clone()), body.to_vec());
                let rows = body.iter().filter(|byte| **byte == b'\n').count();
                if self.omit_upload_filename.contains(&group_key) {
                    json_response(StatusCode::OK, json!({ "rows": rows }))
                } else {
                    json_response(StatusCode::OK, json!({ "filename": staged_name, "rows": rows }))
                }
            }
            (&Method::GET, _) => {
                let id = match path.strip_prefix('/').and_then(|tail| tail.strip_suffix("/content")) {
                    Some(id) => id,
                    None => return not_found(),
                };
                match self.lookups.get(&(host.to_string(), group.to_string(), id.to_string())) {
                    Some(content) => HttpResponse::new(StatusCode::OK, content.clone()),
                    None => not_found(),
                }
            }
            (&Method::PATCH, _) => {
                let id = match path.strip_prefix('/') {
                    Some(id) if !id.is_empty() => id.to_string(),
                    _ => return not_found(),
                };
                let patch: Value = match serde_json::from_slice(body) {
                    Ok(patch) => patch,
                    Err(_) => return bad_request(),
                };
                let staged_name = match patch["fileInfo"]["filename"].as_str() {
                    Some(name) if patch["id"] == id.as_str() => name.to_string(),
                    _ => return bad_request(),
                };
                match self.staged.remove(&(host.to_string(), group.to_string(), staged_name)) {
                    Some(content) => {
                        self.lookups.insert((host.to_string(), group.to_string(), id.clone()), content);
                        items_response(vec![json!({ "id": id })])
                    }
                    None => bad_request(),
                }
            }
            _ => not_found(),
        }
    }
}

#[async_trait]
impl HttpExchange for FakeDeployments {
    async fn exchange(&self, req: &HttpRequest) -> Result<HttpResponse> {
        self.handle(req)
    }
}

/// Build a transport over the given fake deployments.
pub fn transport(fake: &Arc<FakeDeployments>) -> Transport {
    Transport::new(fake.clone(), RetryPolicy::default())
}

/// Build a replicator copying from the fake source deployment to the fake target deployment.
pub fn replicator(fake: &Arc<FakeDeployments>, concurrency: usize) -> Replicator {
    let config = ReplicatorConfig {
        source: credentials(SOURCE_URL),
        source_worker_group: SOURCE_GROUP.into(),
        target: credentials(TARGET_URL),
        concurrency,
    };
    Replicator::new(config, transport(fake))
}

/// Build a job targeting the given comma separated worker groups.
pub fn job(kind: &str, id: &str, groups: &str) -> Result<Job> {
    Ok(Job {
        kind: kind.into(),
        id: id.into(),
        action: Default::default(),
        target_groups: groups.parse::<WorkerGroupSet>()?,
    })
}

pub fn credentials(url: &str) -> DeploymentCredentials {
    DeploymentCredentials {
        base_url: url.into(),
        username: USERNAME.into(),
        password: PASSWORD.into(),
    }
}

/// The token the fake deployment at the given authority hands out.
pub fn token_for(host: &str) -> String {
    format!("token-{}", host.replace(':', "-"))
}

/// The `host:port` authority of the given URL.
pub fn authority(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(url) => format!("{}:{}", url.host_str().unwrap_or_default(), url.port_or_known_default().unwrap_or_default()),
        Err(_) => url.to_string(),
    }
}

fn json_response(status: StatusCode, body: Value) -> HttpResponse {
    HttpResponse::new(status, body.to_string())
}

fn items_response(items: Vec<Value>) -> HttpResponse {
    let count = items.len();
    json_response(StatusCode::OK, json!({ "items": items, "count": count }))
}

fn not_found() -> HttpResponse {
    json_response(StatusCode::NOT_FOUND, json!({"message": "Not Found"}))
}

fn bad_request() -> HttpResponse {
    json_response(StatusCode::BAD_REQUEST, json!({"message": "Bad Request"}))
}
