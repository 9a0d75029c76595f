//! In-process stand-in for the object-storage service

#![allow(dead_code)]

use axum::body::Body;
use axum::extract::{DefaultBodyLimit, Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use popstore_client::ClientConfig;
use popstore_common::ChecksumAlgorithm;
use popstore_common::checksum::digest_hex;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub const ACCESS_ID: &str = "test-id";
pub const SECRET_KEY: &str = "test-secret";

const CREATION_DATE: &str = "2026-01-01T00:00:00Z";

#[derive(Default)]
pub struct MockBucket {
    pub acl: String,
    pub locked: bool,
    pub objects: BTreeMap<String, StoredObject>,
}

pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: String,
}

struct PendingUpload {
    bucket: String,
    key: String,
    parts: u64,
    size: u64,
    content_type: String,
    received: BTreeMap<u64, Bytes>,
}

#[derive(Default)]
pub struct MockState {
    pub buckets: BTreeMap<String, MockBucket>,
    uploads: HashMap<String, PendingUpload>,
    next_upload: u64,
    /// Lengths of every part received, in arrival order
    pub part_sizes: Vec<u64>,
    /// Number of multipart initiations seen
    pub initiations: u64,
    /// Serve object data in chunks of this many bytes, pausing between them
    pub trickle: Option<(usize, Duration)>,
}

pub type SharedState = Arc<Mutex<MockState>>;

pub struct MockServer {
    pub endpoint: String,
    pub state: SharedState,
    handle: JoinHandle<()>,
}

impl MockServer {
    pub async fn spawn() -> Self {
        let state = SharedState::default();
        let app = router(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            endpoint: format!("http://{addr}"),
            state,
            handle,
        }
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(&self.endpoint, ACCESS_ID, SECRET_KEY)
    }

    pub fn part_sizes(&self) -> Vec<u64> {
        self.state.lock().part_sizes.clone()
    }

    pub fn object_data(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .map(|o| o.data.clone())
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn router(state: SharedState) -> Router {
    let api = Router::new()
        .route("/buckets/create-bucket/{bucket}", post(create_bucket))
        .route("/buckets/list-buckets", get(list_buckets))
        .route("/buckets/delete-bucket/{bucket}", delete(delete_bucket))
        .route(
            "/objects/create-multipart-object/{bucket}/{key}",
            post(create_multipart_object),
        )
        .route(
            "/objects/upload-object-part/{upload_id}/{index}/{len}",
            put(upload_object_part),
        )
        .route("/objects/list-objects/{bucket}", get(list_objects))
        .route(
            "/objects/get-object-checksum/{algorithm}/{bucket}/{key}",
            get(get_object_checksum),
        )
        .route("/objects/get-object-data/{bucket}/{key}", get(get_object_data))
        .route("/status", get(status))
        .layer(DefaultBodyLimit::max(16 * 1024 * 1024))
        .layer(middleware::from_fn(require_auth))
        .with_state(state);

    Router::new().nest("/api/v1", api)
}

async fn require_auth(headers: HeaderMap, request: Request, next: Next) -> Response {
    let authorized = headers
        .get("auth-token")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| serde_json::from_str::<Value>(value).ok())
        .is_some_and(|token| token == json!({ "id": ACCESS_ID, "token": SECRET_KEY }));
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "invalid credentials").into_response();
    }
    next.run(request).await
}

fn envelope(result: Value) -> Response {
    Json(json!({ "status_code": 200, "result": result })).into_response()
}

fn reject(status: StatusCode, message: &str) -> Response {
    (status, message.to_string()).into_response()
}

#[derive(Deserialize)]
struct CreateBucketBody {
    acl: String,
    locked: bool,
}

async fn create_bucket(
    State(state): State<SharedState>,
    Path(bucket): Path<String>,
    Json(body): Json<CreateBucketBody>,
) -> Response {
    let mut state = state.lock();
    if state.buckets.contains_key(&bucket) {
        return reject(StatusCode::CONFLICT, "bucket already exists");
    }
    state.buckets.insert(
        bucket,
        MockBucket {
            acl: body.acl,
            locked: body.locked,
            objects: BTreeMap::new(),
        },
    );
    envelope(Value::Null)
}

async fn list_buckets(State(state): State<SharedState>) -> Response {
    let state = state.lock();
    let buckets: Vec<Value> = state
        .buckets
        .iter()
        .map(|(name, bucket)| {
            json!({
                "name": name,
                "creation_date": CREATION_DATE,
                "locked": bucket.locked,
                "acl": bucket.acl,
            })
        })
        .collect();
    envelope(Value::Array(buckets))
}

async fn delete_bucket(State(state): State<SharedState>, Path(bucket): Path<String>) -> Response {
    let mut state = state.lock();
    match state.buckets.get(&bucket) {
        None => reject(StatusCode::NOT_FOUND, "no such bucket"),
        Some(b) if b.locked => reject(StatusCode::FORBIDDEN, "bucket is locked"),
        Some(_) => {
            state.buckets.remove(&bucket);
            envelope(Value::Null)
        }
    }
}

#[derive(Deserialize)]
struct CreateObjectBody {
    parts: u64,
    size: u64,
    content_type: String,
}

async fn create_multipart_object(
    State(state): State<SharedState>,
    Path((bucket, key)): Path<(String, String)>,
    Json(body): Json<CreateObjectBody>,
) -> Response {
    let mut state = state.lock();
    state.initiations += 1;
    let Some(target) = state.buckets.get_mut(&bucket) else {
        return reject(StatusCode::NOT_FOUND, "no such bucket");
    };
    if target.objects.contains_key(&key) {
        return reject(StatusCode::CONFLICT, "object already exists");
    }
    if body.parts == 0 {
        target.objects.insert(
            key,
            StoredObject {
                data: Vec::new(),
                content_type: body.content_type,
            },
        );
        return envelope(json!({ "upload_id": "empty" }));
    }

    state.next_upload += 1;
    let upload_id = format!("upload-{}", state.next_upload);
    state.uploads.insert(
        upload_id.clone(),
        PendingUpload {
            bucket,
            key,
            parts: body.parts,
            size: body.size,
            content_type: body.content_type,
            received: BTreeMap::new(),
        },
    );
    envelope(json!({ "upload_id": upload_id }))
}

async fn upload_object_part(
    State(state): State<SharedState>,
    Path((upload_id, index, len)): Path<(String, u64, u64)>,
    body: Bytes,
) -> Response {
    if body.len() as u64 != len {
        return reject(StatusCode::BAD_REQUEST, "part length does not match body");
    }

    let mut state = state.lock();
    let Some(upload) = state.uploads.get_mut(&upload_id) else {
        return reject(StatusCode::NOT_FOUND, "no such upload");
    };
    if index >= upload.parts {
        return reject(StatusCode::BAD_REQUEST, "part index out of range");
    }
    upload.received.insert(index, body);
    let complete = upload.received.len() as u64 == upload.parts;
    state.part_sizes.push(len);

    if complete {
        let Some(upload) = state.uploads.remove(&upload_id) else {
            return reject(StatusCode::NOT_FOUND, "no such upload");
        };
        let data: Vec<u8> = upload.received.values().flat_map(|p| p.iter().copied()).collect();
        if data.len() as u64 != upload.size {
            return reject(StatusCode::BAD_REQUEST, "object size mismatch");
        }
        if let Some(bucket) = state.buckets.get_mut(&upload.bucket) {
            bucket.objects.insert(
                upload.key,
                StoredObject {
                    data,
                    content_type: upload.content_type,
                },
            );
        }
    }
    envelope(Value::Null)
}

async fn list_objects(State(state): State<SharedState>, Path(bucket): Path<String>) -> Response {
    let state = state.lock();
    let Some(bucket) = state.buckets.get(&bucket) else {
        return reject(StatusCode::NOT_FOUND, "no such bucket");
    };
    let objects: Vec<Value> = bucket
        .objects
        .iter()
        .map(|(key, object)| {
            json!({
                "name": key,
                "creation_date": CREATION_DATE,
                "size": object.data.len(),
                "content_type": object.content_type,
            })
        })
        .collect();
    envelope(Value::Array(objects))
}

async fn get_object_checksum(
    State(state): State<SharedState>,
    Path((algorithm, bucket, key)): Path<(String, String, String)>,
) -> Response {
    let Ok(algorithm) = algorithm.parse::<ChecksumAlgorithm>() else {
        return reject(StatusCode::BAD_REQUEST, "unknown algorithm");
    };
    let state = state.lock();
    match state.buckets.get(&bucket).and_then(|b| b.objects.get(&key)) {
        Some(object) => envelope(json!(digest_hex(algorithm, &object.data))),
        None => reject(StatusCode::NOT_FOUND, "no such object"),
    }
}

async fn get_object_data(
    State(state): State<SharedState>,
    Path((bucket, key)): Path<(String, String)>,
) -> Response {
    let state = state.lock();
    let Some(object) = state.buckets.get(&bucket).and_then(|b| b.objects.get(&key)) else {
        return reject(StatusCode::NOT_FOUND, "no such object");
    };
    let content_type = [(header::CONTENT_TYPE, object.content_type.clone())];
    match state.trickle {
        None => (content_type, object.data.clone()).into_response(),
        Some((chunk_size, pause)) => {
            let chunks: Vec<Bytes> = object
                .data
                .chunks(chunk_size)
                .map(Bytes::copy_from_slice)
                .collect();
            let body = futures::stream::iter(chunks).then(move |chunk| async move {
                tokio::time::sleep(pause).await;
                Ok::<_, std::io::Error>(chunk)
            });
            (content_type, Body::from_stream(body)).into_response()
        }
    }
}

#[derive(Deserialize)]
struct StatusQuery {
    #[serde(default)]
    node_only: bool,
}

async fn status(Query(query): Query<StatusQuery>) -> Response {
    envelope(json!({ "healthy": true, "node_only": query.node_only }))
}

/// What a [`ScriptedServer`] does with one accepted connection
#[derive(Clone, Debug)]
pub enum Reply {
    /// Read the request, then close without answering
    Drop,
    /// Read the request, then hold the connection open without answering
    Stall,
    /// Answer with a status and body, then close
    Respond(u16, String),
}

/// Bare TCP server replying from a script, one entry per connection.
///
/// Once the script runs out the last entry repeats. Every response closes
/// its connection, so the connection count equals the request count.
pub struct ScriptedServer {
    pub endpoint: String,
    hits: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl ScriptedServer {
    pub async fn spawn(script: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let reply = script.get(n).or_else(|| script.last()).cloned();
                tokio::spawn(async move {
                    read_request(&mut socket).await;
                    match reply {
                        Some(Reply::Drop) | None => {}
                        Some(Reply::Stall) => tokio::time::sleep(Duration::from_secs(30)).await,
                        Some(Reply::Respond(status, body)) => {
                            let response = format!(
                                "HTTP/1.1 {status} Scripted\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                                body.len()
                            );
                            let _ = socket.write_all(response.as_bytes()).await;
                            let _ = socket.shutdown().await;
                        }
                    }
                });
            }
        });
        Self {
            endpoint: format!("http://{addr}"),
            hits,
            handle,
        }
    }

    /// Connections accepted so far
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for ScriptedServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Consume one HTTP/1.1 request: headers plus a `content-length` body
async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let body_len = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + body_len {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}
