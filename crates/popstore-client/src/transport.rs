//! Transport adapter contract
//!
//! A [`Transport`] performs one request against the service and applies
//! the status policy: only 2xx responses come back as `Ok`, every other
//! status is translated through [`Error::from_status`]. Success payloads
//! use the `{"status_code": ..., "result": ...}` envelope.

use async_trait::async_trait;
use bytes::Bytes;
use popstore_common::{Error, Result};
use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWrite;

/// Fixed prefix between the endpoint and every request path
pub const API_ROOT: &str = "/api/v1";

/// Request body; a request carries at most one kind of body
#[derive(Clone, Debug, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    /// Structured body, sent as `application/json`
    Json(serde_json::Value),
    /// Raw body, sent as `application/octet-stream`
    Raw(Bytes),
}

/// A single request against the service API
#[derive(Clone, Debug)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API root
    pub path: String,
    pub body: RequestBody,
}

impl ApiRequest {
    /// Create a request without a body
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
        }
    }

    /// `GET` request
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// `DELETE` request
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// `POST` request with a JSON body
    pub fn post_json(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            body: RequestBody::Json(body),
            ..Self::new(Method::POST, path)
        }
    }

    /// `PUT` request with a raw body
    pub fn put_raw(path: impl Into<String>, body: Bytes) -> Self {
        Self {
            body: RequestBody::Raw(body),
            ..Self::new(Method::PUT, path)
        }
    }

    /// Whether repeating the request cannot change its outcome.
    ///
    /// Part uploads are `PUT`s keyed by part index and therefore
    /// idempotent; `POST` creates remote state and is not.
    #[must_use]
    pub fn is_idempotent(&self) -> bool {
        self.method != Method::POST
    }
}

/// A successful (2xx) response
#[derive(Clone, Debug)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Bytes,
}

#[derive(Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Deserialize)]
struct EnvelopeStatus {
    #[serde(default)]
    status_code: Option<u16>,
}

impl ApiResponse {
    /// Decode the whole body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| Error::decode(e.to_string()))
    }

    /// Decode the `result` member of the response envelope
    pub fn result<T: DeserializeOwned>(&self) -> Result<T> {
        self.json::<Envelope<T>>().map(|envelope| envelope.result)
    }

    /// Status echoed in the envelope, falling back to the HTTP status
    #[must_use]
    pub fn envelope_status(&self) -> u16 {
        serde_json::from_slice::<EnvelopeStatus>(&self.body)
            .ok()
            .and_then(|envelope| envelope.status_code)
            .unwrap_or(self.status)
    }
}

/// Outcome of a streamed download
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Downloaded {
    pub status: u16,
    pub bytes: u64,
}

/// One-request-at-a-time access to the service
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform `request` and buffer the response body
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;

    /// Perform `request` and stream a successful response body into `sink`
    async fn download(
        &self,
        request: ApiRequest,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<Downloaded>;
}

/// Apply the status policy to a buffered response
pub fn ensure_success(status: u16, body: Bytes) -> Result<ApiResponse> {
    if (200..300).contains(&status) {
        Ok(ApiResponse { status, body })
    } else {
        Err(status_error(status, &body))
    }
}

/// Error for a non-success status and its raw body
#[must_use]
pub fn status_error(status: u16, body: &[u8]) -> Error {
    Error::from_status(status, String::from_utf8_lossy(body).into_owned())
}

/// Join path segments, percent-encoding each one
#[must_use]
pub fn api_path(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|segment| urlencoding::encode(segment))
        .collect::<Vec<_>>()
        .join("/")
}

/// Build the absolute URL for a request path
#[must_use]
pub fn compose_url(endpoint: &str, path: &str) -> String {
    normalize_url(&format!("{endpoint}/{API_ROOT}/{path}"))
}

/// Collapse runs of `/` into one, leaving the scheme separator intact
#[must_use]
pub fn normalize_url(url: &str) -> String {
    let (scheme, rest) = url
        .find("://")
        .map_or(("", url), |idx| url.split_at(idx + 3));

    let mut normalized = String::with_capacity(url.len());
    normalized.push_str(scheme);
    let mut previous_slash = false;
    for ch in rest.chars() {
        if ch == '/' && previous_slash {
            continue;
        }
        previous_slash = ch == '/';
        normalized.push(ch);
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compose_url() {
        assert_eq!(
            compose_url("https://store.example.com", "buckets/list-buckets"),
            "https://store.example.com/api/v1/buckets/list-buckets"
        );
        assert_eq!(
            compose_url("http://localhost:8080/", "/buckets//delete-bucket/b1"),
            "http://localhost:8080/api/v1/buckets/delete-bucket/b1"
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = compose_url("https://host:9000//", "//objects///list-objects/b");
        assert_eq!(once, "https://host:9000/api/v1/objects/list-objects/b");
        assert_eq!(normalize_url(&once), once);
        assert_eq!(
            compose_url("https://host:9000//", "//objects///list-objects/b"),
            once
        );
    }

    #[test]
    fn test_api_path_encodes_segments() {
        assert_eq!(
            api_path(&["objects", "get-object-data", "bucket", "dir/file name.txt"]),
            "objects/get-object-data/bucket/dir%2Ffile%20name.txt"
        );
    }

    #[test]
    fn test_request_idempotency() {
        assert!(ApiRequest::get("a").is_idempotent());
        assert!(ApiRequest::delete("a").is_idempotent());
        assert!(ApiRequest::put_raw("a", Bytes::from_static(b"x")).is_idempotent());
        assert!(!ApiRequest::post_json("a", json!({})).is_idempotent());
    }

    #[test]
    fn test_status_policy() {
        let ok = ensure_success(200, Bytes::from_static(br#"{"status_code": 200, "result": "abc"}"#))
            .unwrap();
        assert_eq!(ok.result::<String>().unwrap(), "abc");
        assert_eq!(ok.envelope_status(), 200);

        let err = ensure_success(409, Bytes::from_static(b"bucket exists")).unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(err.response_body(), Some("bucket exists"));

        let err = ensure_success(502, Bytes::new()).unwrap_err();
        assert_eq!(err.status_code(), Some(502));
    }

    #[test]
    fn test_result_decode_error() {
        let response = ApiResponse {
            status: 200,
            body: Bytes::from_static(b"not json"),
        };
        assert!(matches!(response.result::<String>(), Err(Error::Decode(_))));
        assert_eq!(response.envelope_status(), 200);
    }
}
