//! Popstore Client - HTTP client for the object-storage service
//!
//! This crate provides the transport adapter, the multipart upload
//! orchestrator and the [`PopClient`] bucket/object API.

pub mod client;
pub mod http;
pub mod multipart;
pub mod routes;
pub mod source;
pub mod transport;

// Re-exports
pub use client::{PopClient, PutObjectOptions};
pub use http::HttpTransport;
pub use multipart::{MultipartUploader, UploadTarget};
pub use source::{ByteSource, ObjectSource};
pub use transport::{ApiRequest, ApiResponse, Downloaded, RequestBody, Transport};

pub use popstore_common::{
    Bucket, BucketAcl, ChecksumAlgorithm, ClientConfig, Error, ObjectInfo, Result,
};
