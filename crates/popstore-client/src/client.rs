//! Bucket and object operations
//!
//! [`PopClient`] maps each operation onto one transport call, except
//! `put_object`, which hands the resolved byte source to the
//! [`MultipartUploader`].

use crate::http::HttpTransport;
use crate::multipart::{MultipartUploader, UploadTarget};
use crate::routes;
use crate::source::ObjectSource;
use crate::transport::{ApiRequest, Transport};
use popstore_common::{
    Bucket, BucketAcl, BucketCreation, BucketDeletion, ChecksumAlgorithm, ChecksumResult,
    ClientConfig, DEFAULT_CONTENT_TYPE, DownloadResult, Error, ObjectInfo, Result, UploadResult,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Options of a put-object call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PutObjectOptions {
    pub content_type: String,
    pub verify_sha256: bool,
}

impl Default for PutObjectOptions {
    fn default() -> Self {
        Self {
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            verify_sha256: false,
        }
    }
}

impl PutObjectOptions {
    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    #[must_use]
    pub const fn verify_sha256(mut self, verify: bool) -> Self {
        self.verify_sha256 = verify;
        self
    }
}

/// Client for the object-storage service
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct PopClient {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
}

impl PopClient {
    /// Create a client talking HTTP(S) to the configured endpoint
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        info!(endpoint = %config.endpoint, "popstore client created");
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client over an arbitrary transport
    #[must_use]
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self { transport, config }
    }

    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Create a bucket; fails with a conflict if the name is taken
    pub async fn create_bucket(
        &self,
        name: &str,
        acl: BucketAcl,
        locked: bool,
    ) -> Result<BucketCreation> {
        require("bucket name", name)?;
        let response = self
            .transport
            .send(ApiRequest::post_json(
                routes::create_bucket(name),
                json!({ "acl": acl, "locked": locked }),
            ))
            .await?;
        info!(bucket = name, %acl, locked, "bucket created");
        Ok(BucketCreation {
            bucket: name.to_string(),
            acl,
            locked,
            status_code: response.envelope_status(),
        })
    }

    /// List all buckets visible to the credentials
    pub async fn list_buckets(&self) -> Result<Vec<Bucket>> {
        let response = self
            .transport
            .send(ApiRequest::get(routes::list_buckets()))
            .await?;
        let buckets: Option<Vec<Bucket>> = response.result()?;
        Ok(buckets.unwrap_or_default())
    }

    /// Delete a bucket; fails with not-found or forbidden (locked)
    pub async fn delete_bucket(&self, name: &str) -> Result<BucketDeletion> {
        require("bucket name", name)?;
        let response = self
            .transport
            .send(ApiRequest::delete(routes::delete_bucket(name)))
            .await?;
        info!(bucket = name, "bucket deleted");
        Ok(BucketDeletion {
            bucket: name.to_string(),
            status_code: response.envelope_status(),
        })
    }

    /// Upload `source` as `bucket/key` using the multipart protocol
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        source: ObjectSource,
        options: PutObjectOptions,
    ) -> Result<UploadResult> {
        require("bucket name", bucket)?;
        require("object key", key)?;

        let mut source = source.open().await?;
        let target = UploadTarget {
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_type: options.content_type,
            verify_sha256: options.verify_sha256,
        };
        MultipartUploader::new(self.transport.as_ref(), self.config.upload.part_concurrency)
            .upload(&target, &mut source)
            .await
    }

    /// List the objects of a bucket
    pub async fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectInfo>> {
        require("bucket name", bucket)?;
        let response = self
            .transport
            .send(ApiRequest::get(routes::list_objects(bucket)))
            .await?;
        let mut objects: Vec<ObjectInfo> = response
            .result::<Option<Vec<ObjectInfo>>>()?
            .unwrap_or_default();
        for object in &mut objects {
            object.bucket = bucket.to_string();
        }
        Ok(objects)
    }

    /// Ask the service for the digest of a stored object
    pub async fn get_object_checksum(
        &self,
        bucket: &str,
        key: &str,
        algorithm: ChecksumAlgorithm,
    ) -> Result<ChecksumResult> {
        require("bucket name", bucket)?;
        require("object key", key)?;
        let response = self
            .transport
            .send(ApiRequest::get(routes::object_checksum(
                algorithm, bucket, key,
            )))
            .await?;
        let digest: String = response.result()?;
        Ok(ChecksumResult {
            algorithm,
            digest: digest.trim().to_ascii_lowercase(),
        })
    }

    /// Download `bucket/key` into `destination`, replacing any existing
    /// file only once the whole body has been received.
    pub async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        destination: impl AsRef<Path>,
    ) -> Result<DownloadResult> {
        require("bucket name", bucket)?;
        require("object key", key)?;

        let destination = destination.as_ref();
        let staging = staging_path(destination)?;
        let mut file = tokio::fs::File::create(&staging).await?;

        let downloaded = self
            .transport
            .download(ApiRequest::get(routes::object_data(bucket, key)), &mut file)
            .await;
        drop(file);

        let downloaded = match downloaded {
            Ok(downloaded) => downloaded,
            Err(e) => {
                discard_staging(&staging).await;
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&staging, destination).await {
            discard_staging(&staging).await;
            return Err(e.into());
        }

        debug!(bucket, key, bytes = downloaded.bytes, "object downloaded");
        Ok(DownloadResult {
            path: destination.to_path_buf(),
            bytes_written: downloaded.bytes,
            status_code: downloaded.status,
        })
    }

    /// Service health probe
    pub async fn status(&self, node_only: bool) -> Result<serde_json::Value> {
        let response = self
            .transport
            .send(ApiRequest::get(routes::status(node_only)))
            .await?;
        response.json()
    }

    /// Send an arbitrary request and decode the JSON response
    pub async fn request(&self, request: ApiRequest) -> Result<serde_json::Value> {
        let response = self.transport.send(request).await?;
        if response.body.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        response.json()
    }
}

impl std::fmt::Debug for PopClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PopClient")
            .field("endpoint", &self.config.endpoint)
            .finish_non_exhaustive()
    }
}

fn require(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::invalid_argument(format!("{what} must not be empty")));
    }
    Ok(())
}

async fn discard_staging(staging: &Path) {
    if let Err(e) = tokio::fs::remove_file(staging).await {
        warn!(path = %staging.display(), "failed to remove partial download: {}", e);
    }
}

/// Hidden sibling of `destination` used while a download is in progress
fn staging_path(destination: &Path) -> Result<PathBuf> {
    let name = destination.file_name().ok_or_else(|| {
        Error::invalid_argument(format!(
            "download destination {} has no file name",
            destination.display()
        ))
    })?;
    let mut staged = std::ffi::OsString::from(".");
    staged.push(name);
    staged.push(".download");
    Ok(destination.with_file_name(staged))
}
