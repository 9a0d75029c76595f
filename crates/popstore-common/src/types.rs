//! Core type definitions for popstore
//!
//! Buckets and objects are immutable values as returned by the service;
//! changing either requires a new remote call. Identity is the bucket
//! name, or the object name within its bucket.

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::str::FromStr;

/// Content type used when the caller does not supply one
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Access-control setting applied to a bucket at creation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BucketAcl {
    #[default]
    Private,
    PublicRead,
    PublicReadWrite,
    AuthenticatedRead,
}

impl BucketAcl {
    /// Wire representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::PublicRead => "public-read",
            Self::PublicReadWrite => "public-read-write",
            Self::AuthenticatedRead => "authenticated-read",
        }
    }
}

impl fmt::Display for BucketAcl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BucketAcl {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "private" => Ok(Self::Private),
            "public-read" => Ok(Self::PublicRead),
            "public-read-write" => Ok(Self::PublicReadWrite),
            "authenticated-read" => Ok(Self::AuthenticatedRead),
            _ => Err(ParseEnumError::new("bucket ACL", s)),
        }
    }
}

/// Digest algorithms the service can compute over a stored object
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    Crc32,
    Crc32c,
    Sha1,
    Sha256,
}

impl ChecksumAlgorithm {
    /// All supported algorithms
    pub const ALL: [Self; 4] = [Self::Crc32, Self::Crc32c, Self::Sha1, Self::Sha256];

    /// Wire representation, also used as the path segment
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Crc32 => "crc32",
            Self::Crc32c => "crc32c",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|algo| algo.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseEnumError::new("checksum algorithm", s))
    }
}

/// Error returned when parsing an ACL or checksum algorithm name
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// A bucket as listed by the service
#[derive(Clone, Debug, Display, Serialize, Deserialize)]
#[display("{name}")]
pub struct Bucket {
    /// Bucket name, unique within the service
    pub name: String,
    /// Creation timestamp
    #[serde(default, alias = "created_at", skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<DateTime<Utc>>,
    /// Whether the bucket rejects deletion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    /// Access-control setting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acl: Option<BucketAcl>,
}

impl Bucket {
    /// Create a bucket value carrying only a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            creation_date: None,
            locked: None,
            acl: None,
        }
    }
}

impl PartialEq for Bucket {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Bucket {}

impl PartialEq<str> for Bucket {
    fn eq(&self, other: &str) -> bool {
        self.name == other
    }
}

impl PartialEq<&str> for Bucket {
    fn eq(&self, other: &&str) -> bool {
        self.name == *other
    }
}

impl Hash for Bucket {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// An object as listed by the service
///
/// Identity is the `(bucket, name)` pair. Comparing against a plain string
/// only looks at the key.
#[derive(Clone, Debug, Display, Serialize, Deserialize)]
#[display("{bucket}/{name}")]
pub struct ObjectInfo {
    /// Bucket holding the object; listings fill it in from the request
    #[serde(default)]
    pub bucket: String,
    /// Object key within its bucket
    #[serde(alias = "key")]
    pub name: String,
    /// Creation timestamp
    #[serde(default, alias = "created_at", skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<DateTime<Utc>>,
    /// Object length in bytes
    #[serde(default)]
    pub size: u64,
    /// Declared content type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl ObjectInfo {
    /// Create an object value carrying only its identity
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
            creation_date: None,
            size: 0,
            content_type: None,
        }
    }
}

impl PartialEq for ObjectInfo {
    fn eq(&self, other: &Self) -> bool {
        self.bucket == other.bucket && self.name == other.name
    }
}

impl Eq for ObjectInfo {}

impl PartialEq<str> for ObjectInfo {
    fn eq(&self, other: &str) -> bool {
        self.name == other
    }
}

impl PartialEq<&str> for ObjectInfo {
    fn eq(&self, other: &&str) -> bool {
        self.name == *other
    }
}

impl Hash for ObjectInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bucket.hash(state);
        self.name.hash(state);
    }
}

/// Digest of a stored object, computed on demand by the service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumResult {
    pub algorithm: ChecksumAlgorithm,
    /// Lowercase hex digest
    pub digest: String,
}

/// Outcome of a bucket creation
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BucketCreation {
    pub bucket: String,
    pub acl: BucketAcl,
    pub locked: bool,
    pub status_code: u16,
}

/// Outcome of a bucket deletion
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BucketDeletion {
    pub bucket: String,
    pub status_code: u16,
}

/// Outcome of a put-object call
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub bucket: String,
    pub key: String,
    /// Identifier issued by the service when the upload was initiated
    pub upload_id: String,
    /// Number of parts sent
    pub part_count: u64,
    /// Bytes sent across all parts
    pub bytes_uploaded: u64,
    /// Status reported by the last call of the upload
    pub status_code: u16,
    /// Remote SHA-256 digest, present only when verification was requested
    pub sha256: Option<String>,
}

/// Outcome of a get-object call
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DownloadResult {
    pub path: PathBuf,
    pub bytes_written: u64,
    pub status_code: u16,
}
