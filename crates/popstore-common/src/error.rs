//! Error types for popstore
//!
//! Every failure surfaced by the client falls into one of four groups:
//! transport failures (eligible for bounded retry), remote rejections
//! carrying the status code and body, local precondition failures, and
//! the multipart orchestrator's terminal errors which wrap the cause.

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for popstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for popstore
#[derive(Debug, Error)]
pub enum Error {
    // Transport errors
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timeout")]
    Timeout,

    // Remote rejections
    #[error("not found: {body}")]
    NotFound { body: String },

    #[error("forbidden: {body}")]
    Forbidden { body: String },

    #[error("conflict: {body}")]
    Conflict { body: String },

    #[error("remote error (status {status}): {body}")]
    Remote { status: u16, body: String },

    // Local precondition errors
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("local I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    // Multipart upload errors
    #[error("multipart initiate failed: {0}")]
    InitiateFailed(#[source] Box<Error>),

    #[error("upload of part {part_index} failed: {source}")]
    PartUploadFailed {
        part_index: u64,
        #[source]
        source: Box<Error>,
    },

    #[error("checksum verification failed: {0}")]
    VerificationFailed(#[source] Box<Error>),

    #[error("checksum mismatch: local {expected}, remote {actual}")]
    VerificationMismatch { expected: String, actual: String },

    #[error("byte source unreadable: declared {declared} bytes, read {actual}")]
    SourceUnreadable { declared: u64, actual: u64 },
}

impl Error {
    /// Translate a non-success HTTP status and its body into an error
    #[must_use]
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            403 => Self::Forbidden { body },
            404 => Self::NotFound { body },
            409 => Self::Conflict { body },
            _ => Self::Remote { status, body },
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// The error this one wraps, if it is an orchestrator error
    #[must_use]
    pub fn cause(&self) -> Option<&Self> {
        match self {
            Self::InitiateFailed(inner) | Self::VerificationFailed(inner) => Some(&**inner),
            Self::PartUploadFailed { source, .. } => Some(&**source),
            _ => None,
        }
    }

    /// Remote HTTP status code, looking through orchestrator wrappers
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } => Some(404),
            Self::Forbidden { .. } => Some(403),
            Self::Conflict { .. } => Some(409),
            Self::Remote { status, .. } => Some(*status),
            _ => self.cause().and_then(Self::status_code),
        }
    }

    /// Raw response body of a remote rejection
    #[must_use]
    pub fn response_body(&self) -> Option<&str> {
        match self {
            Self::NotFound { body }
            | Self::Forbidden { body }
            | Self::Conflict { body }
            | Self::Remote { body, .. } => Some(body),
            _ => self.cause().and_then(Self::response_body),
        }
    }

    /// Check if this is a retryable transport error
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Connection(_))
    }

    /// Check if this is a not found error (remote or local file)
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::FileNotFound(_)) || self.status_code() == Some(404)
    }

    /// Check if this is a conflict error
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.status_code() == Some(409)
    }

    /// Check if this is a forbidden error
    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        self.status_code() == Some(403)
    }
}
