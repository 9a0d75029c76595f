//! Multipart upload orchestrator
//!
//! Uploads one object as a sequence of dependent calls:
//!
//! 1. plan the parts from the declared length,
//! 2. initiate the multipart object and obtain an upload identifier,
//! 3. send every part in increasing index order,
//! 4. optionally fetch the remote SHA-256 and compare it with the digest
//!    computed locally while reading.
//!
//! The initiate call always completes before the first part is sent and
//! verification only starts once every part has succeeded. With a part
//! concurrency above one, up to that many part calls are in flight while
//! chunks are still read from the source in order. Any failure is
//! terminal: no further parts are attempted and no abort call is issued.

use crate::routes;
use crate::source::ByteSource;
use crate::transport::{ApiRequest, Transport};
use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use popstore_common::plan::{MAX_MULTIPART_COUNT, PartPlan};
use popstore_common::{
    ChecksumAlgorithm, DEFAULT_CONTENT_TYPE, DigestCalculator, Error, Result, UploadResult,
    plan_parts,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

/// Destination and options of one upload
#[derive(Clone, Debug)]
pub struct UploadTarget {
    pub bucket: String,
    pub key: String,
    pub content_type: String,
    /// Fetch and check the remote SHA-256 after the last part
    pub verify_sha256: bool,
}

impl UploadTarget {
    /// Target with the default content type and no verification
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            verify_sha256: false,
        }
    }

    /// Set the content type
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Enable or disable SHA-256 verification
    #[must_use]
    pub const fn with_verify_sha256(mut self, verify: bool) -> Self {
        self.verify_sha256 = verify;
        self
    }
}

#[derive(Deserialize)]
struct InitiateResult {
    upload_id: String,
}

/// State of one upload, owned by a single `upload` call
#[derive(Debug)]
struct UploadSession {
    upload_id: String,
    total_len: u64,
    plan: PartPlan,
    next_part: u64,
    bytes_sent: u64,
    last_status: u16,
}

struct PartOutcome {
    index: u64,
    len: u64,
    status: u16,
}

/// Drives the initiate / upload-parts / verify protocol
pub struct MultipartUploader<'a> {
    transport: &'a dyn Transport,
    part_concurrency: usize,
}

impl<'a> MultipartUploader<'a> {
    /// Create an uploader; a concurrency of 0 is treated as 1
    #[must_use]
    pub fn new(transport: &'a dyn Transport, part_concurrency: usize) -> Self {
        Self {
            transport,
            part_concurrency: part_concurrency.max(1),
        }
    }

    /// Upload everything `source` yields as `target`
    pub async fn upload(
        &self,
        target: &UploadTarget,
        source: &mut ByteSource,
    ) -> Result<UploadResult> {
        let total_len = source.len();
        let plan = plan_parts(total_len);
        if plan.part_count > MAX_MULTIPART_COUNT {
            return Err(Error::invalid_argument(format!(
                "object of {total_len} bytes needs {} parts, limit is {MAX_MULTIPART_COUNT}",
                plan.part_count
            )));
        }
        if plan.is_empty() && source.has_more().await? {
            warn!(
                bucket = %target.bucket,
                key = %target.key,
                "byte source declared empty but yields data"
            );
            return Err(Error::SourceUnreadable {
                declared: total_len,
                actual: source.consumed(),
            });
        }

        let mut session = self.initiate(target, total_len, plan).await?;
        info!(
            bucket = %target.bucket,
            key = %target.key,
            upload_id = %session.upload_id,
            size = total_len,
            parts = plan.part_count,
            "multipart upload initiated"
        );

        let mut digest = target
            .verify_sha256
            .then(|| DigestCalculator::new(ChecksumAlgorithm::Sha256));
        self.upload_parts(&mut session, source, digest.as_mut())
            .await?;

        let sha256 = match digest {
            Some(local) => Some(self.verify(target, local).await?),
            None => None,
        };

        info!(
            bucket = %target.bucket,
            key = %target.key,
            parts = session.next_part,
            bytes = session.bytes_sent,
            verified = sha256.is_some(),
            "multipart upload complete"
        );

        Ok(UploadResult {
            bucket: target.bucket.clone(),
            key: target.key.clone(),
            upload_id: session.upload_id,
            part_count: session.next_part,
            bytes_uploaded: session.bytes_sent,
            status_code: session.last_status,
            sha256,
        })
    }

    async fn initiate(
        &self,
        target: &UploadTarget,
        total_len: u64,
        plan: PartPlan,
    ) -> Result<UploadSession> {
        let request = ApiRequest::post_json(
            routes::create_multipart_object(&target.bucket, &target.key),
            json!({
                "object_name": target.key,
                "parts": plan.part_count,
                "size": total_len,
                "content_type": target.content_type,
            }),
        );

        let initiated = async {
            let response = self.transport.send(request).await?;
            let result: InitiateResult = response.result()?;
            Ok::<_, Error>((result.upload_id, response.envelope_status()))
        };
        let (upload_id, status) = initiated
            .await
            .map_err(|e| Error::InitiateFailed(Box::new(e)))?;

        Ok(UploadSession {
            upload_id,
            total_len,
            plan,
            next_part: 0,
            bytes_sent: 0,
            last_status: status,
        })
    }

    async fn upload_parts(
        &self,
        session: &mut UploadSession,
        source: &mut ByteSource,
        mut digest: Option<&mut DigestCalculator>,
    ) -> Result<()> {
        let upload_id = session.upload_id.clone();
        let mut in_flight = FuturesUnordered::new();

        while session.next_part < session.plan.part_count {
            let index = session.next_part;
            let expected = session.plan.part_len(index, session.total_len);
            let max = usize::try_from(expected)
                .map_err(|_| Error::invalid_argument("part size exceeds addressable memory"))?;

            let chunk = source.read_chunk(max).await?;
            if (chunk.len() as u64) < expected {
                return Err(Self::source_unreadable(session, source));
            }
            if index + 1 == session.plan.part_count && source.has_more().await? {
                return Err(Self::source_unreadable(session, source));
            }
            if let Some(calc) = digest.as_deref_mut() {
                calc.update(&chunk);
            }

            session.next_part += 1;
            in_flight.push(self.upload_part(&upload_id, index, chunk));

            if in_flight.len() >= self.part_concurrency {
                if let Some(outcome) = in_flight.next().await {
                    Self::record(session, outcome?);
                }
            }
        }

        while let Some(outcome) = in_flight.next().await {
            Self::record(session, outcome?);
        }
        Ok(())
    }

    async fn upload_part(&self, upload_id: &str, index: u64, chunk: Bytes) -> Result<PartOutcome> {
        let len = chunk.len() as u64;
        debug!(upload_id, part = index, len, "uploading part");
        let request = ApiRequest::put_raw(routes::upload_object_part(upload_id, index, len), chunk);
        match self.transport.send(request).await {
            Ok(response) => Ok(PartOutcome {
                index,
                len,
                status: response.envelope_status(),
            }),
            Err(e) => {
                warn!(upload_id, part = index, "part upload failed: {}", e);
                Err(Error::PartUploadFailed {
                    part_index: index,
                    source: Box::new(e),
                })
            }
        }
    }

    fn record(session: &mut UploadSession, outcome: PartOutcome) {
        debug!(
            upload_id = %session.upload_id,
            part = outcome.index,
            "part uploaded"
        );
        session.bytes_sent += outcome.len;
        session.last_status = outcome.status;
    }

    fn source_unreadable(session: &UploadSession, source: &ByteSource) -> Error {
        warn!(
            upload_id = %session.upload_id,
            declared = session.total_len,
            read = source.consumed(),
            "byte source does not match declared length"
        );
        Error::SourceUnreadable {
            declared: session.total_len,
            actual: source.consumed(),
        }
    }

    async fn verify(&self, target: &UploadTarget, local: DigestCalculator) -> Result<String> {
        let request = ApiRequest::get(routes::object_checksum(
            ChecksumAlgorithm::Sha256,
            &target.bucket,
            &target.key,
        ));
        let remote: String = async {
            let response = self.transport.send(request).await?;
            response.result::<String>()
        }
        .await
        .map_err(|e| Error::VerificationFailed(Box::new(e)))?;

        let remote = remote.trim().to_ascii_lowercase();
        let expected = local.finalize_hex();
        if remote != expected {
            warn!(
                bucket = %target.bucket,
                key = %target.key,
                "sha256 mismatch: local {}, remote {}",
                expected,
                remote
            );
            return Err(Error::VerificationMismatch {
                expected,
                actual: remote,
            });
        }
        Ok(remote)
    }
}
