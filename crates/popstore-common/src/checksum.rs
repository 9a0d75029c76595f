//! Local digest computation
//!
//! Computes the same digests the service offers so uploads and downloads
//! can be checked against the remote values. Every digest is rendered as
//! lowercase hex; CRC values are eight hex digits, big-endian.

use crate::types::ChecksumAlgorithm;
use sha1::Sha1;
use sha2::{Digest, Sha256};

enum State {
    Crc32(crc32fast::Hasher),
    Crc32c(u32),
    Sha1(Sha1),
    Sha256(Sha256),
}

/// Streaming digest calculator for one [`ChecksumAlgorithm`]
pub struct DigestCalculator {
    state: State,
    bytes: u64,
}

impl DigestCalculator {
    /// Create a new calculator for `algorithm`
    #[must_use]
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        let state = match algorithm {
            ChecksumAlgorithm::Crc32 => State::Crc32(crc32fast::Hasher::new()),
            ChecksumAlgorithm::Crc32c => State::Crc32c(0),
            ChecksumAlgorithm::Sha1 => State::Sha1(Sha1::new()),
            ChecksumAlgorithm::Sha256 => State::Sha256(Sha256::new()),
        };
        Self { state, bytes: 0 }
    }

    /// Algorithm this calculator computes
    #[must_use]
    pub const fn algorithm(&self) -> ChecksumAlgorithm {
        match self.state {
            State::Crc32(_) => ChecksumAlgorithm::Crc32,
            State::Crc32c(_) => ChecksumAlgorithm::Crc32c,
            State::Sha1(_) => ChecksumAlgorithm::Sha1,
            State::Sha256(_) => ChecksumAlgorithm::Sha256,
        }
    }

    /// Number of bytes fed so far
    #[must_use]
    pub const fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Update the calculator with more data
    pub fn update(&mut self, data: &[u8]) {
        self.bytes += data.len() as u64;
        match &mut self.state {
            State::Crc32(hasher) => hasher.update(data),
            State::Crc32c(crc) => *crc = crc32c::crc32c_append(*crc, data),
            State::Sha1(hasher) => hasher.update(data),
            State::Sha256(hasher) => hasher.update(data),
        }
    }

    /// Finalize and return the hex digest
    #[must_use]
    pub fn finalize_hex(self) -> String {
        match self.state {
            State::Crc32(hasher) => format!("{:08x}", hasher.finalize()),
            State::Crc32c(crc) => format!("{crc:08x}"),
            State::Sha1(hasher) => hex::encode(hasher.finalize()),
            State::Sha256(hasher) => hex::encode(hasher.finalize()),
        }
    }
}

/// One-shot hex digest of `data`
#[must_use]
pub fn digest_hex(algorithm: ChecksumAlgorithm, data: &[u8]) -> String {
    let mut calc = DigestCalculator::new(algorithm);
    calc.update(data);
    calc.finalize_hex()
}
