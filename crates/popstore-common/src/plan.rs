//! Multipart part planning
//!
//! Maps an object length onto the part size and part count used by the
//! multipart upload protocol.

/// One kibibyte
pub const KB: u64 = 1024;
/// One mebibyte
pub const MB: u64 = 1024 * KB;
/// One gibibyte
pub const GB: u64 = 1024 * MB;
/// One tebibyte
pub const TB: u64 = 1024 * GB;

/// Largest part the service accepts (5 MiB)
pub const MAX_PART_SIZE: u64 = 5 * MB;

/// Highest number of parts a single multipart upload may declare
pub const MAX_MULTIPART_COUNT: u64 = 9999;

/// Part layout of a single object
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PartPlan {
    /// Size of every part except possibly the last
    pub part_size: u64,
    /// Number of parts
    pub part_count: u64,
}

impl PartPlan {
    /// `true` when there is nothing to upload
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.part_count == 0
    }

    /// Exact byte length of part `index` for an object of `total` bytes.
    ///
    /// Returns 0 for indexes past the end of the plan.
    #[must_use]
    pub const fn part_len(&self, index: u64, total: u64) -> u64 {
        if index >= self.part_count {
            return 0;
        }
        let offset = index * self.part_size;
        let remaining = total.saturating_sub(offset);
        if remaining < self.part_size {
            remaining
        } else {
            self.part_size
        }
    }
}

/// Plan the parts for an object of `object_size` bytes.
///
/// Objects up to [`MAX_PART_SIZE`] go up as a single part covering the
/// whole object; larger objects are split into `MAX_PART_SIZE` parts with
/// a shorter final part.
#[must_use]
pub const fn plan_parts(object_size: u64) -> PartPlan {
    if object_size == 0 {
        return PartPlan {
            part_size: 0,
            part_count: 0,
        };
    }
    if object_size <= MAX_PART_SIZE {
        return PartPlan {
            part_size: object_size,
            part_count: 1,
        };
    }
    PartPlan {
        part_size: MAX_PART_SIZE,
        part_count: object_size.div_ceil(MAX_PART_SIZE),
    }
}
