//! Replica state summary of a bucket.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
    /// Replica state flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct BucketInfoFlags: u8 {
        /// Replica is ready to serve reads
        const READY = 1 << 0;
        /// Replica is the active copy
        const ACTIVE = 1 << 1;
    }
}

/// Checksum, counts and flags describing one bucket replica.
///
/// `PartialEq` compares every field including `last_modified`. Protocol level
/// comparisons that should not care about the modification time use
/// [`BucketInfo::same_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BucketInfo {
    last_modified: u64,
    checksum: u32,
    doc_count: u32,
    total_doc_size: u32,
    meta_count: u32,
    used_file_size: u32,
    flags: BucketInfoFlags,
}

impl BucketInfo {
    /// Short form: meta count and used file size mirror docs and size
    pub fn new(checksum: u32, doc_count: u32, total_doc_size: u32) -> Self {
        Self::with_flags(checksum, doc_count, total_doc_size, false, false)
    }

    /// Short form with ready/active flags
    pub fn with_flags(
        checksum: u32,
        doc_count: u32,
        total_doc_size: u32,
        ready: bool,
        active: bool,
    ) -> Self {
        Self::full(
            checksum,
            doc_count,
            total_doc_size,
            doc_count,
            total_doc_size,
            ready,
            active,
            0,
        )
    }

    /// Every field spelled out
    #[allow(clippy::too_many_arguments)]
    pub fn full(
        checksum: u32,
        doc_count: u32,
        total_doc_size: u32,
        meta_count: u32,
        used_file_size: u32,
        ready: bool,
        active: bool,
        last_modified: u64,
    ) -> Self {
        let mut flags = BucketInfoFlags::empty();
        flags.set(BucketInfoFlags::READY, ready);
        flags.set(BucketInfoFlags::ACTIVE, active);
        Self {
            last_modified,
            checksum,
            doc_count,
            total_doc_size,
            meta_count,
            used_file_size,
            flags,
        }
    }

    /// Equality over everything except `last_modified`.
    // TODO: settle whether last_modified should take part in replica
    // comparisons; existing callers depend on it being ignored.
    pub fn same_state(&self, other: &BucketInfo) -> bool {
        self.checksum == other.checksum
            && self.doc_count == other.doc_count
            && self.total_doc_size == other.total_doc_size
            && self.meta_count == other.meta_count
            && self.used_file_size == other.used_file_size
            && self.flags == other.flags
    }

    /// Last modification time
    pub fn last_modified(&self) -> u64 {
        self.last_modified
    }

    /// Set the last modification time
    pub fn set_last_modified(&mut self, last_modified: u64) {
        self.last_modified = last_modified;
    }

    /// Content checksum
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    /// Number of documents
    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    /// Total size of the documents
    pub fn total_doc_size(&self) -> u32 {
        self.total_doc_size
    }

    /// Number of entries including removes
    pub fn meta_count(&self) -> u32 {
        self.meta_count
    }

    /// Bytes used on disk
    pub fn used_file_size(&self) -> u32 {
        self.used_file_size
    }

    /// Replica state flags
    pub fn flags(&self) -> BucketInfoFlags {
        self.flags
    }

    /// Replace the replica state flags
    pub fn set_flags(&mut self, flags: BucketInfoFlags) {
        self.flags = flags;
    }

    /// Whether the replica is ready
    pub fn is_ready(&self) -> bool {
        self.flags.contains(BucketInfoFlags::READY)
    }

    /// Whether the replica is active
    pub fn is_active(&self) -> bool {
        self.flags.contains(BucketInfoFlags::ACTIVE)
    }

    /// A zero checksum is only valid for an empty bucket
    pub fn is_valid(&self) -> bool {
        self.checksum != 0 || self.doc_count == 0
    }
}

impl fmt::Display for BucketInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return f.write_str("invalid");
        }
        write!(
            f,
            "BucketInfo(crc {:#x}, docCount {}, totDocSize {}",
            self.checksum, self.doc_count, self.total_doc_size
        )?;
        if self.meta_count != self.doc_count || self.used_file_size != self.total_doc_size {
            write!(
                f,
                ", metaCount {}, usedFileSize {}",
                self.meta_count, self.used_file_size
            )?;
        }
        write!(
            f,
            ", ready {}, active {}",
            self.is_ready(),
            self.is_active()
        )?;
        if self.last_modified != 0 {
            write!(f, ", last modified {}", self.last_modified)?;
        }
        f.write_str(")")
    }
}
