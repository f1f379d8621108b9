//! Bucket split and join.

use super::render::{render_entries, Render};
use super::{BucketInfoEntry, CommandHeader, ReplyHeader};
use crate::bucket::{Bucket, BucketId};
use crate::bucketinfo::BucketInfo;
use std::fmt;

/// Split a bucket into finer buckets until the size limits hold
#[derive(Debug, Clone, PartialEq)]
pub struct SplitBucketCommand {
    /// Shared command fields
    pub header: CommandHeader,
    /// Bucket to split
    pub bucket: Bucket,
    /// Split to at least this many used bits
    pub min_split_bits: u8,
    /// Never split beyond this many used bits
    pub max_split_bits: u8,
    /// Keep splitting while a bucket is at least this large
    pub min_byte_size: u32,
    /// Keep splitting while a bucket holds at least this many documents
    pub min_doc_count: u32,
}

impl SplitBucketCommand {
    /// Split `bucket` with no size limits
    pub fn new(bucket: Bucket) -> Self {
        Self {
            header: CommandHeader::new(),
            bucket,
            min_split_bits: 0,
            max_split_bits: BucketId::MAX_USED_BITS as u8,
            min_byte_size: u32::MAX,
            min_doc_count: u32::MAX,
        }
    }
}

impl Render for SplitBucketCommand {
    fn render(&self, out: &mut dyn fmt::Write, _verbose: bool, _indent: &str) -> fmt::Result {
        write!(out, "SplitBucketCommand({}", self.bucket)?;
        if self.min_doc_count != u32::MAX || self.min_byte_size != u32::MAX {
            write!(
                out,
                ", max doc count {}, max total doc size {}",
                self.min_doc_count, self.min_byte_size
            )?;
        } else if self.max_split_bits != BucketId::MAX_USED_BITS as u8 {
            write!(out, ", max split bits {}", self.max_split_bits)?;
        }
        out.write_str(")")
    }
}

/// Reply to [`SplitBucketCommand`]
#[derive(Debug, Clone, PartialEq)]
pub struct SplitBucketReply {
    /// Shared reply fields
    pub header: ReplyHeader,
    /// Bucket that was split
    pub bucket: Bucket,
    /// Resulting buckets and their state
    pub split_info: Vec<BucketInfoEntry>,
}

impl SplitBucketReply {
    /// Reply to `cmd`
    pub fn from_command(cmd: &SplitBucketCommand) -> Self {
        Self {
            header: ReplyHeader::for_command(&cmd.header),
            bucket: cmd.bucket,
            split_info: Vec::new(),
        }
    }
}

impl Render for SplitBucketReply {
    fn render(&self, out: &mut dyn fmt::Write, verbose: bool, indent: &str) -> fmt::Result {
        write!(out, "SplitBucketReply({}", self.bucket)?;
        if self.split_info.is_empty() {
            out.write_str(", No targets")?;
        } else {
            out.write_str(" ->")?;
            render_entries(out, &self.split_info, verbose, indent)?;
        }
        out.write_str(")")
    }
}

/// Join sibling buckets into their parent
#[derive(Debug, Clone, PartialEq)]
pub struct JoinBucketsCommand {
    /// Shared command fields
    pub header: CommandHeader,
    /// Target bucket
    pub bucket: Bucket,
    /// Buckets to join into the target
    pub sources: Vec<BucketId>,
    /// Used bits of the joined bucket
    pub min_join_bits: u8,
}

impl JoinBucketsCommand {
    /// Join into `bucket`; sources are filled in by the caller
    pub fn new(bucket: Bucket) -> Self {
        Self {
            header: CommandHeader::new(),
            bucket,
            sources: Vec::new(),
            min_join_bits: 0,
        }
    }
}

impl Render for JoinBucketsCommand {
    fn render(&self, out: &mut dyn fmt::Write, _verbose: bool, _indent: &str) -> fmt::Result {
        write!(out, "JoinBucketsCommand({}, sources [", self.bucket)?;
        for (i, source) in self.sources.iter().enumerate() {
            if i > 0 {
                out.write_str(", ")?;
            }
            write!(out, "{}", source)?;
        }
        write!(out, "], min join bits {})", self.min_join_bits)
    }
}

/// Reply to [`JoinBucketsCommand`]
#[derive(Debug, Clone, PartialEq)]
pub struct JoinBucketsReply {
    /// Shared reply fields
    pub header: ReplyHeader,
    /// Target bucket; restored from the command
    pub bucket: Bucket,
    /// Joined buckets; restored from the command
    pub sources: Vec<BucketId>,
    /// State of the joined bucket
    pub bucket_info: BucketInfo,
}

impl JoinBucketsReply {
    /// Reply to `cmd`
    pub fn from_command(cmd: &JoinBucketsCommand) -> Self {
        Self {
            header: ReplyHeader::for_command(&cmd.header),
            bucket: cmd.bucket,
            sources: cmd.sources.clone(),
            bucket_info: BucketInfo::default(),
        }
    }
}

impl Render for JoinBucketsReply {
    fn render(&self, out: &mut dyn fmt::Write, _verbose: bool, _indent: &str) -> fmt::Result {
        write!(
            out,
            "JoinBucketsReply({}, {} sources, {})",
            self.bucket,
            self.sources.len(),
            self.bucket_info
        )
    }
}
