//! Bucket lifecycle, bucket info and replica merge messages.

use super::render::{render_entries, Render};
use super::{CommandHeader, ReplyHeader};
use crate::bucket::{Bucket, BucketId, BucketSpace};
use crate::bucketinfo::BucketInfo;
use crate::types::{GlobalId, Timestamp};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Which buckets a [`RequestBucketInfoCommand`] asks about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketInfoRequest {
    /// Explicit bucket list; never empty on the wire
    Buckets(Vec<BucketId>),
    /// Every bucket the given distributor owns in a cluster state
    SystemState {
        /// Distributor index
        distributor: u16,
        /// Cluster state in its textual form
        cluster_state: String,
        /// Version tag of the cluster state
        state_version: String,
    },
}

/// Ask a storage node for bucket info
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBucketInfoCommand {
    /// Shared command fields
    pub header: CommandHeader,
    /// Bucket space the request applies to
    pub space: BucketSpace,
    /// Buckets asked about
    pub request: BucketInfoRequest,
}

impl RequestBucketInfoCommand {
    /// Ask about an explicit list of buckets
    pub fn for_buckets(space: BucketSpace, buckets: Vec<BucketId>) -> Self {
        Self {
            header: CommandHeader::new(),
            space,
            request: BucketInfoRequest::Buckets(buckets),
        }
    }

    /// Ask about every bucket owned by `distributor` in `cluster_state`
    pub fn for_system_state(
        space: BucketSpace,
        distributor: u16,
        cluster_state: impl Into<String>,
        state_version: impl Into<String>,
    ) -> Self {
        Self {
            header: CommandHeader::new(),
            space,
            request: BucketInfoRequest::SystemState {
                distributor,
                cluster_state: cluster_state.into(),
                state_version: state_version.into(),
            },
        }
    }

    /// Whether the request names a cluster state instead of buckets
    pub fn has_system_state(&self) -> bool {
        matches!(self.request, BucketInfoRequest::SystemState { .. })
    }

    /// Explicitly requested buckets; empty for a system state request
    pub fn buckets(&self) -> &[BucketId] {
        match &self.request {
            BucketInfoRequest::Buckets(ids) => ids,
            BucketInfoRequest::SystemState { .. } => &[],
        }
    }
}

impl Render for RequestBucketInfoCommand {
    fn render(&self, out: &mut dyn fmt::Write, verbose: bool, indent: &str) -> fmt::Result {
        out.write_str("RequestBucketInfo(")?;
        if !self.space.is_default() {
            write!(out, "{}, ", self.space)?;
        }
        match &self.request {
            BucketInfoRequest::Buckets(ids) => {
                write!(out, "{} buckets", ids.len())?;
                if verbose {
                    out.write_str(":")?;
                    for id in ids {
                        write!(out, "\n{}  {}", indent, id)?;
                    }
                }
            }
            BucketInfoRequest::SystemState {
                distributor,
                cluster_state,
                state_version,
            } => {
                write!(
                    out,
                    "distributor {} in state {} (version {})",
                    distributor, cluster_state, state_version
                )?;
            }
        }
        out.write_str(")")
    }
}

/// Bucket id paired with its info
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketInfoEntry {
    /// The bucket
    pub bucket_id: BucketId,
    /// Its replica state
    pub info: BucketInfo,
}

impl BucketInfoEntry {
    /// Pair `bucket_id` with `info`
    pub fn new(bucket_id: BucketId, info: BucketInfo) -> Self {
        Self { bucket_id, info }
    }

    /// Equality ignoring the last modification time of the info
    pub fn same_state(&self, other: &BucketInfoEntry) -> bool {
        self.bucket_id == other.bucket_id && self.info.same_state(&other.info)
    }
}

impl Render for BucketInfoEntry {
    fn render(&self, out: &mut dyn fmt::Write, _verbose: bool, _indent: &str) -> fmt::Result {
        write!(out, "Entry({}, {})", self.bucket_id, self.info)
    }
}

/// Reply to [`RequestBucketInfoCommand`]
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBucketInfoReply {
    /// Shared reply fields
    pub header: ReplyHeader,
    /// Info of every bucket covered by the request
    pub entries: Vec<BucketInfoEntry>,
}

impl RequestBucketInfoReply {
    /// Empty reply to `cmd`
    pub fn from_command(cmd: &RequestBucketInfoCommand) -> Self {
        Self {
            header: ReplyHeader::for_command(&cmd.header),
            entries: Vec::new(),
        }
    }
}

impl Render for RequestBucketInfoReply {
    fn render(&self, out: &mut dyn fmt::Write, verbose: bool, indent: &str) -> fmt::Result {
        write!(out, "RequestBucketInfoReply({}", self.entries.len())?;
        if verbose {
            out.write_str(":")?;
            render_entries(out, &self.entries, verbose, indent)?;
        }
        out.write_str(")")
    }
}

/// Tell a distributor that a bucket changed outside its control
#[derive(Debug, Clone, PartialEq)]
pub struct NotifyBucketChangeCommand {
    /// Shared command fields
    pub header: CommandHeader,
    /// Changed bucket
    pub bucket: Bucket,
    /// Its new state
    pub bucket_info: BucketInfo,
}

impl NotifyBucketChangeCommand {
    /// Announce `bucket_info` for `bucket`
    pub fn new(bucket: Bucket, bucket_info: BucketInfo) -> Self {
        Self {
            header: CommandHeader::new(),
            bucket,
            bucket_info,
        }
    }
}

impl Render for NotifyBucketChangeCommand {
    fn render(&self, out: &mut dyn fmt::Write, _verbose: bool, _indent: &str) -> fmt::Result {
        write!(out, "NotifyBucketChange({}, {})", self.bucket, self.bucket_info)
    }
}

/// Reply to [`NotifyBucketChangeCommand`]
#[derive(Debug, Clone, PartialEq)]
pub struct NotifyBucketChangeReply {
    /// Shared reply fields
    pub header: ReplyHeader,
    /// Changed bucket
    pub bucket: Bucket,
}

impl NotifyBucketChangeReply {
    /// Reply to `cmd`
    pub fn from_command(cmd: &NotifyBucketChangeCommand) -> Self {
        Self {
            header: ReplyHeader::for_command(&cmd.header),
            bucket: cmd.bucket,
        }
    }
}

impl Render for NotifyBucketChangeReply {
    fn render(&self, out: &mut dyn fmt::Write, _verbose: bool, _indent: &str) -> fmt::Result {
        write!(out, "NotifyBucketChangeReply({})", self.bucket)
    }
}

/// Create an empty bucket replica
#[derive(Debug, Clone, PartialEq)]
pub struct CreateBucketCommand {
    /// Shared command fields
    pub header: CommandHeader,
    /// Bucket to create
    pub bucket: Bucket,
    /// Create the replica as active
    pub active: bool,
}

impl CreateBucketCommand {
    /// Create `bucket`, inactive
    pub fn new(bucket: Bucket) -> Self {
        Self {
            header: CommandHeader::new(),
            bucket,
            active: false,
        }
    }
}

impl Render for CreateBucketCommand {
    fn render(&self, out: &mut dyn fmt::Write, _verbose: bool, _indent: &str) -> fmt::Result {
        write!(out, "CreateBucketCommand({}", self.bucket)?;
        if self.active {
            out.write_str(", active")?;
        }
        out.write_str(")")
    }
}

/// Reply to [`CreateBucketCommand`]
#[derive(Debug, Clone, PartialEq)]
pub struct CreateBucketReply {
    /// Shared reply fields
    pub header: ReplyHeader,
    /// Created bucket
    pub bucket: Bucket,
    /// State of the created replica
    pub bucket_info: BucketInfo,
}

impl CreateBucketReply {
    /// Reply to `cmd`
    pub fn from_command(cmd: &CreateBucketCommand) -> Self {
        Self {
            header: ReplyHeader::for_command(&cmd.header),
            bucket: cmd.bucket,
            bucket_info: BucketInfo::default(),
        }
    }
}

impl Render for CreateBucketReply {
    fn render(&self, out: &mut dyn fmt::Write, _verbose: bool, _indent: &str) -> fmt::Result {
        write!(out, "CreateBucketReply({}, {})", self.bucket, self.bucket_info)
    }
}

/// Delete a bucket replica
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteBucketCommand {
    /// Shared command fields
    pub header: CommandHeader,
    /// Bucket to delete
    pub bucket: Bucket,
    /// State the sender believes the replica is in
    pub bucket_info: BucketInfo,
}

impl DeleteBucketCommand {
    /// Delete `bucket`
    pub fn new(bucket: Bucket) -> Self {
        Self {
            header: CommandHeader::new(),
            bucket,
            bucket_info: BucketInfo::default(),
        }
    }
}

impl Render for DeleteBucketCommand {
    fn render(&self, out: &mut dyn fmt::Write, _verbose: bool, _indent: &str) -> fmt::Result {
        write!(out, "DeleteBucketCommand({}", self.bucket)?;
        if self.bucket_info.is_valid() && self.bucket_info != BucketInfo::default() {
            write!(out, ", {}", self.bucket_info)?;
        }
        out.write_str(")")
    }
}

/// Reply to [`DeleteBucketCommand`]
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteBucketReply {
    /// Shared reply fields
    pub header: ReplyHeader,
    /// Deleted bucket
    pub bucket: Bucket,
    /// State of the replica when it was deleted; not copied from the command
    pub bucket_info: BucketInfo,
}

impl DeleteBucketReply {
    /// Reply to `cmd`
    pub fn from_command(cmd: &DeleteBucketCommand) -> Self {
        Self {
            header: ReplyHeader::for_command(&cmd.header),
            bucket: cmd.bucket,
            bucket_info: BucketInfo::default(),
        }
    }
}

impl Render for DeleteBucketReply {
    fn render(&self, out: &mut dyn fmt::Write, _verbose: bool, _indent: &str) -> fmt::Result {
        write!(out, "DeleteBucketReply({}, {})", self.bucket, self.bucket_info)
    }
}

/// A node taking part in a merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MergeNode {
    /// Storage node index
    pub index: u16,
    /// Node only supplies data and keeps no merged copy
    pub source_only: bool,
}

impl MergeNode {
    /// Merge node
    pub fn new(index: u16, source_only: bool) -> Self {
        Self { index, source_only }
    }
}

impl From<u16> for MergeNode {
    fn from(index: u16) -> Self {
        Self::new(index, false)
    }
}

impl fmt::Display for MergeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index)?;
        if self.source_only {
            f.write_str(" (source only)")?;
        }
        Ok(())
    }
}

/// Nodes of a merge; rarely more than a handful
pub type MergeNodes = SmallVec<[MergeNode; 4]>;

/// Node indexes the merge has been forwarded through
pub type MergeChain = SmallVec<[u16; 4]>;

fn render_nodes(out: &mut dyn fmt::Write, nodes: &[MergeNode]) -> fmt::Result {
    out.write_str("Nodes(")?;
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            out.write_str(", ")?;
        }
        write!(out, "{}", node)?;
    }
    out.write_str(")")
}

/// Bring the replicas of a bucket on several nodes in sync
#[derive(Debug, Clone, PartialEq)]
pub struct MergeBucketCommand {
    /// Shared command fields
    pub header: CommandHeader,
    /// Bucket to merge
    pub bucket: Bucket,
    /// Participating nodes
    pub nodes: MergeNodes,
    /// Ignore entries newer than this
    pub max_timestamp: Timestamp,
    /// Cluster state version the merge was started in
    pub cluster_state_version: u32,
    /// Nodes the command has passed through
    pub chain: MergeChain,
}

impl MergeBucketCommand {
    /// Merge `bucket` across `nodes`
    pub fn new(
        bucket: Bucket,
        nodes: impl IntoIterator<Item = MergeNode>,
        max_timestamp: impl Into<Timestamp>,
        cluster_state_version: u32,
        chain: impl IntoIterator<Item = u16>,
    ) -> Self {
        Self {
            header: CommandHeader::new(),
            bucket,
            nodes: nodes.into_iter().collect(),
            max_timestamp: max_timestamp.into(),
            cluster_state_version,
            chain: chain.into_iter().collect(),
        }
    }
}

impl Render for MergeBucketCommand {
    fn render(&self, out: &mut dyn fmt::Write, _verbose: bool, _indent: &str) -> fmt::Result {
        write!(out, "MergeBucketCommand({}, ", self.bucket)?;
        render_nodes(out, &self.nodes)?;
        write!(
            out,
            ", max timestamp {}, cluster state version {}, chain [",
            self.max_timestamp, self.cluster_state_version
        )?;
        for (i, index) in self.chain.iter().enumerate() {
            if i > 0 {
                out.write_str(", ")?;
            }
            write!(out, "{}", index)?;
        }
        out.write_str("])")
    }
}

/// Reply to [`MergeBucketCommand`]; every field but the header comes from the command
#[derive(Debug, Clone, PartialEq)]
pub struct MergeBucketReply {
    /// Shared reply fields
    pub header: ReplyHeader,
    /// Merged bucket
    pub bucket: Bucket,
    /// Participating nodes
    pub nodes: MergeNodes,
    /// Timestamp bound of the merge
    pub max_timestamp: Timestamp,
    /// Cluster state version of the merge
    pub cluster_state_version: u32,
    /// Forwarding chain
    pub chain: MergeChain,
}

impl MergeBucketReply {
    /// Reply to `cmd`
    pub fn from_command(cmd: &MergeBucketCommand) -> Self {
        Self {
            header: ReplyHeader::for_command(&cmd.header),
            bucket: cmd.bucket,
            nodes: cmd.nodes.clone(),
            max_timestamp: cmd.max_timestamp,
            cluster_state_version: cmd.cluster_state_version,
            chain: cmd.chain.clone(),
        }
    }
}

impl Render for MergeBucketReply {
    fn render(&self, out: &mut dyn fmt::Write, _verbose: bool, _indent: &str) -> fmt::Result {
        write!(out, "MergeBucketReply({}, ", self.bucket)?;
        render_nodes(out, &self.nodes)?;
        write!(
            out,
            ", max timestamp {}, cluster state version {})",
            self.max_timestamp, self.cluster_state_version
        )
    }
}

/// Metadata of one document version in a bucket diff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DiffEntry {
    /// Version timestamp
    pub timestamp: Timestamp,
    /// Document global id
    pub gid: GlobalId,
    /// Size of the header part
    pub header_size: u32,
    /// Size of the body part
    pub body_size: u32,
    /// Entry flags, e.g. remove entry
    pub flags: u16,
    /// Bit per merge node telling which nodes hold this version
    pub has_mask: u16,
}

impl Render for DiffEntry {
    fn render(&self, out: &mut dyn fmt::Write, verbose: bool, indent: &str) -> fmt::Result {
        write!(
            out,
            "Entry(timestamp: {}, {}, hasMask: {:#x},",
            self.timestamp, self.gid, self.has_mask
        )?;
        if verbose {
            write!(out, "\n{}      ", indent)?;
        } else {
            out.write_str(" ")?;
        }
        write!(
            out,
            "header size: {}, body size: {}, flags {:#x})",
            self.header_size, self.body_size, self.flags
        )
    }
}

/// Compute which document versions each merge node lacks
#[derive(Debug, Clone, PartialEq)]
pub struct GetBucketDiffCommand {
    /// Shared command fields
    pub header: CommandHeader,
    /// Bucket being merged
    pub bucket: Bucket,
    /// Participating nodes
    pub nodes: MergeNodes,
    /// Ignore entries newer than this
    pub max_timestamp: Timestamp,
    /// Entries collected so far
    pub diff: Vec<DiffEntry>,
}

impl GetBucketDiffCommand {
    /// Diff `bucket` across `nodes`
    pub fn new(
        bucket: Bucket,
        nodes: impl IntoIterator<Item = MergeNode>,
        max_timestamp: impl Into<Timestamp>,
    ) -> Self {
        Self {
            header: CommandHeader::new(),
            bucket,
            nodes: nodes.into_iter().collect(),
            max_timestamp: max_timestamp.into(),
            diff: Vec::new(),
        }
    }
}

impl Render for GetBucketDiffCommand {
    fn render(&self, out: &mut dyn fmt::Write, verbose: bool, indent: &str) -> fmt::Result {
        write!(out, "GetBucketDiffCommand({}, ", self.bucket)?;
        render_nodes(out, &self.nodes)?;
        write!(
            out,
            ", max timestamp {}, {} entries",
            self.max_timestamp,
            self.diff.len()
        )?;
        if verbose && !self.diff.is_empty() {
            out.write_str(":")?;
            render_entries(out, &self.diff, verbose, indent)?;
        }
        out.write_str(")")
    }
}

/// Reply to [`GetBucketDiffCommand`]
#[derive(Debug, Clone, PartialEq)]
pub struct GetBucketDiffReply {
    /// Shared reply fields
    pub header: ReplyHeader,
    /// Bucket being merged; restored from the command
    pub bucket: Bucket,
    /// Participating nodes; restored from the command
    pub nodes: MergeNodes,
    /// Timestamp bound; restored from the command
    pub max_timestamp: Timestamp,
    /// Resulting diff
    pub diff: Vec<DiffEntry>,
}

impl GetBucketDiffReply {
    /// Reply to `cmd`, starting from the command's diff
    pub fn from_command(cmd: &GetBucketDiffCommand) -> Self {
        Self {
            header: ReplyHeader::for_command(&cmd.header),
            bucket: cmd.bucket,
            nodes: cmd.nodes.clone(),
            max_timestamp: cmd.max_timestamp,
            diff: cmd.diff.clone(),
        }
    }
}

impl Render for GetBucketDiffReply {
    fn render(&self, out: &mut dyn fmt::Write, verbose: bool, indent: &str) -> fmt::Result {
        write!(out, "GetBucketDiffReply({}, ", self.bucket)?;
        render_nodes(out, &self.nodes)?;
        write!(
            out,
            ", max timestamp {}, {} entries",
            self.max_timestamp,
            self.diff.len()
        )?;
        if verbose && !self.diff.is_empty() {
            out.write_str(":")?;
            render_entries(out, &self.diff, verbose, indent)?;
        }
        out.write_str(")")
    }
}

/// Diff entry with the document data needed to apply it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ApplyDiffEntry {
    /// Entry metadata
    pub entry: DiffEntry,
    /// Name of the document type
    pub doc_name: String,
    /// Serialized header part, empty if not transferred
    pub header_blob: Bytes,
    /// Serialized body part, empty if not transferred
    pub body_blob: Bytes,
}

impl Render for ApplyDiffEntry {
    fn render(&self, out: &mut dyn fmt::Write, verbose: bool, indent: &str) -> fmt::Result {
        out.write_str("ApplyEntry(")?;
        self.entry.render(out, verbose, indent)?;
        write!(
            out,
            ", name({}), header blob({}), body blob({}))",
            self.doc_name,
            self.header_blob.len(),
            self.body_blob.len()
        )
    }
}

/// Transfer missing document versions between merge nodes
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyBucketDiffCommand {
    /// Shared command fields
    pub header: CommandHeader,
    /// Bucket being merged
    pub bucket: Bucket,
    /// Participating nodes
    pub nodes: MergeNodes,
    /// Largest payload the receiver should fill in
    pub max_buffer_size: u32,
    /// Entries to apply
    pub diff: Vec<ApplyDiffEntry>,
}

impl ApplyBucketDiffCommand {
    /// Apply a diff of `bucket` across `nodes`
    pub fn new(bucket: Bucket, nodes: impl IntoIterator<Item = MergeNode>, max_buffer_size: u32) -> Self {
        Self {
            header: CommandHeader::new(),
            bucket,
            nodes: nodes.into_iter().collect(),
            max_buffer_size,
            diff: Vec::new(),
        }
    }
}

impl Render for ApplyBucketDiffCommand {
    fn render(&self, out: &mut dyn fmt::Write, verbose: bool, indent: &str) -> fmt::Result {
        write!(out, "ApplyBucketDiffCommand({}, ", self.bucket)?;
        render_nodes(out, &self.nodes)?;
        write!(
            out,
            ", max buffer size {}, {} entries",
            self.max_buffer_size,
            self.diff.len()
        )?;
        if verbose && !self.diff.is_empty() {
            out.write_str(":")?;
            render_entries(out, &self.diff, verbose, indent)?;
        }
        out.write_str(")")
    }
}

/// Reply to [`ApplyBucketDiffCommand`]
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyBucketDiffReply {
    /// Shared reply fields
    pub header: ReplyHeader,
    /// Bucket being merged; restored from the command
    pub bucket: Bucket,
    /// Participating nodes; restored from the command
    pub nodes: MergeNodes,
    /// Buffer size bound; restored from the command
    pub max_buffer_size: u32,
    /// Entries as applied or filled in by the receiver
    pub diff: Vec<ApplyDiffEntry>,
}

impl ApplyBucketDiffReply {
    /// Reply to `cmd`, starting from the command's entries
    pub fn from_command(cmd: &ApplyBucketDiffCommand) -> Self {
        Self {
            header: ReplyHeader::for_command(&cmd.header),
            bucket: cmd.bucket,
            nodes: cmd.nodes.clone(),
            max_buffer_size: cmd.max_buffer_size,
            diff: cmd.diff.clone(),
        }
    }
}

impl Render for ApplyBucketDiffReply {
    fn render(&self, out: &mut dyn fmt::Write, verbose: bool, indent: &str) -> fmt::Result {
        write!(out, "ApplyBucketDiffReply({}, ", self.bucket)?;
        render_nodes(out, &self.nodes)?;
        write!(
            out,
            ", max buffer size {}, {} entries",
            self.max_buffer_size,
            self.diff.len()
        )?;
        if verbose && !self.diff.is_empty() {
            out.write_str(":")?;
            render_entries(out, &self.diff, verbose, indent)?;
        }
        out.write_str(")")
    }
}

/// Activation state of a bucket replica
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BucketState {
    /// Replica does not serve searches
    Inactive = 0,
    /// Replica serves searches
    Active = 1,
}

impl TryFrom<u8> for BucketState {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(BucketState::Inactive),
            1 => Ok(BucketState::Active),
            other => Err(other),
        }
    }
}

impl fmt::Display for BucketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketState::Inactive => f.write_str("INACTIVE"),
            BucketState::Active => f.write_str("ACTIVE"),
        }
    }
}

/// Activate or deactivate a bucket replica
#[derive(Debug, Clone, PartialEq)]
pub struct SetBucketStateCommand {
    /// Shared command fields
    pub header: CommandHeader,
    /// Target bucket
    pub bucket: Bucket,
    /// Requested state
    pub state: BucketState,
}

impl SetBucketStateCommand {
    /// Set `bucket` to `state`
    pub fn new(bucket: Bucket, state: BucketState) -> Self {
        Self {
            header: CommandHeader::new(),
            bucket,
            state,
        }
    }
}

impl Render for SetBucketStateCommand {
    fn render(&self, out: &mut dyn fmt::Write, _verbose: bool, _indent: &str) -> fmt::Result {
        write!(out, "SetBucketStateCommand({}, {})", self.bucket, self.state)
    }
}

/// Reply to [`SetBucketStateCommand`]
#[derive(Debug, Clone, PartialEq)]
pub struct SetBucketStateReply {
    /// Shared reply fields
    pub header: ReplyHeader,
    /// Target bucket
    pub bucket: Bucket,
}

impl SetBucketStateReply {
    /// Reply to `cmd`
    pub fn from_command(cmd: &SetBucketStateCommand) -> Self {
        Self {
            header: ReplyHeader::for_command(&cmd.header),
            bucket: cmd.bucket,
        }
    }
}

impl Render for SetBucketStateReply {
    fn render(&self, out: &mut dyn fmt::Write, _verbose: bool, _indent: &str) -> fmt::Result {
        write!(out, "SetBucketStateReply({})", self.bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diff_entry() -> DiffEntry {
        DiffEntry {
            timestamp: Timestamp(123456),
            gid: GlobalId::from_raw(b"1234567890abcdef"),
            header_size: 100,
            body_size: 65536,
            flags: 1,
            has_mask: 3,
        }
    }

    #[test]
    fn test_diff_entry_verbose_render() {
        assert_eq!(
            diff_entry().rendered(true, ""),
            "Entry(timestamp: 123456, gid(0x313233343536373839306162), hasMask: 0x3,\n      \
             header size: 100, body size: 65536, flags 0x1)"
        );
        assert_eq!(
            diff_entry().rendered(false, ""),
            "Entry(timestamp: 123456, gid(0x313233343536373839306162), hasMask: 0x3, \
             header size: 100, body size: 65536, flags 0x1)"
        );
    }

    #[test]
    fn test_request_bucket_info_forms() {
        let cmd = RequestBucketInfoCommand::for_buckets(
            BucketSpace::DEFAULT,
            vec![BucketId::from_raw(3), BucketId::from_raw(7)],
        );
        assert!(!cmd.has_system_state());
        assert_eq!(cmd.buckets().len(), 2);

        let cmd = RequestBucketInfoCommand::for_system_state(
            BucketSpace::DEFAULT,
            3,
            "distributor:3 .1.s:d",
            "14",
        );
        assert!(cmd.has_system_state());
        assert!(cmd.buckets().is_empty());
        assert_eq!(
            cmd.rendered(false, ""),
            "RequestBucketInfo(distributor 3 in state distributor:3 .1.s:d (version 14))"
        );
    }

    #[test]
    fn test_bucket_info_entries_render_nested() {
        let cmd = RequestBucketInfoCommand::for_buckets(BucketSpace::DEFAULT, vec![BucketId::from_raw(4)]);
        let mut reply = RequestBucketInfoReply::from_command(&cmd);
        reply
            .entries
            .push(BucketInfoEntry::new(BucketId::from_raw(4), BucketInfo::new(2, 3, 4)));
        assert_eq!(
            reply.rendered(true, "  "),
            "RequestBucketInfoReply(1:\n    Entry(BucketId(0x0000000000000004), \
             BucketInfo(crc 0x2, docCount 3, totDocSize 4, ready false, active false)))"
        );
    }

    #[test]
    fn test_merge_reply_copies_command() {
        let cmd = MergeBucketCommand::new(
            Bucket::in_default_space(BucketId::from_raw(623)),
            [MergeNode::new(4, false), MergeNode::new(13, true), MergeNode::new(26, true)],
            1234u64,
            567,
            [7, 14],
        );
        let reply = MergeBucketReply::from_command(&cmd);
        assert_eq!(reply.nodes, cmd.nodes);
        assert_eq!(reply.chain.as_slice(), &[7, 14]);
        assert_eq!(reply.max_timestamp, Timestamp(1234));
        assert_eq!(reply.cluster_state_version, 567);
        assert_eq!(
            cmd.rendered(false, ""),
            "MergeBucketCommand(BucketId(0x000000000000026f), Nodes(4, 13 (source only), \
             26 (source only)), max timestamp 1234, cluster state version 567, chain [7, 14])"
        );
    }

    #[test]
    fn test_bucket_state_conversion() {
        assert_eq!(BucketState::try_from(1), Ok(BucketState::Active));
        assert_eq!(BucketState::try_from(2), Err(2));
    }
}
