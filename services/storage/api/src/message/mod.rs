//! Storage commands and replies.
//!
//! Every operation is a command/reply pair drawn from the closed set of
//! [`MessageKind`]s. Commands are collected in [`StorageCommand`], replies in
//! [`StorageReply`]; both are matched exhaustively wherever they are
//! dispatched, so adding a kind fails to compile until every site handles it.

pub mod bucket;
pub mod internal;
pub mod persistence;
pub mod render;
pub mod splitting;
pub mod visitor;

use crate::bucket::Bucket;
use crate::types::{LoadType, DEFAULT_PRIORITY};
use render::Render;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use storage_wire::Revision;

pub use bucket::*;
pub use internal::*;
pub use persistence::*;
pub use splitting::*;
pub use visitor::*;

/// Approximate size of a message that has not been through a codec
pub const DEFAULT_APPROX_BYTE_SIZE: u32 = 50;

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique message identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Allocate the next id; never returns the same id twice in a process
    pub fn next() -> Self {
        MessageId(NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed set of message kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// Fetch a document
    Get,
    /// Store a document
    Put,
    /// Remove a document
    Remove,
    /// Undo earlier operations by timestamp
    Revert,
    /// Start a visitor
    CreateVisitor,
    /// Stop a visitor
    DestroyVisitor,
    /// Ask for bucket info
    RequestBucketInfo,
    /// Announce a bucket change
    NotifyBucketChange,
    /// Create a bucket
    CreateBucket,
    /// Merge bucket replicas
    MergeBucket,
    /// Delete a bucket
    DeleteBucket,
    /// Compute a replica diff
    GetBucketDiff,
    /// Apply a replica diff
    ApplyBucketDiff,
    /// Split a bucket
    SplitBucket,
    /// Join buckets
    JoinBuckets,
    /// Activate or deactivate a bucket
    SetBucketState,
    /// Remove documents matching a selection
    RemoveLocation,
    /// Partially update a document
    Update,
    /// Node-local signaling
    Internal,
}

impl MessageKind {
    /// Every kind, wire kinds first
    pub const ALL: [MessageKind; 19] = [
        MessageKind::Get,
        MessageKind::Put,
        MessageKind::Remove,
        MessageKind::Revert,
        MessageKind::CreateVisitor,
        MessageKind::DestroyVisitor,
        MessageKind::RequestBucketInfo,
        MessageKind::NotifyBucketChange,
        MessageKind::CreateBucket,
        MessageKind::MergeBucket,
        MessageKind::DeleteBucket,
        MessageKind::GetBucketDiff,
        MessageKind::ApplyBucketDiff,
        MessageKind::SplitBucket,
        MessageKind::JoinBuckets,
        MessageKind::SetBucketState,
        MessageKind::RemoveLocation,
        MessageKind::Update,
        MessageKind::Internal,
    ];

    /// Tag written first on the wire for the command; the reply uses tag + 1
    pub fn command_tag(self) -> u16 {
        match self {
            MessageKind::Get => 4,
            MessageKind::Put => 10,
            MessageKind::Remove => 12,
            MessageKind::Revert => 14,
            MessageKind::CreateVisitor => 20,
            MessageKind::DestroyVisitor => 22,
            MessageKind::RequestBucketInfo => 26,
            MessageKind::NotifyBucketChange => 28,
            MessageKind::CreateBucket => 32,
            MessageKind::MergeBucket => 34,
            MessageKind::DeleteBucket => 36,
            MessageKind::GetBucketDiff => 50,
            MessageKind::ApplyBucketDiff => 52,
            MessageKind::SplitBucket => 56,
            MessageKind::Internal => 58,
            MessageKind::JoinBuckets => 60,
            MessageKind::SetBucketState => 64,
            MessageKind::Update => 80,
            MessageKind::RemoveLocation => 86,
        }
    }

    /// Tag of the reply
    pub fn reply_tag(self) -> u16 {
        self.command_tag() + 1
    }

    /// Resolve a wire tag into a kind and whether it denotes a reply
    pub fn from_tag(tag: u16) -> Option<(MessageKind, bool)> {
        let command_tag = tag & !1;
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.command_tag() == command_tag)
            .map(|k| (k, tag & 1 == 1))
    }

    /// Oldest revision that carries this kind; `None` if never serialized
    pub fn min_revision(self) -> Option<Revision> {
        match self {
            MessageKind::Internal => None,
            MessageKind::JoinBuckets | MessageKind::SetBucketState => Some(Revision::V5_1),
            _ => Some(Revision::V5_0),
        }
    }

    /// Whether the kind exists on the wire at `rev`
    pub fn supported_at(self, rev: Revision) -> bool {
        self.min_revision().is_some_and(|min| rev >= min)
    }

    /// Whether decoding the reply needs the originating command
    pub fn reply_needs_command(self) -> bool {
        matches!(
            self,
            MessageKind::Get
                | MessageKind::Put
                | MessageKind::Remove
                | MessageKind::Revert
                | MessageKind::Update
                | MessageKind::MergeBucket
                | MessageKind::GetBucketDiff
                | MessageKind::ApplyBucketDiff
                | MessageKind::JoinBuckets
        )
    }

    /// Command name
    pub fn name(self) -> &'static str {
        match self {
            MessageKind::Get => "Get",
            MessageKind::Put => "Put",
            MessageKind::Remove => "Remove",
            MessageKind::Revert => "Revert",
            MessageKind::CreateVisitor => "CreateVisitor",
            MessageKind::DestroyVisitor => "DestroyVisitor",
            MessageKind::RequestBucketInfo => "RequestBucketInfo",
            MessageKind::NotifyBucketChange => "NotifyBucketChange",
            MessageKind::CreateBucket => "CreateBucket",
            MessageKind::MergeBucket => "MergeBucket",
            MessageKind::DeleteBucket => "DeleteBucket",
            MessageKind::GetBucketDiff => "GetBucketDiff",
            MessageKind::ApplyBucketDiff => "ApplyBucketDiff",
            MessageKind::SplitBucket => "SplitBucket",
            MessageKind::JoinBuckets => "JoinBuckets",
            MessageKind::SetBucketState => "SetBucketState",
            MessageKind::RemoveLocation => "RemoveLocation",
            MessageKind::Update => "Update",
            MessageKind::Internal => "Internal",
        }
    }

    /// Reply name
    pub fn reply_name(self) -> &'static str {
        match self {
            MessageKind::Get => "GetReply",
            MessageKind::Put => "PutReply",
            MessageKind::Remove => "RemoveReply",
            MessageKind::Revert => "RevertReply",
            MessageKind::CreateVisitor => "CreateVisitorReply",
            MessageKind::DestroyVisitor => "DestroyVisitorReply",
            MessageKind::RequestBucketInfo => "RequestBucketInfoReply",
            MessageKind::NotifyBucketChange => "NotifyBucketChangeReply",
            MessageKind::CreateBucket => "CreateBucketReply",
            MessageKind::MergeBucket => "MergeBucketReply",
            MessageKind::DeleteBucket => "DeleteBucketReply",
            MessageKind::GetBucketDiff => "GetBucketDiffReply",
            MessageKind::ApplyBucketDiff => "ApplyBucketDiffReply",
            MessageKind::SplitBucket => "SplitBucketReply",
            MessageKind::JoinBuckets => "JoinBucketsReply",
            MessageKind::SetBucketState => "SetBucketStateReply",
            MessageKind::RemoveLocation => "RemoveLocationReply",
            MessageKind::Update => "UpdateReply",
            MessageKind::Internal => "InternalReply",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome category of a reply
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultCode {
    /// Success
    Ok = 0,
    /// Node not ready to serve the operation
    NotReady = 10,
    /// Sender used an outdated cluster state
    WrongDistribution = 20,
    /// Operation aborted
    Aborted = 30,
    /// Target bucket does not exist
    BucketNotFound = 40,
    /// Target bucket was deleted while the operation ran
    BucketDeleted = 41,
    /// Test-and-set condition did not match
    TestAndSetConditionFailed = 50,
    /// Operation timed out
    Timeout = 60,
    /// Unexpected failure on the node
    InternalFailure = 70,
    /// Operation not implemented by the node
    NotImplemented = 80,
}

impl ResultCode {
    /// Upper-case name used in renderings
    pub fn name(self) -> &'static str {
        match self {
            ResultCode::Ok => "NONE",
            ResultCode::NotReady => "NOT_READY",
            ResultCode::WrongDistribution => "WRONG_DISTRIBUTION",
            ResultCode::Aborted => "ABORTED",
            ResultCode::BucketNotFound => "BUCKET_NOT_FOUND",
            ResultCode::BucketDeleted => "BUCKET_DELETED",
            ResultCode::TestAndSetConditionFailed => "TEST_AND_SET_CONDITION_FAILED",
            ResultCode::Timeout => "TIMEOUT",
            ResultCode::InternalFailure => "INTERNAL_FAILURE",
            ResultCode::NotImplemented => "NOT_IMPLEMENTED",
        }
    }
}

impl TryFrom<u32> for ResultCode {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ResultCode::Ok),
            10 => Ok(ResultCode::NotReady),
            20 => Ok(ResultCode::WrongDistribution),
            30 => Ok(ResultCode::Aborted),
            40 => Ok(ResultCode::BucketNotFound),
            41 => Ok(ResultCode::BucketDeleted),
            50 => Ok(ResultCode::TestAndSetConditionFailed),
            60 => Ok(ResultCode::Timeout),
            70 => Ok(ResultCode::InternalFailure),
            80 => Ok(ResultCode::NotImplemented),
            other => Err(other),
        }
    }
}

/// Result code plus an optional human-readable message
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReturnCode {
    /// Outcome category
    pub result: ResultCode,
    /// Explanation, empty on success
    pub message: String,
}

impl ReturnCode {
    /// Successful outcome
    pub fn ok() -> Self {
        Self::new(ResultCode::Ok, "")
    }

    /// Outcome with a message
    pub fn new(result: ResultCode, message: impl Into<String>) -> Self {
        Self {
            result,
            message: message.into(),
        }
    }

    /// Whether the operation succeeded
    pub fn success(&self) -> bool {
        self.result == ResultCode::Ok
    }
}

impl Default for ReturnCode {
    fn default() -> Self {
        Self::ok()
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "ReturnCode({})", self.result.name())
        } else {
            write!(f, "ReturnCode({}, {})", self.result.name(), self.message)
        }
    }
}

/// Fields shared by every command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandHeader {
    /// Identity used to correlate the reply
    pub msg_id: MessageId,
    /// Storage priority, lower is more urgent
    pub priority: u8,
    /// Index of the sending node, if known
    pub source_index: Option<u16>,
    /// Traffic class
    pub load_type: LoadType,
    /// Approximate size for resource accounting
    pub approx_size: u32,
}

impl CommandHeader {
    /// Header with a freshly allocated message id
    pub fn new() -> Self {
        Self {
            msg_id: MessageId::next(),
            priority: DEFAULT_PRIORITY,
            source_index: None,
            load_type: LoadType::default(),
            approx_size: DEFAULT_APPROX_BYTE_SIZE,
        }
    }

    fn render(&self, out: &mut dyn fmt::Write, kind: MessageKind) -> fmt::Result {
        write!(
            out,
            "StorageCommand({}, id {}, priority {}",
            kind.name(),
            self.msg_id,
            self.priority
        )?;
        if let Some(source) = self.source_index {
            write!(out, ", source {}", source)?;
        }
        if self.load_type.id != 0 {
            write!(out, ", load type {}", self.load_type.name)?;
        }
        out.write_str(")")
    }
}

impl Default for CommandHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Fields shared by every reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyHeader {
    /// Message id of the originating command
    pub msg_id: MessageId,
    /// Priority inherited from the command
    pub priority: u8,
    /// Outcome
    pub result: ReturnCode,
    /// Approximate size for resource accounting
    pub approx_size: u32,
}

impl ReplyHeader {
    /// Successful reply header for the given command header
    pub fn for_command(cmd: &CommandHeader) -> Self {
        Self {
            msg_id: cmd.msg_id,
            priority: cmd.priority,
            result: ReturnCode::ok(),
            approx_size: DEFAULT_APPROX_BYTE_SIZE,
        }
    }

    fn render(&self, out: &mut dyn fmt::Write, kind: MessageKind) -> fmt::Result {
        write!(out, "StorageReply({}, {})", kind.reply_name(), self.result)
    }
}

macro_rules! each_command {
    ($value:expr, $cmd:ident => $body:expr) => {
        match $value {
            StorageCommand::Get($cmd) => $body,
            StorageCommand::Put($cmd) => $body,
            StorageCommand::Remove($cmd) => $body,
            StorageCommand::Revert($cmd) => $body,
            StorageCommand::CreateVisitor($cmd) => $body,
            StorageCommand::DestroyVisitor($cmd) => $body,
            StorageCommand::RequestBucketInfo($cmd) => $body,
            StorageCommand::NotifyBucketChange($cmd) => $body,
            StorageCommand::CreateBucket($cmd) => $body,
            StorageCommand::MergeBucket($cmd) => $body,
            StorageCommand::DeleteBucket($cmd) => $body,
            StorageCommand::GetBucketDiff($cmd) => $body,
            StorageCommand::ApplyBucketDiff($cmd) => $body,
            StorageCommand::SplitBucket($cmd) => $body,
            StorageCommand::JoinBuckets($cmd) => $body,
            StorageCommand::SetBucketState($cmd) => $body,
            StorageCommand::RemoveLocation($cmd) => $body,
            StorageCommand::Update($cmd) => $body,
            StorageCommand::Internal($cmd) => $body,
        }
    };
}

macro_rules! each_reply {
    ($value:expr, $reply:ident => $body:expr) => {
        match $value {
            StorageReply::Get($reply) => $body,
            StorageReply::Put($reply) => $body,
            StorageReply::Remove($reply) => $body,
            StorageReply::Revert($reply) => $body,
            StorageReply::CreateVisitor($reply) => $body,
            StorageReply::DestroyVisitor($reply) => $body,
            StorageReply::RequestBucketInfo($reply) => $body,
            StorageReply::NotifyBucketChange($reply) => $body,
            StorageReply::CreateBucket($reply) => $body,
            StorageReply::MergeBucket($reply) => $body,
            StorageReply::DeleteBucket($reply) => $body,
            StorageReply::GetBucketDiff($reply) => $body,
            StorageReply::ApplyBucketDiff($reply) => $body,
            StorageReply::SplitBucket($reply) => $body,
            StorageReply::JoinBuckets($reply) => $body,
            StorageReply::SetBucketState($reply) => $body,
            StorageReply::RemoveLocation($reply) => $body,
            StorageReply::Update($reply) => $body,
            StorageReply::Internal($reply) => $body,
        }
    };
}

/// Any storage command
#[derive(Debug, Clone, PartialEq)]
pub enum StorageCommand {
    /// Get
    Get(GetCommand),
    /// Put
    Put(PutCommand),
    /// Remove
    Remove(RemoveCommand),
    /// Revert
    Revert(RevertCommand),
    /// CreateVisitor
    CreateVisitor(CreateVisitorCommand),
    /// DestroyVisitor
    DestroyVisitor(DestroyVisitorCommand),
    /// RequestBucketInfo
    RequestBucketInfo(RequestBucketInfoCommand),
    /// NotifyBucketChange
    NotifyBucketChange(NotifyBucketChangeCommand),
    /// CreateBucket
    CreateBucket(CreateBucketCommand),
    /// MergeBucket
    MergeBucket(MergeBucketCommand),
    /// DeleteBucket
    DeleteBucket(DeleteBucketCommand),
    /// GetBucketDiff
    GetBucketDiff(GetBucketDiffCommand),
    /// ApplyBucketDiff
    ApplyBucketDiff(ApplyBucketDiffCommand),
    /// SplitBucket
    SplitBucket(SplitBucketCommand),
    /// JoinBuckets
    JoinBuckets(JoinBucketsCommand),
    /// SetBucketState
    SetBucketState(SetBucketStateCommand),
    /// RemoveLocation
    RemoveLocation(RemoveLocationCommand),
    /// Update
    Update(UpdateCommand),
    /// Internal
    Internal(InternalCommand),
}

impl StorageCommand {
    /// Kind of this command
    pub fn kind(&self) -> MessageKind {
        match self {
            StorageCommand::Get(_) => MessageKind::Get,
            StorageCommand::Put(_) => MessageKind::Put,
            StorageCommand::Remove(_) => MessageKind::Remove,
            StorageCommand::Revert(_) => MessageKind::Revert,
            StorageCommand::CreateVisitor(_) => MessageKind::CreateVisitor,
            StorageCommand::DestroyVisitor(_) => MessageKind::DestroyVisitor,
            StorageCommand::RequestBucketInfo(_) => MessageKind::RequestBucketInfo,
            StorageCommand::NotifyBucketChange(_) => MessageKind::NotifyBucketChange,
            StorageCommand::CreateBucket(_) => MessageKind::CreateBucket,
            StorageCommand::MergeBucket(_) => MessageKind::MergeBucket,
            StorageCommand::DeleteBucket(_) => MessageKind::DeleteBucket,
            StorageCommand::GetBucketDiff(_) => MessageKind::GetBucketDiff,
            StorageCommand::ApplyBucketDiff(_) => MessageKind::ApplyBucketDiff,
            StorageCommand::SplitBucket(_) => MessageKind::SplitBucket,
            StorageCommand::JoinBuckets(_) => MessageKind::JoinBuckets,
            StorageCommand::SetBucketState(_) => MessageKind::SetBucketState,
            StorageCommand::RemoveLocation(_) => MessageKind::RemoveLocation,
            StorageCommand::Update(_) => MessageKind::Update,
            StorageCommand::Internal(_) => MessageKind::Internal,
        }
    }

    /// Shared command fields
    pub fn header(&self) -> &CommandHeader {
        each_command!(self, c => &c.header)
    }

    /// Mutable shared command fields
    pub fn header_mut(&mut self) -> &mut CommandHeader {
        each_command!(self, c => &mut c.header)
    }

    /// Message id
    pub fn msg_id(&self) -> MessageId {
        self.header().msg_id
    }

    /// Overwrite the message id, for reproducible serialization dumps
    pub fn force_msg_id(&mut self, id: MessageId) {
        self.header_mut().msg_id = id;
    }

    /// Approximate size for resource accounting
    pub fn approx_size(&self) -> u32 {
        self.header().approx_size
    }

    /// Target bucket of bucket-addressed commands
    pub fn bucket(&self) -> Option<Bucket> {
        match self {
            StorageCommand::Get(c) => Some(c.bucket),
            StorageCommand::Put(c) => Some(c.bucket),
            StorageCommand::Remove(c) => Some(c.bucket),
            StorageCommand::Revert(c) => Some(c.bucket),
            StorageCommand::NotifyBucketChange(c) => Some(c.bucket),
            StorageCommand::CreateBucket(c) => Some(c.bucket),
            StorageCommand::MergeBucket(c) => Some(c.bucket),
            StorageCommand::DeleteBucket(c) => Some(c.bucket),
            StorageCommand::GetBucketDiff(c) => Some(c.bucket),
            StorageCommand::ApplyBucketDiff(c) => Some(c.bucket),
            StorageCommand::SplitBucket(c) => Some(c.bucket),
            StorageCommand::JoinBuckets(c) => Some(c.bucket),
            StorageCommand::SetBucketState(c) => Some(c.bucket),
            StorageCommand::RemoveLocation(c) => Some(c.bucket),
            StorageCommand::Update(c) => Some(c.bucket),
            StorageCommand::CreateVisitor(_)
            | StorageCommand::DestroyVisitor(_)
            | StorageCommand::RequestBucketInfo(_)
            | StorageCommand::Internal(_) => None,
        }
    }

    /// Build the default successful reply for this command
    pub fn make_reply(&self) -> StorageReply {
        match self {
            StorageCommand::Get(c) => StorageReply::Get(GetReply::from_command(c, None, Default::default())),
            StorageCommand::Put(c) => StorageReply::Put(PutReply::from_command(c, true)),
            StorageCommand::Remove(c) => StorageReply::Remove(RemoveReply::from_command(c, Default::default())),
            StorageCommand::Revert(c) => StorageReply::Revert(RevertReply::from_command(c)),
            StorageCommand::CreateVisitor(c) => StorageReply::CreateVisitor(CreateVisitorReply::from_command(c)),
            StorageCommand::DestroyVisitor(c) => StorageReply::DestroyVisitor(DestroyVisitorReply::from_command(c)),
            StorageCommand::RequestBucketInfo(c) => {
                StorageReply::RequestBucketInfo(RequestBucketInfoReply::from_command(c))
            }
            StorageCommand::NotifyBucketChange(c) => {
                StorageReply::NotifyBucketChange(NotifyBucketChangeReply::from_command(c))
            }
            StorageCommand::CreateBucket(c) => StorageReply::CreateBucket(CreateBucketReply::from_command(c)),
            StorageCommand::MergeBucket(c) => StorageReply::MergeBucket(MergeBucketReply::from_command(c)),
            StorageCommand::DeleteBucket(c) => StorageReply::DeleteBucket(DeleteBucketReply::from_command(c)),
            StorageCommand::GetBucketDiff(c) => StorageReply::GetBucketDiff(GetBucketDiffReply::from_command(c)),
            StorageCommand::ApplyBucketDiff(c) => {
                StorageReply::ApplyBucketDiff(ApplyBucketDiffReply::from_command(c))
            }
            StorageCommand::SplitBucket(c) => StorageReply::SplitBucket(SplitBucketReply::from_command(c)),
            StorageCommand::JoinBuckets(c) => StorageReply::JoinBuckets(JoinBucketsReply::from_command(c)),
            StorageCommand::SetBucketState(c) => {
                StorageReply::SetBucketState(SetBucketStateReply::from_command(c))
            }
            StorageCommand::RemoveLocation(c) => {
                StorageReply::RemoveLocation(RemoveLocationReply::from_command(c))
            }
            StorageCommand::Update(c) => StorageReply::Update(UpdateReply::from_command(c, Default::default())),
            StorageCommand::Internal(c) => StorageReply::Internal(InternalReply::from_command(c)),
        }
    }
}

impl Render for StorageCommand {
    fn render(&self, out: &mut dyn fmt::Write, verbose: bool, indent: &str) -> fmt::Result {
        each_command!(self, c => c.render(out, verbose, indent))?;
        if verbose {
            out.write_str(" : ")?;
            self.header().render(out, self.kind())?;
        }
        Ok(())
    }
}

impl fmt::Display for StorageCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, false, "")
    }
}

/// Any storage reply
#[derive(Debug, Clone, PartialEq)]
pub enum StorageReply {
    /// Get
    Get(GetReply),
    /// Put
    Put(PutReply),
    /// Remove
    Remove(RemoveReply),
    /// Revert
    Revert(RevertReply),
    /// CreateVisitor
    CreateVisitor(CreateVisitorReply),
    /// DestroyVisitor
    DestroyVisitor(DestroyVisitorReply),
    /// RequestBucketInfo
    RequestBucketInfo(RequestBucketInfoReply),
    /// NotifyBucketChange
    NotifyBucketChange(NotifyBucketChangeReply),
    /// CreateBucket
    CreateBucket(CreateBucketReply),
    /// MergeBucket
    MergeBucket(MergeBucketReply),
    /// DeleteBucket
    DeleteBucket(DeleteBucketReply),
    /// GetBucketDiff
    GetBucketDiff(GetBucketDiffReply),
    /// ApplyBucketDiff
    ApplyBucketDiff(ApplyBucketDiffReply),
    /// SplitBucket
    SplitBucket(SplitBucketReply),
    /// JoinBuckets
    JoinBuckets(JoinBucketsReply),
    /// SetBucketState
    SetBucketState(SetBucketStateReply),
    /// RemoveLocation
    RemoveLocation(RemoveLocationReply),
    /// Update
    Update(UpdateReply),
    /// Internal
    Internal(InternalReply),
}

impl StorageReply {
    /// Kind of this reply
    pub fn kind(&self) -> MessageKind {
        match self {
            StorageReply::Get(_) => MessageKind::Get,
            StorageReply::Put(_) => MessageKind::Put,
            StorageReply::Remove(_) => MessageKind::Remove,
            StorageReply::Revert(_) => MessageKind::Revert,
            StorageReply::CreateVisitor(_) => MessageKind::CreateVisitor,
            StorageReply::DestroyVisitor(_) => MessageKind::DestroyVisitor,
            StorageReply::RequestBucketInfo(_) => MessageKind::RequestBucketInfo,
            StorageReply::NotifyBucketChange(_) => MessageKind::NotifyBucketChange,
            StorageReply::CreateBucket(_) => MessageKind::CreateBucket,
            StorageReply::MergeBucket(_) => MessageKind::MergeBucket,
            StorageReply::DeleteBucket(_) => MessageKind::DeleteBucket,
            StorageReply::GetBucketDiff(_) => MessageKind::GetBucketDiff,
            StorageReply::ApplyBucketDiff(_) => MessageKind::ApplyBucketDiff,
            StorageReply::SplitBucket(_) => MessageKind::SplitBucket,
            StorageReply::JoinBuckets(_) => MessageKind::JoinBuckets,
            StorageReply::SetBucketState(_) => MessageKind::SetBucketState,
            StorageReply::RemoveLocation(_) => MessageKind::RemoveLocation,
            StorageReply::Update(_) => MessageKind::Update,
            StorageReply::Internal(_) => MessageKind::Internal,
        }
    }

    /// Shared reply fields
    pub fn header(&self) -> &ReplyHeader {
        each_reply!(self, r => &r.header)
    }

    /// Mutable shared reply fields
    pub fn header_mut(&mut self) -> &mut ReplyHeader {
        each_reply!(self, r => &mut r.header)
    }

    /// Message id of the originating command
    pub fn msg_id(&self) -> MessageId {
        self.header().msg_id
    }

    /// Outcome
    pub fn result(&self) -> &ReturnCode {
        &self.header().result
    }

    /// Replace the outcome
    pub fn set_result(&mut self, result: ReturnCode) {
        self.header_mut().result = result;
    }

    /// Overwrite the message id, for reproducible serialization dumps
    pub fn force_msg_id(&mut self, id: MessageId) {
        self.header_mut().msg_id = id;
    }

    /// Approximate size for resource accounting
    pub fn approx_size(&self) -> u32 {
        self.header().approx_size
    }
}

impl Render for StorageReply {
    fn render(&self, out: &mut dyn fmt::Write, verbose: bool, indent: &str) -> fmt::Result {
        each_reply!(self, r => r.render(out, verbose, indent))?;
        if verbose {
            out.write_str(" : ")?;
            self.header().render(out, self.kind())?;
        }
        Ok(())
    }
}

impl fmt::Display for StorageReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, false, "")
    }
}
