//! Version-dispatched encoding and decoding of storage messages.
//!
//! Every message starts with its kind tag and a header common to all
//! commands or all replies, followed by the kind-specific body:
//!
//! ```text
//! +-----------+----------------------------+-----------------------+
//! | kind: u16 | command or reply header    | kind-specific fields  |
//! +-----------+----------------------------+-----------------------+
//! ```
//!
//! Command header: `msg_id u64 | priority u8 | source_index u16 | load_type u32`,
//! where a source index of `0xFFFF` means none.
//!
//! Reply header: `msg_id u64 | priority u8 | result u32 | message string`.

use crate::serialize::{Context, WireCommand, WireReply};
use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use storage_api::message::*;
use storage_api::{
    CommandHeader, DocumentTypeRepo, LoadType, LoadTypeSet, MessageId, MessageKind, ReplyHeader,
    ResultCode, ReturnCode, StorageCommand, StorageReply,
};
use storage_wire::{
    check_field_len, DecodeError, DecodeResult, EncodeError, EncodeResult, Revision, SizeCounter,
    WireReader, WireVersion, WireWrite, MAX_FIELD_LEN,
};
use tracing::{debug, trace, warn};

/// Source index written when a command has no known sender
pub const NO_SOURCE_INDEX: u16 = 0xFFFF;

/// Byte offset of the message id in every encoded message
pub const MSG_ID_OFFSET: usize = 2;

/// Initial buffer capacity for an encode
const ENCODE_CAPACITY: usize = 256;

/// Read the message id of an encoded command or reply without decoding it
pub fn peek_msg_id(bytes: &[u8]) -> DecodeResult<MessageId> {
    let available = bytes.len().saturating_sub(MSG_ID_OFFSET);
    if available < 8 {
        return Err(DecodeError::Truncated {
            offset: MSG_ID_OFFSET,
            needed: 8,
            available,
        });
    }
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[MSG_ID_OFFSET..MSG_ID_OFFSET + 8]);
    Ok(MessageId(u64::from_be_bytes(raw)))
}

/// Storage protocol codec.
///
/// Stateless apart from the shared lookup tables, so one instance can serve
/// any number of threads.
#[derive(Debug, Clone)]
pub struct StorageProtocol {
    load_types: Arc<LoadTypeSet>,
    repo: Arc<dyn DocumentTypeRepo>,
}

impl StorageProtocol {
    /// Create a codec resolving load types and documents through the given tables
    pub fn new(load_types: Arc<LoadTypeSet>, repo: Arc<dyn DocumentTypeRepo>) -> Self {
        Self { load_types, repo }
    }

    /// Known load types
    pub fn load_types(&self) -> &LoadTypeSet {
        &self.load_types
    }

    /// Document serializer
    pub fn repo(&self) -> &dyn DocumentTypeRepo {
        self.repo.as_ref()
    }

    fn context(&self, rev: Revision) -> Context<'_> {
        Context {
            rev,
            repo: self.repo.as_ref(),
        }
    }

    fn encode_revision(kind: MessageKind, version: WireVersion) -> EncodeResult<Revision> {
        let rev = version
            .revision()
            .ok_or(EncodeError::UnsupportedVersion(version))?;
        match kind.min_revision() {
            None => Err(EncodeError::NotSerializable(kind.name())),
            Some(min) if rev < min => Err(EncodeError::UnsupportedKind {
                kind: kind.name(),
                version,
            }),
            Some(_) => Ok(rev),
        }
    }

    /// Encode a command at `version`
    pub fn encode_command(&self, cmd: &StorageCommand, version: WireVersion) -> EncodeResult<Bytes> {
        let rev = Self::encode_revision(cmd.kind(), version)?;
        let mut buf = BytesMut::with_capacity(ENCODE_CAPACITY);
        self.write_command(&mut buf, cmd, rev)?;
        debug!(
            "Encoded {} command {} at {} ({} bytes)",
            cmd.kind(),
            cmd.msg_id(),
            version,
            buf.len()
        );
        Ok(buf.freeze())
    }

    /// Encode a reply at `version`
    pub fn encode_reply(&self, reply: &StorageReply, version: WireVersion) -> EncodeResult<Bytes> {
        let rev = Self::encode_revision(reply.kind(), version)?;
        let mut buf = BytesMut::with_capacity(ENCODE_CAPACITY);
        self.write_reply(&mut buf, reply, rev)?;
        debug!(
            "Encoded {} for message {} at {} ({} bytes)",
            reply.kind().reply_name(),
            reply.msg_id(),
            version,
            buf.len()
        );
        Ok(buf.freeze())
    }

    /// Exact encoded size of a command at `version`
    pub fn approx_command_size(&self, cmd: &StorageCommand, version: WireVersion) -> EncodeResult<usize> {
        let rev = Self::encode_revision(cmd.kind(), version)?;
        let mut counter = SizeCounter::new();
        self.write_command(&mut counter, cmd, rev)?;
        trace!("{} command is {} bytes at {}", cmd.kind(), counter.len(), version);
        Ok(counter.len())
    }

    /// Exact encoded size of a reply at `version`
    pub fn approx_reply_size(&self, reply: &StorageReply, version: WireVersion) -> EncodeResult<usize> {
        let rev = Self::encode_revision(reply.kind(), version)?;
        let mut counter = SizeCounter::new();
        self.write_reply(&mut counter, reply, rev)?;
        Ok(counter.len())
    }

    /// Decode a command encoded at `version`
    pub fn decode_command(&self, bytes: Bytes, version: WireVersion) -> DecodeResult<StorageCommand> {
        let rev = version
            .revision()
            .ok_or(DecodeError::UnsupportedVersion(version))?;
        let mut r = WireReader::new(bytes);
        let tag = r.read_u16()?;
        let kind = match MessageKind::from_tag(tag) {
            Some((kind, false)) if kind.supported_at(rev) => kind,
            _ => return Err(DecodeError::UnknownKind { tag, version }),
        };
        let header = self.read_command_header(&mut r)?;
        let ctx = self.context(rev);
        let r = &mut r;

        let mut cmd = match kind {
            MessageKind::Get => StorageCommand::Get(GetCommand::read(&ctx, r, header)?),
            MessageKind::Put => StorageCommand::Put(PutCommand::read(&ctx, r, header)?),
            MessageKind::Remove => StorageCommand::Remove(RemoveCommand::read(&ctx, r, header)?),
            MessageKind::Revert => StorageCommand::Revert(RevertCommand::read(&ctx, r, header)?),
            MessageKind::CreateVisitor => {
                StorageCommand::CreateVisitor(CreateVisitorCommand::read(&ctx, r, header)?)
            }
            MessageKind::DestroyVisitor => {
                StorageCommand::DestroyVisitor(DestroyVisitorCommand::read(&ctx, r, header)?)
            }
            MessageKind::RequestBucketInfo => {
                StorageCommand::RequestBucketInfo(RequestBucketInfoCommand::read(&ctx, r, header)?)
            }
            MessageKind::NotifyBucketChange => {
                StorageCommand::NotifyBucketChange(NotifyBucketChangeCommand::read(&ctx, r, header)?)
            }
            MessageKind::CreateBucket => {
                StorageCommand::CreateBucket(CreateBucketCommand::read(&ctx, r, header)?)
            }
            MessageKind::MergeBucket => {
                StorageCommand::MergeBucket(MergeBucketCommand::read(&ctx, r, header)?)
            }
            MessageKind::DeleteBucket => {
                StorageCommand::DeleteBucket(DeleteBucketCommand::read(&ctx, r, header)?)
            }
            MessageKind::GetBucketDiff => {
                StorageCommand::GetBucketDiff(GetBucketDiffCommand::read(&ctx, r, header)?)
            }
            MessageKind::ApplyBucketDiff => {
                StorageCommand::ApplyBucketDiff(ApplyBucketDiffCommand::read(&ctx, r, header)?)
            }
            MessageKind::SplitBucket => {
                StorageCommand::SplitBucket(SplitBucketCommand::read(&ctx, r, header)?)
            }
            MessageKind::JoinBuckets => {
                StorageCommand::JoinBuckets(JoinBucketsCommand::read(&ctx, r, header)?)
            }
            MessageKind::SetBucketState => {
                StorageCommand::SetBucketState(SetBucketStateCommand::read(&ctx, r, header)?)
            }
            MessageKind::RemoveLocation => {
                StorageCommand::RemoveLocation(RemoveLocationCommand::read(&ctx, r, header)?)
            }
            MessageKind::Update => StorageCommand::Update(UpdateCommand::read(&ctx, r, header)?),
            MessageKind::Internal => return Err(DecodeError::UnknownKind { tag, version }),
        };
        r.finish()?;

        cmd.header_mut().approx_size = r.consumed() as u32;
        debug!(
            "Decoded {} command {} at {} ({} bytes)",
            kind,
            cmd.msg_id(),
            version,
            r.consumed()
        );
        Ok(cmd)
    }

    /// Decode a reply encoded at `version`.
    ///
    /// `cmd` is the command the reply answers. Reply kinds that do not resend
    /// the fields they share with their command fail without it.
    pub fn decode_reply(
        &self,
        bytes: Bytes,
        version: WireVersion,
        cmd: Option<&StorageCommand>,
    ) -> DecodeResult<StorageReply> {
        let rev = version
            .revision()
            .ok_or(DecodeError::UnsupportedVersion(version))?;
        let mut r = WireReader::new(bytes);
        let tag = r.read_u16()?;
        let kind = match MessageKind::from_tag(tag) {
            Some((kind, true)) if kind.supported_at(rev) => kind,
            _ => return Err(DecodeError::UnknownKind { tag, version }),
        };
        match cmd {
            Some(cmd) if cmd.kind() != kind => {
                return Err(DecodeError::malformed(
                    0,
                    format!("{} does not answer a {} command", kind.reply_name(), cmd.kind()),
                ));
            }
            None if kind.reply_needs_command() => {
                return Err(DecodeError::MissingCorrelatedCommand {
                    kind: kind.reply_name(),
                });
            }
            _ => {}
        }
        let header = Self::read_reply_header(&mut r)?;
        if let Some(cmd) = cmd {
            if cmd.msg_id() != header.msg_id {
                return Err(DecodeError::malformed(
                    MSG_ID_OFFSET,
                    format!(
                        "reply message id {} does not match command id {}",
                        header.msg_id,
                        cmd.msg_id()
                    ),
                ));
            }
        }
        let ctx = self.context(rev);
        let r = &mut r;

        macro_rules! read_reply {
            ($variant:ident, $reply:ty) => {
                StorageReply::$variant(<$reply>::read(
                    &ctx,
                    r,
                    header,
                    match cmd {
                        Some(StorageCommand::$variant(c)) => Some(c),
                        _ => None,
                    },
                )?)
            };
        }

        let mut reply = match kind {
            MessageKind::Get => read_reply!(Get, GetReply),
            MessageKind::Put => read_reply!(Put, PutReply),
            MessageKind::Remove => read_reply!(Remove, RemoveReply),
            MessageKind::Revert => read_reply!(Revert, RevertReply),
            MessageKind::CreateVisitor => read_reply!(CreateVisitor, CreateVisitorReply),
            MessageKind::DestroyVisitor => read_reply!(DestroyVisitor, DestroyVisitorReply),
            MessageKind::RequestBucketInfo => read_reply!(RequestBucketInfo, RequestBucketInfoReply),
            MessageKind::NotifyBucketChange => read_reply!(NotifyBucketChange, NotifyBucketChangeReply),
            MessageKind::CreateBucket => read_reply!(CreateBucket, CreateBucketReply),
            MessageKind::MergeBucket => read_reply!(MergeBucket, MergeBucketReply),
            MessageKind::DeleteBucket => read_reply!(DeleteBucket, DeleteBucketReply),
            MessageKind::GetBucketDiff => read_reply!(GetBucketDiff, GetBucketDiffReply),
            MessageKind::ApplyBucketDiff => read_reply!(ApplyBucketDiff, ApplyBucketDiffReply),
            MessageKind::SplitBucket => read_reply!(SplitBucket, SplitBucketReply),
            MessageKind::JoinBuckets => read_reply!(JoinBuckets, JoinBucketsReply),
            MessageKind::SetBucketState => read_reply!(SetBucketState, SetBucketStateReply),
            MessageKind::RemoveLocation => read_reply!(RemoveLocation, RemoveLocationReply),
            MessageKind::Update => read_reply!(Update, UpdateReply),
            MessageKind::Internal => return Err(DecodeError::UnknownKind { tag, version }),
        };
        r.finish()?;

        reply.header_mut().approx_size = r.consumed() as u32;
        debug!(
            "Decoded {} for message {} at {} ({} bytes)",
            kind.reply_name(),
            reply.msg_id(),
            version,
            r.consumed()
        );
        Ok(reply)
    }

    fn write_command<W: WireWrite>(&self, out: &mut W, cmd: &StorageCommand, rev: Revision) -> EncodeResult<()> {
        let kind = cmd.kind();
        out.write_u16(kind.command_tag());
        Self::write_command_header(out, cmd.header())?;
        let ctx = self.context(rev);
        match cmd {
            StorageCommand::Get(c) => WireCommand::write(c, &ctx, out),
            StorageCommand::Put(c) => WireCommand::write(c, &ctx, out),
            StorageCommand::Remove(c) => WireCommand::write(c, &ctx, out),
            StorageCommand::Revert(c) => WireCommand::write(c, &ctx, out),
            StorageCommand::CreateVisitor(c) => WireCommand::write(c, &ctx, out),
            StorageCommand::DestroyVisitor(c) => WireCommand::write(c, &ctx, out),
            StorageCommand::RequestBucketInfo(c) => WireCommand::write(c, &ctx, out),
            StorageCommand::NotifyBucketChange(c) => WireCommand::write(c, &ctx, out),
            StorageCommand::CreateBucket(c) => WireCommand::write(c, &ctx, out),
            StorageCommand::MergeBucket(c) => WireCommand::write(c, &ctx, out),
            StorageCommand::DeleteBucket(c) => WireCommand::write(c, &ctx, out),
            StorageCommand::GetBucketDiff(c) => WireCommand::write(c, &ctx, out),
            StorageCommand::ApplyBucketDiff(c) => WireCommand::write(c, &ctx, out),
            StorageCommand::SplitBucket(c) => WireCommand::write(c, &ctx, out),
            StorageCommand::JoinBuckets(c) => WireCommand::write(c, &ctx, out),
            StorageCommand::SetBucketState(c) => WireCommand::write(c, &ctx, out),
            StorageCommand::RemoveLocation(c) => WireCommand::write(c, &ctx, out),
            StorageCommand::Update(c) => WireCommand::write(c, &ctx, out),
            StorageCommand::Internal(_) => Err(EncodeError::NotSerializable(kind.name())),
        }
    }

    fn write_reply<W: WireWrite>(&self, out: &mut W, reply: &StorageReply, rev: Revision) -> EncodeResult<()> {
        let kind = reply.kind();
        out.write_u16(kind.reply_tag());
        Self::write_reply_header(out, reply.header())?;
        let ctx = self.context(rev);
        match reply {
            StorageReply::Get(r) => WireReply::write(r, &ctx, out),
            StorageReply::Put(r) => WireReply::write(r, &ctx, out),
            StorageReply::Remove(r) => WireReply::write(r, &ctx, out),
            StorageReply::Revert(r) => WireReply::write(r, &ctx, out),
            StorageReply::CreateVisitor(r) => WireReply::write(r, &ctx, out),
            StorageReply::DestroyVisitor(r) => WireReply::write(r, &ctx, out),
            StorageReply::RequestBucketInfo(r) => WireReply::write(r, &ctx, out),
            StorageReply::NotifyBucketChange(r) => WireReply::write(r, &ctx, out),
            StorageReply::CreateBucket(r) => WireReply::write(r, &ctx, out),
            StorageReply::MergeBucket(r) => WireReply::write(r, &ctx, out),
            StorageReply::DeleteBucket(r) => WireReply::write(r, &ctx, out),
            StorageReply::GetBucketDiff(r) => WireReply::write(r, &ctx, out),
            StorageReply::ApplyBucketDiff(r) => WireReply::write(r, &ctx, out),
            StorageReply::SplitBucket(r) => WireReply::write(r, &ctx, out),
            StorageReply::JoinBuckets(r) => WireReply::write(r, &ctx, out),
            StorageReply::SetBucketState(r) => WireReply::write(r, &ctx, out),
            StorageReply::RemoveLocation(r) => WireReply::write(r, &ctx, out),
            StorageReply::Update(r) => WireReply::write(r, &ctx, out),
            StorageReply::Internal(_) => Err(EncodeError::NotSerializable(kind.reply_name())),
        }
    }

    fn write_command_header<W: WireWrite>(out: &mut W, header: &CommandHeader) -> EncodeResult<()> {
        if header.source_index == Some(NO_SOURCE_INDEX) {
            return Err(EncodeError::InvalidField {
                field: "source index",
                reason: "0xffff is reserved for an unknown source",
            });
        }
        out.write_u64(header.msg_id.0);
        out.write_u8(header.priority);
        out.write_u16(header.source_index.unwrap_or(NO_SOURCE_INDEX));
        out.write_u32(header.load_type.id);
        Ok(())
    }

    fn read_command_header(&self, r: &mut WireReader) -> DecodeResult<CommandHeader> {
        let msg_id = MessageId(r.read_u64()?);
        let priority = r.read_u8()?;
        let source_index = match r.read_u16()? {
            NO_SOURCE_INDEX => None,
            index => Some(index),
        };
        let load_type_id = r.read_u32()?;
        let load_type = match self.load_types.get(load_type_id) {
            Some(load_type) => load_type.clone(),
            None => {
                warn!(
                    "Unknown load type {} in message {}, using the default load type",
                    load_type_id, msg_id
                );
                LoadType::default()
            }
        };
        Ok(CommandHeader {
            msg_id,
            priority,
            source_index,
            load_type,
            approx_size: storage_api::DEFAULT_APPROX_BYTE_SIZE,
        })
    }

    fn write_reply_header<W: WireWrite>(out: &mut W, header: &ReplyHeader) -> EncodeResult<()> {
        check_field_len("result message", header.result.message.len(), MAX_FIELD_LEN)?;
        out.write_u64(header.msg_id.0);
        out.write_u8(header.priority);
        out.write_u32(header.result.result as u32);
        out.write_string(&header.result.message);
        Ok(())
    }

    fn read_reply_header(r: &mut WireReader) -> DecodeResult<ReplyHeader> {
        let msg_id = MessageId(r.read_u64()?);
        let priority = r.read_u8()?;
        let offset = r.offset();
        let result = ResultCode::try_from(r.read_u32()?)
            .map_err(|code| DecodeError::malformed(offset, format!("unknown result code {}", code)))?;
        let message = r.read_string()?;
        Ok(ReplyHeader {
            msg_id,
            priority,
            result: ReturnCode::new(result, message),
            approx_size: storage_api::DEFAULT_APPROX_BYTE_SIZE,
        })
    }
}
