//! Per-kind message layouts.
//!
//! Each command and reply type implements [`WireCommand`] or [`WireReply`].
//! The same `write` runs against a `BytesMut` for encoding and against a
//! `SizeCounter` for size computation, so both always agree.

mod bucket;
pub(crate) mod fields;
mod persistence;
mod visitor;

use storage_api::{CommandHeader, DocumentTypeRepo, MessageKind, ReplyHeader};
use storage_wire::{DecodeError, DecodeResult, EncodeResult, Revision, WireReader, WireWrite};

/// Everything a layout needs besides the message itself
#[derive(Clone, Copy)]
pub(crate) struct Context<'a> {
    pub rev: Revision,
    pub repo: &'a dyn DocumentTypeRepo,
}

/// Command body layout
pub(crate) trait WireCommand: Sized {
    /// Write the kind-specific fields
    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()>;

    /// Read the kind-specific fields following `header`
    fn read(ctx: &Context<'_>, r: &mut WireReader, header: CommandHeader) -> DecodeResult<Self>;
}

/// Reply body layout
pub(crate) trait WireReply: Sized {
    /// Command this reply answers
    type Command;

    /// Write the kind-specific fields
    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()>;

    /// Read the kind-specific fields, restoring what is not re-sent from `cmd`
    fn read(
        ctx: &Context<'_>,
        r: &mut WireReader,
        header: ReplyHeader,
        cmd: Option<&Self::Command>,
    ) -> DecodeResult<Self>;
}

/// The originating command of a reply kind that cannot be decoded without it
pub(crate) fn correlated<C>(cmd: Option<&C>, kind: MessageKind) -> DecodeResult<&C> {
    cmd.ok_or(DecodeError::MissingCorrelatedCommand {
        kind: kind.reply_name(),
    })
}
