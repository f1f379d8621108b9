use super::fields::*;
use super::{correlated, Context, WireCommand, WireReply};
use storage_api::message::{
    GetCommand, GetReply, PutCommand, PutReply, RemoveCommand, RemoveLocationCommand,
    RemoveLocationReply, RemoveReply, RevertCommand, RevertReply, UpdateCommand, UpdateReply,
};
use storage_api::{CommandHeader, MessageKind, ReplyHeader};
use storage_wire::{DecodeResult, EncodeResult, WireReader, WireWrite};

impl WireCommand for PutCommand {
    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_bucket(out, &self.bucket, ctx.rev);
        ctx.write_document(out, &self.document)?;
        out.write_u64(self.timestamp.value());
        out.write_u64(self.update_timestamp.value());
        write_condition(out, &self.condition, ctx.rev)
    }

    fn read(ctx: &Context<'_>, r: &mut WireReader, header: CommandHeader) -> DecodeResult<Self> {
        Ok(PutCommand {
            header,
            bucket: read_bucket(r, ctx.rev)?,
            document: ctx.read_document(r)?,
            timestamp: read_timestamp(r)?,
            update_timestamp: read_timestamp(r)?,
            condition: read_condition(r, ctx.rev)?,
        })
    }
}

impl WireReply for PutReply {
    type Command = PutCommand;

    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        out.write_bool(self.was_found);
        write_bucket_info(out, &self.bucket_info, ctx.rev);
        Ok(())
    }

    fn read(
        ctx: &Context<'_>,
        r: &mut WireReader,
        header: ReplyHeader,
        cmd: Option<&PutCommand>,
    ) -> DecodeResult<Self> {
        let cmd = correlated(cmd, MessageKind::Put)?;
        let mut reply = PutReply::from_command(cmd, r.read_bool()?);
        reply.header = header;
        reply.bucket_info = read_bucket_info(r, ctx.rev)?;
        Ok(reply)
    }
}

impl WireCommand for UpdateCommand {
    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_bucket(out, &self.bucket, ctx.rev);
        ctx.write_update(out, &self.update)?;
        out.write_u64(self.timestamp.value());
        out.write_u64(self.old_timestamp.value());
        write_condition(out, &self.condition, ctx.rev)
    }

    fn read(ctx: &Context<'_>, r: &mut WireReader, header: CommandHeader) -> DecodeResult<Self> {
        Ok(UpdateCommand {
            header,
            bucket: read_bucket(r, ctx.rev)?,
            update: ctx.read_update(r)?,
            timestamp: read_timestamp(r)?,
            old_timestamp: read_timestamp(r)?,
            condition: read_condition(r, ctx.rev)?,
        })
    }
}

impl WireReply for UpdateReply {
    type Command = UpdateCommand;

    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        out.write_u64(self.old_timestamp.value());
        write_bucket_info(out, &self.bucket_info, ctx.rev);
        Ok(())
    }

    fn read(
        ctx: &Context<'_>,
        r: &mut WireReader,
        header: ReplyHeader,
        cmd: Option<&UpdateCommand>,
    ) -> DecodeResult<Self> {
        let cmd = correlated(cmd, MessageKind::Update)?;
        let mut reply = UpdateReply::from_command(cmd, read_timestamp(r)?);
        reply.header = header;
        reply.bucket_info = read_bucket_info(r, ctx.rev)?;
        Ok(reply)
    }
}

impl WireCommand for GetCommand {
    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_bucket(out, &self.bucket, ctx.rev);
        write_string(out, "document id", self.doc_id.as_str())?;
        write_string(out, "field set", &self.field_set)?;
        out.write_u64(self.before_timestamp.value());
        Ok(())
    }

    fn read(ctx: &Context<'_>, r: &mut WireReader, header: CommandHeader) -> DecodeResult<Self> {
        Ok(GetCommand {
            header,
            bucket: read_bucket(r, ctx.rev)?,
            doc_id: read_document_id(r)?,
            field_set: r.read_string()?,
            before_timestamp: read_timestamp(r)?,
        })
    }
}

impl WireReply for GetReply {
    type Command = GetCommand;

    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        out.write_u64(self.last_modified.value());
        ctx.write_optional_document(out, self.document.as_ref())
    }

    fn read(
        ctx: &Context<'_>,
        r: &mut WireReader,
        header: ReplyHeader,
        cmd: Option<&GetCommand>,
    ) -> DecodeResult<Self> {
        let cmd = correlated(cmd, MessageKind::Get)?;
        let last_modified = read_timestamp(r)?;
        let document = ctx.read_optional_document(r)?;
        let mut reply = GetReply::from_command(cmd, document, last_modified);
        reply.header = header;
        Ok(reply)
    }
}

impl WireCommand for RemoveCommand {
    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_bucket(out, &self.bucket, ctx.rev);
        write_string(out, "document id", self.doc_id.as_str())?;
        out.write_u64(self.timestamp.value());
        write_condition(out, &self.condition, ctx.rev)
    }

    fn read(ctx: &Context<'_>, r: &mut WireReader, header: CommandHeader) -> DecodeResult<Self> {
        Ok(RemoveCommand {
            header,
            bucket: read_bucket(r, ctx.rev)?,
            doc_id: read_document_id(r)?,
            timestamp: read_timestamp(r)?,
            condition: read_condition(r, ctx.rev)?,
        })
    }
}

impl WireReply for RemoveReply {
    type Command = RemoveCommand;

    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        out.write_u64(self.old_timestamp.value());
        write_bucket_info(out, &self.bucket_info, ctx.rev);
        Ok(())
    }

    fn read(
        ctx: &Context<'_>,
        r: &mut WireReader,
        header: ReplyHeader,
        cmd: Option<&RemoveCommand>,
    ) -> DecodeResult<Self> {
        let cmd = correlated(cmd, MessageKind::Remove)?;
        let mut reply = RemoveReply::from_command(cmd, read_timestamp(r)?);
        reply.header = header;
        reply.bucket_info = read_bucket_info(r, ctx.rev)?;
        Ok(reply)
    }
}

impl WireCommand for RevertCommand {
    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_bucket(out, &self.bucket, ctx.rev);
        write_count(out, "revert tokens", self.tokens.len())?;
        for token in &self.tokens {
            out.write_u64(token.value());
        }
        Ok(())
    }

    fn read(ctx: &Context<'_>, r: &mut WireReader, header: CommandHeader) -> DecodeResult<Self> {
        let bucket = read_bucket(r, ctx.rev)?;
        let count = r.read_count(8)?;
        let tokens = (0..count)
            .map(|_| read_timestamp(r))
            .collect::<DecodeResult<_>>()?;
        Ok(RevertCommand {
            header,
            bucket,
            tokens,
        })
    }
}

impl WireReply for RevertReply {
    type Command = RevertCommand;

    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_bucket_info(out, &self.bucket_info, ctx.rev);
        Ok(())
    }

    fn read(
        ctx: &Context<'_>,
        r: &mut WireReader,
        header: ReplyHeader,
        cmd: Option<&RevertCommand>,
    ) -> DecodeResult<Self> {
        let cmd = correlated(cmd, MessageKind::Revert)?;
        let mut reply = RevertReply::from_command(cmd);
        reply.header = header;
        reply.bucket_info = read_bucket_info(r, ctx.rev)?;
        Ok(reply)
    }
}

impl WireCommand for RemoveLocationCommand {
    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_string(out, "document selection", &self.selection)?;
        write_bucket(out, &self.bucket, ctx.rev);
        Ok(())
    }

    fn read(ctx: &Context<'_>, r: &mut WireReader, header: CommandHeader) -> DecodeResult<Self> {
        Ok(RemoveLocationCommand {
            header,
            selection: r.read_string()?,
            bucket: read_bucket(r, ctx.rev)?,
        })
    }
}

impl WireReply for RemoveLocationReply {
    type Command = RemoveLocationCommand;

    fn write<W: WireWrite>(&self, ctx: &Context<'_>, out: &mut W) -> EncodeResult<()> {
        write_bucket(out, &self.bucket, ctx.rev);
        write_bucket_info(out, &self.bucket_info, ctx.rev);
        Ok(())
    }

    fn read(
        ctx: &Context<'_>,
        r: &mut WireReader,
        header: ReplyHeader,
        _cmd: Option<&RemoveLocationCommand>,
    ) -> DecodeResult<Self> {
        Ok(RemoveLocationReply {
            header,
            bucket: read_bucket(r, ctx.rev)?,
            bucket_info: read_bucket_info(r, ctx.rev)?,
        })
    }
}
